use std::fmt::Display;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::decoder::LineDecoder;
use super::{MessageSink, StreamTarget};
use crate::errors::AppError;

/// One record of the generation stream. Only `response` carries text;
/// anything else is metadata and is ignored.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Text,
    Ignored,
    Malformed,
}

/// State of one in-flight generation: where it writes and what it has
/// accumulated so far. The buffer only ever grows.
#[derive(Debug)]
pub struct StreamSession {
    target: StreamTarget,
    buffer: String,
}

impl StreamSession {
    pub fn new(target: StreamTarget) -> Self {
        Self {
            target,
            buffer: String::new(),
        }
    }

    pub fn target(&self) -> &StreamTarget {
        &self.target
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    fn apply_line(&mut self, line: &[u8]) -> LineKind {
        let chunk = match serde_json::from_slice::<GenerateChunk>(line) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(
                    conversation_id = %self.target.conversation_id,
                    "Skipping malformed stream line ({e}): {}",
                    String::from_utf8_lossy(line)
                );
                return LineKind::Malformed;
            }
        };

        if let Some(err) = chunk.error {
            warn!(conversation_id = %self.target.conversation_id, "Generation endpoint reported: {err}");
        }
        if chunk.done {
            debug!(conversation_id = %self.target.conversation_id, "Generation endpoint signalled done");
        }

        match chunk.response {
            Some(text) if !text.is_empty() => {
                self.buffer.push_str(&text);
                LineKind::Text
            }
            _ => LineKind::Ignored,
        }
    }
}

/// Counters for one finished session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamStats {
    pub text_records: usize,
    pub ignored_records: usize,
    pub malformed_lines: usize,
    pub publishes: usize,
}

impl StreamStats {
    fn count(&mut self, kind: LineKind) {
        match kind {
            LineKind::Text => self.text_records += 1,
            LineKind::Ignored => self.ignored_records += 1,
            LineKind::Malformed => self.malformed_lines += 1,
        }
    }
}

/// Drives a response body into a [`StreamSession`], publishing snapshots on a
/// fixed frame clock.
///
/// Growth of the buffer marks a publish as pending; the next frame tick
/// publishes whatever the buffer holds by then, so bursts collapse into one
/// publish per frame. When the body ends (or fails) any pending publish is
/// dropped and the full buffer is published once more, so the last snapshot
/// the sink sees is always the complete text.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    frame_interval: Duration,
}

impl Reconciler {
    pub fn new(frame_interval: Duration) -> Self {
        Self { frame_interval }
    }

    pub async fn run<S, B, E, K>(
        &self,
        session: &mut StreamSession,
        body: S,
        sink: &K,
    ) -> Result<StreamStats, AppError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
        K: MessageSink + ?Sized,
    {
        tokio::pin!(body);
        let mut decoder = LineDecoder::new();
        let mut stats = StreamStats::default();

        let mut frame = time::interval_at(Instant::now() + self.frame_interval, self.frame_interval);
        frame.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut publish_pending = false;

        let result = loop {
            tokio::select! {
                biased;

                _ = frame.tick(), if publish_pending => {
                    sink.publish(&session.target, &session.buffer);
                    stats.publishes += 1;
                    publish_pending = false;
                }

                next = body.next() => match next {
                    Some(Ok(chunk)) => {
                        for line in decoder.push(chunk.as_ref()) {
                            let kind = session.apply_line(&line);
                            stats.count(kind);
                            publish_pending |= kind == LineKind::Text;
                        }
                    }
                    Some(Err(e)) => {
                        break Err(AppError::StreamInterrupted { message: e.to_string() });
                    }
                    None => break Ok(()),
                },
            }
        };

        if result.is_ok() {
            if let Some(tail) = decoder.finish() {
                stats.count(session.apply_line(&tail));
            }
        }

        sink.publish(&session.target, &session.buffer);
        stats.publishes += 1;

        result.map(|()| stats)
    }
}
