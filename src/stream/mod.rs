//! Turning a chunked generation response into ordered updates of one message.
//!
//! [`decoder::LineDecoder`] reassembles newline-delimited records across read
//! cycles; [`reconciler::Reconciler`] accumulates their text into a
//! [`reconciler::StreamSession`] and publishes snapshots through a
//! [`MessageSink`], at most once per frame, always ending with the full text.

pub mod decoder;
pub mod reconciler;

/// The message a session writes into, fixed when the session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTarget {
    pub conversation_id: String,
    pub message_id: String,
}

/// Receives content snapshots for a target message.
pub trait MessageSink {
    /// Replaces the target's content with `text`. Stale targets are ignored.
    fn publish(&self, target: &StreamTarget, text: &str);
}
