use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{error, info};

use crate::agent::{build_prompt, OllamaGenerateClient};
use crate::errors::AppError;
use crate::models::{ChatRequest, ChatResponse, ConversationSummary, GenerationStatus, Message};
use crate::service::conversation_store::SharedStore;
use crate::stream::reconciler::{Reconciler, StreamSession};
use crate::stream::StreamTarget;

/// Process-wide generation state: the single in-flight slot and the error
/// left behind by the last failed session.
#[derive(Default)]
struct GenerationState {
    in_flight: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl GenerationState {
    fn try_acquire(self: &Arc<Self>) -> Option<InFlightGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(Arc::clone(self)))
    }

    fn set_last_error(&self, error: Option<String>) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }

    fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Holds the in-flight slot; releasing happens on drop, whichever way the
/// session ends.
struct InFlightGuard(Arc<GenerationState>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct ChatService {
    store: SharedStore,
    agent: OllamaGenerateClient,
    reconciler: Reconciler,
    generation: Arc<GenerationState>,
}

impl ChatService {
    pub fn new(store: SharedStore, agent: OllamaGenerateClient, frame_interval: Duration) -> Self {
        Self {
            store,
            agent,
            reconciler: Reconciler::new(frame_interval),
            generation: Arc::new(GenerationState::default()),
        }
    }

    pub fn is_generating(&self) -> bool {
        self.generation.in_flight.load(Ordering::Acquire)
    }

    pub fn status(&self) -> GenerationStatus {
        GenerationStatus {
            current_conversation_id: self.store.lock().current_id().to_string(),
            generating: self.is_generating(),
            last_error: self.generation.last_error(),
        }
    }

    pub fn get_conversations(&self) -> Vec<ConversationSummary> {
        self.store.lock().summaries()
    }

    pub fn new_chat(&self) -> ConversationSummary {
        let mut store = self.store.lock();
        let conversation = store.new_chat();
        ConversationSummary {
            id: conversation.id.clone(),
            title: conversation.title.clone(),
            selected: true,
        }
    }

    pub fn select_conversation(&self, id: &str) -> Result<(), AppError> {
        if self.store.lock().select_conversation(id) {
            Ok(())
        } else {
            Err(AppError::ConversationNotFound { id: id.to_string() })
        }
    }

    pub fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>, AppError> {
        self.store
            .lock()
            .conversation(conversation_id)
            .map(|c| c.messages.clone())
            .ok_or_else(|| AppError::ConversationNotFound {
                id: conversation_id.to_string(),
            })
    }

    /// Sends `request.message` in the current conversation.
    ///
    /// Appends the user message and an empty assistant placeholder, then
    /// streams the reply into that placeholder on a background task. Rejected
    /// while another generation is in flight; nothing is queued.
    pub fn send_message(&self, request: ChatRequest) -> Result<ChatResponse, AppError> {
        if request.message.trim().is_empty() {
            return Err(AppError::empty_field("message"));
        }
        let guard = self
            .generation
            .try_acquire()
            .ok_or(AppError::GenerationInProgress)?;

        let (target, user_message_id, prompt) = {
            let mut store = self.store.lock();
            let conversation_id = store.current_id().to_string();
            let turn = store
                .append_turn(&conversation_id, &request.message)
                .ok_or_else(|| AppError::ConversationNotFound {
                    id: conversation_id.clone(),
                })?;
            let history = store
                .conversation(&conversation_id)
                .map(|c| c.messages_before(&turn.assistant.id).to_vec())
                .unwrap_or_default();

            let target = StreamTarget {
                conversation_id,
                message_id: turn.assistant.id,
            };
            (target, turn.user.id, build_prompt(&history))
        };

        self.generation.set_last_error(None);
        info!(
            conversation_id = %target.conversation_id,
            message_id = %target.message_id,
            "Starting generation"
        );

        let response = ChatResponse {
            conversation_id: target.conversation_id.clone(),
            user_message_id,
            assistant_message_id: target.message_id.clone(),
        };

        let service = self.clone();
        tokio::spawn(async move {
            service
                .run_session(StreamSession::new(target), prompt, guard)
                .await;
        });

        Ok(response)
    }

    async fn run_session(&self, mut session: StreamSession, prompt: String, _guard: InFlightGuard) {
        let conversation_id = session.target().conversation_id.clone();

        let result = match self.agent.generate(&conversation_id, &prompt).await {
            Ok(response) => {
                self.reconciler
                    .run(&mut session, response.bytes_stream(), &self.store)
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(stats) => info!(
                %conversation_id,
                message_id = %session.target().message_id,
                chars = session.text().chars().count(),
                text_records = stats.text_records,
                ignored_records = stats.ignored_records,
                publishes = stats.publishes,
                malformed_lines = stats.malformed_lines,
                "Generation finished"
            ),
            Err(e) => {
                error!(
                    %conversation_id,
                    partial_chars = session.text().chars().count(),
                    "Generation failed: {e}"
                );
                self.generation.set_last_error(Some(e.to_string()));
            }
        }
    }
}
