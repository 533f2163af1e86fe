use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::db::conversation_repository::ConversationRepository;
use crate::models::{Conversation, ConversationSummary, Message, MessageRole, Turn, TITLE_LENGTH};
use crate::stream::{MessageSink, StreamTarget};

/// Ordered conversations plus the "current" pointer.
///
/// Every mutation that changes message data publishes a snapshot of the
/// non-empty conversations; the writer spawned by [`SharedStore::new`]
/// saves the latest one to the repository.
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    current_id: String,
    snapshots: watch::Sender<Vec<Conversation>>,
    // Only ever cloned. Clones start at the initial version, so a writer
    // attached later still sees every snapshot published before it.
    unsaved: watch::Receiver<Vec<Conversation>>,
}

impl ConversationStore {
    /// Restores history from `repository` and puts a blank conversation in
    /// front of it, selected. Unreadable history counts as no history.
    pub fn load(repository: &dyn ConversationRepository) -> Self {
        let mut conversations = match repository.load() {
            Ok(saved) => saved,
            Err(e) => {
                warn!("Failed to load stored conversations, starting fresh: {e}");
                Vec::new()
            }
        };
        info!(restored = conversations.len(), "Conversation history loaded");

        let (snapshots, unsaved) = watch::channel(conversations.clone());

        let fresh = Conversation::new();
        let current_id = fresh.id.clone();
        conversations.insert(0, fresh);

        Self {
            conversations,
            current_id,
            snapshots,
            unsaved,
        }
    }

    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    fn conversation_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    pub fn current_id(&self) -> &str {
        &self.current_id
    }

    pub fn summaries(&self) -> Vec<ConversationSummary> {
        self.conversations
            .iter()
            .map(|c| ConversationSummary {
                id: c.id.clone(),
                title: c.title.clone(),
                selected: c.id == self.current_id,
            })
            .collect()
    }

    /// Receiver of the snapshots waiting to be saved.
    pub fn pending_saves(&self) -> watch::Receiver<Vec<Conversation>> {
        self.unsaved.clone()
    }

    /// "New chat": prepends a fresh conversation and selects it.
    pub fn new_chat(&mut self) -> &Conversation {
        let conversation = Conversation::new();
        self.current_id = conversation.id.clone();
        self.conversations.insert(0, conversation);
        self.persist();
        &self.conversations[0]
    }

    /// Moves the "current" pointer. Message data is untouched, so a stream
    /// writing into another conversation is unaffected.
    pub fn select_conversation(&mut self, id: &str) -> bool {
        if self.conversation(id).is_none() {
            return false;
        }
        self.current_id = id.to_string();
        true
    }

    /// Appends a user message and an empty assistant placeholder.
    /// The first message of a conversation also sets its title.
    /// Returns `None` without touching anything if the conversation is gone.
    pub fn append_turn(&mut self, conversation_id: &str, user_text: &str) -> Option<Turn> {
        let conversation = self.conversation_mut(conversation_id)?;

        if conversation.messages.is_empty() {
            conversation.title = user_text.chars().take(TITLE_LENGTH).collect();
        }

        let turn = Turn {
            user: Message::user(user_text),
            assistant: Message::placeholder(),
        };
        conversation.messages.push(turn.user.clone());
        conversation.messages.push(turn.assistant.clone());
        debug!(
            conversation_id,
            message_id = %turn.user.id,
            role = %turn.user.role,
            "Turn appended"
        );

        self.persist();
        Some(turn)
    }

    /// Replaces the content of one assistant message, addressed by id.
    /// Stale ids are a no-op; returns whether anything changed.
    pub fn update_message_content(
        &mut self,
        conversation_id: &str,
        message_id: &str,
        text: &str,
    ) -> bool {
        let Some(message) = self
            .conversation_mut(conversation_id)
            .and_then(|c| c.messages.iter_mut().find(|m| m.id == message_id))
        else {
            return false;
        };
        if message.role != MessageRole::Assistant || message.content == text {
            return false;
        }

        message.content.clear();
        message.content.push_str(text);
        self.persist();
        true
    }

    fn persist(&self) {
        let to_save: Vec<Conversation> = self
            .conversations
            .iter()
            .filter(|c| !c.is_empty())
            .cloned()
            .collect();
        self.snapshots.send_replace(to_save);
    }
}

/// Saves the latest snapshot each time one is published. Snapshots that
/// arrive while a save is running collapse into the newest.
async fn write_snapshots(
    repository: Arc<dyn ConversationRepository>,
    mut pending: watch::Receiver<Vec<Conversation>>,
) {
    while pending.changed().await.is_ok() {
        let snapshot = pending.borrow_and_update().clone();
        let repository = Arc::clone(&repository);
        match tokio::task::spawn_blocking(move || repository.save(&snapshot)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Failed to save conversations: {e}"),
            Err(e) => error!("Conversation save task failed: {e}"),
        }
    }
    debug!("Conversation store dropped, writer stopped");
}

/// Handle to the single store shared by the HTTP handlers and stream sessions.
///
/// Lock scopes are short and never held across an `.await`, so every
/// mutation is atomic with respect to readers. Disk writes happen on the
/// writer task, outside the lock.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<ConversationStore>>,
}

impl SharedStore {
    /// Wraps `store` and spawns its writer. Must be called inside a Tokio
    /// runtime.
    pub fn new(store: ConversationStore, repository: Arc<dyn ConversationRepository>) -> Self {
        tokio::spawn(write_snapshots(repository, store.pending_saves()));
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, ConversationStore> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MessageSink for SharedStore {
    fn publish(&self, target: &StreamTarget, text: &str) {
        self.lock()
            .update_message_content(&target.conversation_id, &target.message_id, text);
    }
}
