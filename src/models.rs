use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title a conversation carries until its first message is sent.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Number of characters of the first user message used as the title.
pub const TITLE_LENGTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Allocates a fresh, empty conversation.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages preceding `message_id`, or every message if it is absent.
    pub fn messages_before(&self, message_id: &str) -> &[Message] {
        let end = self
            .messages
            .iter()
            .position(|m| m.id == message_id)
            .unwrap_or(self.messages.len());
        &self.messages[..end]
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content.into())
    }

    /// An empty assistant message the stream fills in place.
    pub fn placeholder() -> Self {
        Self::new(MessageRole::Assistant, String::new())
    }
}

/// The pair of messages appended by one send.
#[derive(Debug, Clone)]
pub struct Turn {
    pub user: Message,
    pub assistant: Message,
}

// ── API payloads ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub conversation_id: String,
    pub user_message_id: String,
    pub assistant_message_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationStatus {
    pub current_conversation_id: String,
    pub generating: bool,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let msg = Message::user("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");

        let parsed: Message = serde_json::from_str(
            r#"{"id":"m1","role":"assistant","content":"hello"}"#,
        )
        .unwrap();
        assert_eq!(parsed.role, MessageRole::Assistant);
    }

    #[test]
    fn messages_before_stops_at_target() {
        let mut conv = Conversation::new();
        let user = Message::user("q");
        let placeholder = Message::placeholder();
        let placeholder_id = placeholder.id.clone();
        conv.messages.push(user.clone());
        conv.messages.push(placeholder);

        assert_eq!(conv.messages_before(&placeholder_id), &[user][..]);
        assert_eq!(conv.messages_before("missing").len(), 2);
    }
}
