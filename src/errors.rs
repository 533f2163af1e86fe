use thiserror::Error;

/// Top-level application error.
/// All variants carry a human-readable message for display/logging.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Validation errors ────────────────────────────────────────────────────
    #[error("Field '{field_name}' cannot be empty")]
    EmptyField { field_name: String },

    // ── Session errors ───────────────────────────────────────────────────────
    #[error("A generation is already in progress")]
    GenerationInProgress,

    #[error("Conversation '{id}' not found")]
    ConversationNotFound { id: String },

    // ── Generation endpoint errors ───────────────────────────────────────────
    #[error("Ollama service unavailable at {host}")]
    OllamaUnavailable { host: String },

    #[error("Generation endpoint returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Response stream interrupted: {message}")]
    StreamInterrupted { message: String },

    #[error("Inference error: {message}")]
    InferenceError { message: String },
}

impl AppError {
    pub fn empty_field(field_name: impl Into<String>) -> Self {
        AppError::EmptyField { field_name: field_name.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::ConversationNotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::EmptyField { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::GenerationInProgress)
    }

    pub fn is_agent_unavailable(&self) -> bool {
        matches!(self, AppError::OllamaUnavailable { .. } | AppError::UpstreamStatus { .. })
    }
}

/// Failures of the durable conversation slot.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored conversations are corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}
