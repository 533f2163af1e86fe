use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::StorageError;
use crate::models::Conversation;

/// Fixed key of the durable slot holding the conversation history.
pub const STORAGE_KEY: &str = "smallthinker-conversations";

/// Durable key-value slot for the conversation history.
///
/// `load` returns whatever was last saved (an empty list when nothing was);
/// `save` replaces the slot contents wholesale.
pub trait ConversationRepository: Send + Sync {
    fn load(&self) -> Result<Vec<Conversation>, StorageError>;
    fn save(&self, conversations: &[Conversation]) -> Result<(), StorageError>;
}

/// Stores the slot as `<dir>/<STORAGE_KEY>.json`.
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{STORAGE_KEY}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConversationRepository for JsonFileRepository {
    fn load(&self) -> Result<Vec<Conversation>, StorageError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No stored conversations at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&data)?)
    }

    fn save(&self, conversations: &[Conversation]) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let bytes = serde_json::to_vec(conversations)?;

        // Write to a temp file, then rename over the slot
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// In-memory slot, holding the serialized value like the file slot does.
#[cfg(test)]
#[derive(Default)]
pub struct InMemoryRepository {
    slot: std::sync::Mutex<Option<String>>,
}

#[cfg(test)]
impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the slot with a raw value, bypassing serialization.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: std::sync::Mutex::new(Some(raw.into())),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.slot.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl ConversationRepository for InMemoryRepository {
    fn load(&self) -> Result<Vec<Conversation>, StorageError> {
        let slot = self.slot.lock().unwrap();
        match slot.as_deref() {
            Some(raw) => Ok(serde_json::from_str(raw)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, conversations: &[Conversation]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(conversations)?;
        *self.slot.lock().unwrap() = Some(raw);
        Ok(())
    }
}
