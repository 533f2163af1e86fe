use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "smallthinker";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_FRAME_INTERVAL_MS: u64 = 16;

/// Runtime settings, read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ollama_base_url: String,
    pub model: String,
    pub storage_dir: PathBuf,
    pub frame_interval: Duration,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let ollama_base_url = lookup("OLLAMA_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string());
        let model = lookup("CHAT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let storage_dir = lookup("CHAT_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_storage_dir);
        let frame_interval_ms =
            parse_or_default(&lookup, "CHAT_FRAME_INTERVAL_MS", DEFAULT_FRAME_INTERVAL_MS);
        let port = parse_or_default(&lookup, "PORT", DEFAULT_PORT);

        Self {
            ollama_base_url,
            model,
            storage_dir,
            frame_interval: Duration::from_millis(frame_interval_ms.max(1)),
            port,
        }
    }
}

fn default_storage_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("local_chat")
}

fn parse_or_default<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {key}={raw:?}, using {default}");
            default
        }),
        None => default,
    }
}
