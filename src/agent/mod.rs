use serde::Serialize;
use tracing::{debug, error};

use crate::errors::AppError;
use crate::models::{Message, MessageRole};

const PREAMBLE: &str = "You are a helpful assistant.\n\n";

/// Serializes a message history into the single transcript prompt the
/// generate endpoint expects, ending with an `Assistant:` cue.
pub fn build_prompt(history: &[Message]) -> String {
    let transcript = history
        .iter()
        .map(|m| match m.role {
            MessageRole::User => format!("User: {}", m.content),
            MessageRole::Assistant => format!("Assistant: {}", m.content),
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!("{PREAMBLE}{transcript}\nAssistant:")
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Client for Ollama's streaming `POST /api/generate` endpoint.
#[derive(Clone)]
pub struct OllamaGenerateClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaGenerateClient {
    /// The endpoint is a local or LAN host, so system proxies are bypassed.
    pub fn new(base_url: &str, model: &str) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().no_proxy().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    /// Opens a streaming generation for `prompt`.
    ///
    /// Returns the response once its status is known to be successful; the
    /// caller reads the body incrementally.
    pub async fn generate(
        &self,
        conversation_id: &str,
        prompt: &str,
    ) -> Result<reqwest::Response, AppError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: true,
        };
        debug!(%conversation_id, prompt_len = prompt.len(), "Opening generation stream");

        let response = self
            .http
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Generation request failed for conversation {conversation_id}: {e}");
                if e.is_connect() || e.is_timeout() {
                    AppError::OllamaUnavailable { host: self.base_url.clone() }
                } else {
                    AppError::InferenceError { message: e.to_string() }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Generation endpoint returned {status} for conversation {conversation_id}");
            return Err(AppError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}
