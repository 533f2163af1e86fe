use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::errors::AppError;
use crate::models::ChatRequest;
use crate::service::chat_service::ChatService;

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET `/api/conversations` — sidebar list, newest first, with selection
pub async fn list_conversations_handler(State(svc): State<ChatService>) -> impl IntoResponse {
    Json(svc.get_conversations())
}

/// POST `/api/conversations` — "new chat": prepend a blank conversation and select it
pub async fn new_chat_handler(State(svc): State<ChatService>) -> impl IntoResponse {
    (StatusCode::CREATED, Json(svc.new_chat()))
}

/// POST `/api/conversations/{id}/select` — move the current-conversation pointer
pub async fn select_conversation_handler(
    Path(id): Path<String>,
    State(svc): State<ChatService>,
) -> Response {
    match svc.select_conversation(&id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET `/api/conversations/{id}/messages` — messages for a conversation
pub async fn list_messages_handler(
    Path(id): Path<String>,
    State(svc): State<ChatService>,
) -> Response {
    match svc.get_messages(&id) {
        Ok(msgs) => Json(msgs).into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET `/api/status` — current conversation, in-progress flag, last failure
pub async fn status_handler(State(svc): State<ChatService>) -> impl IntoResponse {
    Json(svc.status())
}

/// POST `/api/chat` — send a message in the current conversation; the reply
/// streams into the returned assistant message
pub async fn chat_handler(
    State(svc): State<ChatService>,
    Json(request): Json<ChatRequest>,
) -> Response {
    match svc.send_message(request) {
        Ok(response) => (StatusCode::ACCEPTED, Json(response)).into_response(),
        Err(e) => error_response(&e),
    }
}

// ── Helper ────────────────────────────────────────────────────────────────────

fn error_response(err: &AppError) -> Response {
    let status = if err.is_validation() {
        StatusCode::BAD_REQUEST
    } else if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if err.is_conflict() {
        StatusCode::CONFLICT
    } else if err.is_agent_unavailable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::OllamaGenerateClient;
    use crate::db::conversation_repository::InMemoryRepository;
    use crate::models::{ChatResponse, ConversationSummary, GenerationStatus, Message};
    use crate::routes::router;
    use crate::service::conversation_store::{ConversationStore, SharedStore};
    use std::sync::Arc;
    use std::time::Duration;

    async fn serve_api() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let closed = listener.local_addr().unwrap();
        drop(listener);

        let repo = Arc::new(InMemoryRepository::new());
        let store = SharedStore::new(ConversationStore::load(repo.as_ref()), repo);
        let agent = OllamaGenerateClient::new(&format!("http://{closed}"), "smallthinker").unwrap();
        let svc = ChatService::new(store, agent, Duration::from_millis(1));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(svc)).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    #[tokio::test]
    async fn conversation_endpoints() {
        let base = serve_api().await;
        let http = client();

        let listed: Vec<ConversationSummary> = http
            .get(format!("{base}/api/conversations"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].selected);

        let created = http.post(format!("{base}/api/conversations")).send().await.unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        let created: ConversationSummary = created.json().await.unwrap();

        let status: GenerationStatus = http
            .get(format!("{base}/api/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status.current_conversation_id, created.id);
        assert!(!status.generating);

        let selected = http
            .post(format!("{base}/api/conversations/{}/select", listed[0].id))
            .send()
            .await
            .unwrap();
        assert_eq!(selected.status(), StatusCode::NO_CONTENT);

        let missing = http
            .post(format!("{base}/api/conversations/nope/select"))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let messages: Vec<Message> = http
            .get(format!("{base}/api/conversations/{}/messages", created.id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn chat_endpoint_validates_and_accepts() {
        let base = serve_api().await;
        let http = client();

        let blank = http
            .post(format!("{base}/api/chat"))
            .json(&serde_json::json!({ "message": "   " }))
            .send()
            .await
            .unwrap();
        assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

        let accepted = http
            .post(format!("{base}/api/chat"))
            .json(&serde_json::json!({ "message": "Hello there, how are you doing today?" }))
            .send()
            .await
            .unwrap();
        assert_eq!(accepted.status(), StatusCode::ACCEPTED);
        let sent: ChatResponse = accepted.json().await.unwrap();

        let listed: Vec<ConversationSummary> = http
            .get(format!("{base}/api/conversations"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let conv = listed.iter().find(|c| c.id == sent.conversation_id).unwrap();
        assert_eq!(conv.title, "Hello there, how are");
    }
}
