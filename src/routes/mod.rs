pub mod api_routes;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::service::chat_service::ChatService;
use api_routes::{
    chat_handler, list_conversations_handler, list_messages_handler, new_chat_handler,
    select_conversation_handler, status_handler,
};

pub fn router(svc: ChatService) -> Router {
    Router::new()
        .route(
            "/api/conversations",
            get(list_conversations_handler).post(new_chat_handler),
        )
        .route("/api/conversations/{id}/select", post(select_conversation_handler))
        .route("/api/conversations/{id}/messages", get(list_messages_handler))
        .route("/api/status", get(status_handler))
        .route("/api/chat", post(chat_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(svc)
}
