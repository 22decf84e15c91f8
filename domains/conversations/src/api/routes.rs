//! Route definitions for Conversations domain API

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{conversations, messages, realtime};
use super::middleware::ConversationsState;

/// Create conversation routes
fn conversation_routes() -> Router<ConversationsState> {
    Router::new()
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route(
            "/conversations/unread-count",
            get(conversations::unread_count),
        )
        .route("/conversations/{id}", get(conversations::get_conversation))
}

/// Create message routes
fn message_routes() -> Router<ConversationsState> {
    Router::new().route(
        "/conversations/{id}/messages",
        post(messages::send_message),
    )
}

/// Create the transport upgrade route
fn realtime_routes() -> Router<ConversationsState> {
    Router::new().route("/ws", get(realtime::connect))
}

/// Create all Conversations domain API routes
pub fn routes() -> Router<ConversationsState> {
    Router::new()
        .merge(conversation_routes())
        .merge(message_routes())
        .merge(realtime_routes())
}
