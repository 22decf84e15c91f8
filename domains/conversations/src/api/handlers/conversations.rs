//! Conversation API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use staybook_auth::AuthUser;
use staybook_common::{Result, ValidatedJson};
use uuid::Uuid;
use validator::Validate;

use crate::api::middleware::ConversationsState;
use crate::domain::entities::{Conversation, ConversationSummary};

/// Request for starting (or continuing) a conversation about a listing
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub to_user_id: Uuid,

    /// First message; trimmed and length-checked again by the service
    #[validate(length(min = 1))]
    pub message: String,

    pub listing_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub unread_count: u64,
}

/// Start a conversation, or append to the existing one for this pair and listing
pub async fn create_conversation(
    AuthUser(identity): AuthUser,
    State(state): State<ConversationsState>,
    ValidatedJson(req): ValidatedJson<CreateConversationRequest>,
) -> Result<(StatusCode, Json<Conversation>)> {
    let appended = state
        .messenger
        .start_conversation(identity.user_id, req.to_user_id, req.listing_id, &req.message)
        .await?;

    Ok((StatusCode::CREATED, Json(appended.conversation)))
}

/// List the caller's conversations, most recently active first
pub async fn list_conversations(
    AuthUser(identity): AuthUser,
    State(state): State<ConversationsState>,
) -> Result<Json<Vec<ConversationSummary>>> {
    let summaries = state
        .messenger
        .list_conversations(identity.user_id)
        .await?;
    Ok(Json(summaries))
}

/// Total unread messages across all of the caller's conversations
pub async fn unread_count(
    AuthUser(identity): AuthUser,
    State(state): State<ConversationsState>,
) -> Result<Json<UnreadCountResponse>> {
    let unread_count = state.messenger.unread_count(identity.user_id).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}

/// Open a conversation. Opening marks the counterpart's messages read.
pub async fn get_conversation(
    AuthUser(identity): AuthUser,
    State(state): State<ConversationsState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Conversation>> {
    let conversation = state
        .messenger
        .open_conversation(id, identity.user_id)
        .await?;
    Ok(Json(conversation))
}
