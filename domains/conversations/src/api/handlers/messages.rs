//! Message API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use staybook_auth::AuthUser;
use staybook_common::{Result, ValidatedJson};
use uuid::Uuid;
use validator::Validate;

use crate::api::middleware::ConversationsState;
use crate::domain::entities::Conversation;

/// Request for appending to an existing conversation
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1))]
    pub message: String,
}

/// Append a message and return the updated conversation
pub async fn send_message(
    AuthUser(identity): AuthUser,
    State(state): State<ConversationsState>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<Conversation>)> {
    let appended = state
        .messenger
        .send_message(id, identity.user_id, &req.message)
        .await?;

    Ok((StatusCode::CREATED, Json(appended.conversation)))
}
