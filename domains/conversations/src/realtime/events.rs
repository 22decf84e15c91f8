//! Transport event frames
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use staybook_common::Error;
use uuid::Uuid;

use crate::domain::entities::Message;
use crate::domain::ledger::UnreadLedger;
use crate::repository::ReadOutcome;
use crate::service::Appended;

/// Client → server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinConversation(Uuid),
    LeaveConversation(Uuid),
    SendMessage(SendMessage),
    TypingStart(Typing),
    TypingStop(Typing),
    MarkMessagesRead(MarkMessagesRead),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinConversation(_) => "join_conversation",
            Self::LeaveConversation(_) => "leave_conversation",
            Self::SendMessage(_) => "send_message",
            Self::TypingStart(_) => "typing_start",
            Self::TypingStop(_) => "typing_stop",
            Self::MarkMessagesRead(_) => "mark_messages_read",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub conversation_id: Uuid,
    pub message: String,
    /// Must match the connection's user when present
    #[serde(default)]
    pub sender_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Typing {
    pub conversation_id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkMessagesRead {
    pub conversation_id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

/// Server → client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    NewMessage(NewMessage),
    UserTyping(UserTyping),
    MessagesRead(MessagesRead),
    MessageNotification(MessageNotification),
    Error(ErrorEvent),
}

impl ServerEvent {
    /// Render an error for the transport, tagged with the triggering event
    pub fn error(err: &Error, event: Option<&str>) -> Self {
        Self::Error(ErrorEvent {
            code: err.error_code().to_string(),
            message: err.to_string(),
            event: event.map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub message: Message,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl From<&Appended> for NewMessage {
    fn from(appended: &Appended) -> Self {
        Self {
            conversation_id: appended.conversation.id,
            message: appended.message.clone(),
            last_message: appended.conversation.last_message.clone(),
            last_message_at: appended.conversation.last_message_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTyping {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesRead {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub unread_counts: UnreadLedger,
}

impl MessagesRead {
    pub fn new(outcome: &ReadOutcome, reader: Uuid) -> Self {
        Self {
            conversation_id: outcome.conversation.id,
            user_id: reader,
            unread_counts: outcome.conversation.unread_counts.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageNotification {
    pub conversation_id: Uuid,
    pub listing_name: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}
