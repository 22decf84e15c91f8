//! Domain errors for conversations

use staybook_common::Error;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConversationError {
    #[error("User {0} not found")]
    UserNotFound(Uuid),

    #[error("Listing {0} not found")]
    ListingNotFound(Uuid),

    #[error("Conversation {0} not found")]
    ConversationNotFound(Uuid),

    #[error("Sender is not a participant in this conversation")]
    SenderNotParticipant,

    #[error("Caller is not a participant in this conversation")]
    CallerNotParticipant,

    #[error("{0}")]
    ContentInvalid(String),

    #[error("Cannot start a conversation with yourself")]
    SelfConversation,

    #[error("Conversation is busy, retry shortly")]
    Busy,
}

impl From<ConversationError> for Error {
    fn from(err: ConversationError) -> Self {
        let message = err.to_string();
        match err {
            ConversationError::UserNotFound(_)
            | ConversationError::ListingNotFound(_)
            | ConversationError::ConversationNotFound(_) => Error::NotFound(message),
            ConversationError::SenderNotParticipant | ConversationError::CallerNotParticipant => {
                Error::Authorization(message)
            }
            ConversationError::ContentInvalid(_) | ConversationError::SelfConversation => {
                Error::Validation(message)
            }
            ConversationError::Busy => Error::Transient(message),
        }
    }
}
