//! Conversation storage
//!
//! Every mutation is a single atomic store operation: appending pushes the
//! message, refreshes the preview and bumps the recipient's counter together;
//! marking read flips the flags and resets the reader's counter together.
//! Nothing writes a whole aggregate back.

pub mod conversations;
pub mod memory;

use chrono::{DateTime, Utc};
use staybook_common::RepositoryError;
use uuid::Uuid;

use crate::domain::entities::{Conversation, ConversationSummary, Message, ParticipantPair};

pub use conversations::PgConversationStore;
pub use memory::InMemoryConversationStore;

/// Result of a mark-read
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOutcome {
    pub conversation: Conversation,
    /// Whether any flag or counter actually moved
    pub changed: bool,
}

#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    /// Insert a new conversation with its initial messages and counters.
    ///
    /// Fails with `AlreadyExists` when the listing already has a conversation
    /// for the same participant pair.
    async fn insert(&self, conversation: &Conversation) -> Result<(), RepositoryError>;

    async fn find(&self, id: Uuid) -> Result<Option<Conversation>, RepositoryError>;

    async fn find_by_pair(
        &self,
        listing_id: Uuid,
        pair: ParticipantPair,
    ) -> Result<Option<Conversation>, RepositoryError>;

    /// Summaries for `user_id`, most recently updated first
    async fn list_for_participant(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ConversationSummary>, RepositoryError>;

    /// Sum of `user_id`'s unread counters across conversations
    async fn unread_total(&self, user_id: Uuid) -> Result<u64, RepositoryError>;

    /// Append `message` and count it for `recipient`. `None` if absent.
    async fn append(
        &self,
        id: Uuid,
        message: &Message,
        recipient: Uuid,
    ) -> Result<Option<Conversation>, RepositoryError>;

    /// Mark messages to `reader` read and reset its counter. `None` if absent.
    async fn mark_read(
        &self,
        id: Uuid,
        reader: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<ReadOutcome>, RepositoryError>;
}
