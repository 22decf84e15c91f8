//! Conversation business rules
//!
//! `ConversationService` is the only writer of conversations. Appends and
//! mark-reads on one conversation run one at a time under its lock, and each
//! one is a single atomic store operation. The `*_then` variants run a hook
//! after the commit while the lock is still held, which is how callers get
//! their side effects delivered in commit order.

pub mod locks;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use staybook_common::{Error, RepositoryError, Result};
use staybook_directory::{ListingLookup, UserDirectory};
use uuid::Uuid;

use crate::domain::entities::{
    now_micros, validate_content, Conversation, ConversationSummary, Message, Participant,
    ParticipantPair,
};
use crate::domain::error::ConversationError;
use crate::repository::{ConversationStore, ReadOutcome};

pub use locks::{ConversationGuard, ConversationLocks};

/// A committed append
#[derive(Debug, Clone, PartialEq)]
pub struct Appended {
    pub conversation: Conversation,
    pub message: Message,
    pub recipient: Uuid,
    /// Whether this append created the conversation
    pub created: bool,
}

#[derive(Clone)]
pub struct ConversationService {
    store: Arc<dyn ConversationStore>,
    users: Arc<dyn UserDirectory>,
    listings: Arc<dyn ListingLookup>,
    locks: ConversationLocks,
    store_timeout: Duration,
}

impl ConversationService {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        users: Arc<dyn UserDirectory>,
        listings: Arc<dyn ListingLookup>,
        lock_timeout: Duration,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            users,
            listings,
            locks: ConversationLocks::new(lock_timeout),
            store_timeout,
        }
    }

    pub fn locks(&self) -> &ConversationLocks {
        &self.locks
    }

    /// Bound a collaborator call by the store timeout
    async fn timed<T, E, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Into<Error>,
    {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => {
                tracing::warn!(operation = op, "Store call timed out");
                Err(RepositoryError::Timeout.into())
            }
        }
    }

    /// Start a conversation about `listing_id`, or continue the existing one
    pub async fn get_or_create(
        &self,
        from_user_id: Uuid,
        to_user_id: Uuid,
        listing_id: Uuid,
        content: &str,
    ) -> Result<Appended> {
        self.get_or_create_then(from_user_id, to_user_id, listing_id, content, |_| {})
            .await
    }

    pub async fn get_or_create_then<F>(
        &self,
        from_user_id: Uuid,
        to_user_id: Uuid,
        listing_id: Uuid,
        content: &str,
        after_commit: F,
    ) -> Result<Appended>
    where
        F: FnOnce(&Appended),
    {
        let content = validate_content(content)?;
        if from_user_id == to_user_id {
            return Err(ConversationError::SelfConversation.into());
        }

        let pair = ParticipantPair::new(from_user_id, to_user_id);
        if let Some(existing) = self
            .timed("find_by_pair", self.store.find_by_pair(listing_id, pair))
            .await?
        {
            return self
                .append_locked(existing.id, from_user_id, &content, after_commit)
                .await;
        }

        let listing = self
            .timed("find_listing", self.listings.find_listing(listing_id))
            .await?
            .ok_or(ConversationError::ListingNotFound(listing_id))?;
        let sender: Participant = self
            .timed("find_user", self.users.find_user(from_user_id))
            .await?
            .ok_or(ConversationError::UserNotFound(from_user_id))?
            .into();
        let recipient: Participant = self
            .timed("find_user", self.users.find_user(to_user_id))
            .await?
            .ok_or(ConversationError::UserNotFound(to_user_id))?
            .into();

        let mut conversation = Conversation::new(sender.clone(), recipient, &listing)?;
        let message = Message::new(
            &sender,
            &content,
            conversation.next_message_time(now_micros()),
        )?;
        let recipient_id = conversation.apply_append(message.clone())?;

        // Nobody else knows this id yet; holding its lock keeps later
        // appenders behind our side effects.
        let guard = self.locks.acquire(conversation.id).await?;

        match self
            .timed("insert", self.store.insert(&conversation))
            .await
        {
            Ok(()) => {
                tracing::info!(
                    conversation_id = %conversation.id,
                    listing_id = %listing_id,
                    "Conversation created"
                );
                let appended = Appended {
                    conversation,
                    message,
                    recipient: recipient_id,
                    created: true,
                };
                after_commit(&appended);
                Ok(appended)
            }
            Err(Error::Conflict(_)) => {
                drop(guard);
                tracing::debug!(
                    listing_id = %listing_id,
                    "Lost conversation creation race, appending to winner"
                );
                let winner = self
                    .timed("find_by_pair", self.store.find_by_pair(listing_id, pair))
                    .await?
                    .ok_or_else(|| {
                        Error::Internal("Conversation vanished after conflict".to_string())
                    })?;
                self.append_locked(winner.id, from_user_id, &content, after_commit)
                    .await
            }
            Err(e) => Err(e),
        }
    }

    /// Append a message from `sender_id` to an existing conversation
    pub async fn append_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> Result<Appended> {
        self.append_message_then(conversation_id, sender_id, content, |_| {})
            .await
    }

    pub async fn append_message_then<F>(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
        after_commit: F,
    ) -> Result<Appended>
    where
        F: FnOnce(&Appended),
    {
        let content = validate_content(content)?;
        self.append_locked(conversation_id, sender_id, &content, after_commit)
            .await
    }

    async fn append_locked<F>(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
        after_commit: F,
    ) -> Result<Appended>
    where
        F: FnOnce(&Appended),
    {
        let _guard = self.locks.acquire(conversation_id).await?;

        let current = self
            .timed("find", self.store.find(conversation_id))
            .await?
            .ok_or(ConversationError::ConversationNotFound(conversation_id))?;
        let sender = current
            .participant(sender_id)
            .ok_or(ConversationError::SenderNotParticipant)?;
        let recipient = current
            .counterpart(sender_id)
            .ok_or(ConversationError::SenderNotParticipant)?
            .user_id;

        let message = Message::new(
            sender,
            content,
            current.next_message_time(now_micros()),
        )?;

        let conversation = self
            .timed(
                "append",
                self.store.append(conversation_id, &message, recipient),
            )
            .await?
            .ok_or(ConversationError::ConversationNotFound(conversation_id))?;

        tracing::debug!(
            conversation_id = %conversation_id,
            sender_id = %sender_id,
            message_id = %message.id,
            "Message appended"
        );

        let appended = Appended {
            conversation,
            message,
            recipient,
            created: false,
        };
        after_commit(&appended);
        Ok(appended)
    }

    /// Mark every message sent to `user_id` as read. Idempotent.
    pub async fn mark_read(&self, conversation_id: Uuid, user_id: Uuid) -> Result<ReadOutcome> {
        self.mark_read_then(conversation_id, user_id, |_| {}).await
    }

    pub async fn mark_read_then<F>(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        after_commit: F,
    ) -> Result<ReadOutcome>
    where
        F: FnOnce(&ReadOutcome),
    {
        let _guard = self.locks.acquire(conversation_id).await?;

        let current = self
            .timed("find", self.store.find(conversation_id))
            .await?
            .ok_or(ConversationError::ConversationNotFound(conversation_id))?;
        if !current.is_participant(user_id) {
            return Err(ConversationError::CallerNotParticipant.into());
        }

        let outcome = self
            .timed(
                "mark_read",
                self.store.mark_read(conversation_id, user_id, now_micros()),
            )
            .await?
            .ok_or(ConversationError::ConversationNotFound(conversation_id))?;

        if outcome.changed {
            tracing::debug!(
                conversation_id = %conversation_id,
                user_id = %user_id,
                "Messages marked read"
            );
        }

        after_commit(&outcome);
        Ok(outcome)
    }

    /// Fetch a conversation the caller takes part in
    pub async fn get_for_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Conversation> {
        let conversation = self
            .timed("find", self.store.find(conversation_id))
            .await?
            .ok_or(ConversationError::ConversationNotFound(conversation_id))?;

        if !conversation.is_participant(user_id) {
            return Err(ConversationError::CallerNotParticipant.into());
        }
        Ok(conversation)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ConversationSummary>> {
        self.timed("list", self.store.list_for_participant(user_id))
            .await
    }

    pub async fn unread_total(&self, user_id: Uuid) -> Result<u64> {
        self.timed("unread_total", self.store.unread_total(user_id))
            .await
    }
}
