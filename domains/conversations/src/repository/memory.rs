//! In-memory conversation store
//!
//! Applies each mutation under one write lock, so every operation is atomic
//! with respect to every other.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use staybook_common::RepositoryError;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ConversationStore, ReadOutcome};
use crate::domain::entities::{Conversation, ConversationSummary, Message, ParticipantPair};

#[derive(Default)]
struct State {
    conversations: HashMap<Uuid, Conversation>,
    by_pair: HashMap<(Uuid, ParticipantPair), Uuid>,
}

#[derive(Clone, Default)]
pub struct InMemoryConversationStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.conversations.len()
    }

    #[mutants::skip] // Thin wrapper over len()
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait::async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn insert(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let key = (conversation.listing_id, conversation.pair());

        if state.by_pair.contains_key(&key) || state.conversations.contains_key(&conversation.id)
        {
            return Err(RepositoryError::AlreadyExists);
        }

        state.by_pair.insert(key, conversation.id);
        state
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self.state.read().await.conversations.get(&id).cloned())
    }

    async fn find_by_pair(
        &self,
        listing_id: Uuid,
        pair: ParticipantPair,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .by_pair
            .get(&(listing_id, pair))
            .and_then(|id| state.conversations.get(id))
            .cloned())
    }

    async fn list_for_participant(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let state = self.state.read().await;
        let mut summaries: Vec<ConversationSummary> = state
            .conversations
            .values()
            .filter(|c| c.is_participant(user_id))
            .map(|c| c.summary_for(user_id))
            .collect();

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    async fn unread_total(&self, user_id: Uuid) -> Result<u64, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .conversations
            .values()
            .map(|c| u64::from(c.unread_for(user_id)))
            .sum())
    }

    async fn append(
        &self,
        id: Uuid,
        message: &Message,
        recipient: Uuid,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let mut state = self.state.write().await;
        let Some(conversation) = state.conversations.get_mut(&id) else {
            return Ok(None);
        };

        conversation.record_message(message.clone(), recipient);
        Ok(Some(conversation.clone()))
    }

    async fn mark_read(
        &self,
        id: Uuid,
        reader: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<ReadOutcome>, RepositoryError> {
        let mut state = self.state.write().await;
        let Some(conversation) = state.conversations.get_mut(&id) else {
            return Ok(None);
        };

        let changed = conversation
            .apply_mark_read(reader, at)
            .map_err(|e| RepositoryError::InvalidData(e.to_string()))?;

        Ok(Some(ReadOutcome {
            conversation: conversation.clone(),
            changed,
        }))
    }
}
