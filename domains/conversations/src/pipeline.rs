//! Shared post-commit pipeline
//!
//! Both ingress adapters go through `Messenger`, so an append made over HTTP
//! and one made over the transport produce the same room broadcast and the
//! same recipient notification. Broadcasts are enqueued while the
//! conversation lock is held (commit order); the notification runs on its
//! own task.

use std::sync::Arc;

use staybook_common::Result;
use uuid::Uuid;

use crate::bridge::NotificationBridge;
use crate::domain::entities::{Conversation, ConversationSummary};
use crate::realtime::events::{MessagesRead, NewMessage};
use crate::realtime::RealtimeGateway;
use crate::repository::ReadOutcome;
use crate::service::{Appended, ConversationService};

#[derive(Clone)]
pub struct Messenger {
    service: Arc<ConversationService>,
    gateway: Arc<dyn RealtimeGateway>,
    bridge: NotificationBridge,
}

impl Messenger {
    pub fn new(
        service: Arc<ConversationService>,
        gateway: Arc<dyn RealtimeGateway>,
        bridge: NotificationBridge,
    ) -> Self {
        Self {
            service,
            gateway,
            bridge,
        }
    }

    pub fn service(&self) -> &ConversationService {
        &self.service
    }

    pub fn gateway(&self) -> &Arc<dyn RealtimeGateway> {
        &self.gateway
    }

    fn publish_appended(&self, appended: &Appended) {
        let conversation_id = appended.conversation.id;
        let delivered = self
            .gateway
            .broadcast_new_message(conversation_id, NewMessage::from(appended));
        tracing::debug!(conversation_id = %conversation_id, delivered, "new_message broadcast");

        self.bridge.spawn_new_message(
            conversation_id,
            appended.recipient,
            appended.conversation.listing_name.clone(),
        );
    }

    fn publish_read(&self, outcome: &ReadOutcome, reader: Uuid) {
        if !outcome.changed {
            return;
        }
        let conversation_id = outcome.conversation.id;
        self.gateway
            .broadcast_messages_read(conversation_id, MessagesRead::new(outcome, reader));
    }

    /// getOrCreate plus the post-append side effects
    pub async fn start_conversation(
        &self,
        from_user_id: Uuid,
        to_user_id: Uuid,
        listing_id: Uuid,
        content: &str,
    ) -> Result<Appended> {
        self.service
            .get_or_create_then(from_user_id, to_user_id, listing_id, content, |appended| {
                self.publish_appended(appended)
            })
            .await
    }

    /// appendMessage plus the post-append side effects
    pub async fn send_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> Result<Appended> {
        self.service
            .append_message_then(conversation_id, sender_id, content, |appended| {
                self.publish_appended(appended)
            })
            .await
    }

    /// markRead, announcing to the room when anything changed
    pub async fn mark_read(&self, conversation_id: Uuid, reader: Uuid) -> Result<ReadOutcome> {
        self.service
            .mark_read_then(conversation_id, reader, |outcome| {
                self.publish_read(outcome, reader)
            })
            .await
    }

    /// Fetch for display: implicit markRead, then the fresh aggregate
    pub async fn open_conversation(
        &self,
        conversation_id: Uuid,
        reader: Uuid,
    ) -> Result<Conversation> {
        Ok(self.mark_read(conversation_id, reader).await?.conversation)
    }

    pub async fn list_conversations(&self, user_id: Uuid) -> Result<Vec<ConversationSummary>> {
        self.service.list_for_user(user_id).await
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<u64> {
        self.service.unread_total(user_id).await
    }
}
