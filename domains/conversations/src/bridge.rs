//! Best-effort "you have mail" fan-out
//!
//! Writes a notification record and pings the recipient's personal room.
//! The two are independent: the alert goes out even if the write fails, and
//! neither failure ever reaches the sender.

use std::sync::Arc;
use std::time::Duration;

use staybook_notifications::{NewNotification, NotificationStore};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::realtime::events::{MessageNotification, ServerEvent};
use crate::realtime::RealtimeGateway;

#[derive(Clone)]
pub struct NotificationBridge {
    store: Arc<dyn NotificationStore>,
    gateway: Arc<dyn RealtimeGateway>,
    timeout: Duration,
}

impl NotificationBridge {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        gateway: Arc<dyn RealtimeGateway>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            timeout,
        }
    }

    pub async fn notify_new_message(
        &self,
        conversation_id: Uuid,
        recipient_id: Uuid,
        listing_name: &str,
    ) {
        let notification =
            NewNotification::new_message(recipient_id, conversation_id, listing_name);
        let text = notification.message.clone();

        match tokio::time::timeout(self.timeout, self.store.create(notification)).await {
            Ok(Ok(record)) => {
                tracing::debug!(
                    notification_id = %record.id,
                    user_id = %recipient_id,
                    "Notification recorded"
                );
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    error = %e,
                    store = self.store.store_name(),
                    user_id = %recipient_id,
                    "Failed to record notification"
                );
            }
            Err(_) => {
                tracing::warn!(
                    store = self.store.store_name(),
                    user_id = %recipient_id,
                    "Notification write timed out"
                );
            }
        }

        let delivered = self.gateway.notify_user(
            recipient_id,
            ServerEvent::MessageNotification(MessageNotification {
                conversation_id,
                listing_name: listing_name.to_string(),
                message: text,
            }),
        );
        tracing::debug!(user_id = %recipient_id, delivered, "Message alert pushed");
    }

    /// Run `notify_new_message` in the background
    pub fn spawn_new_message(
        &self,
        conversation_id: Uuid,
        recipient_id: Uuid,
        listing_name: String,
    ) -> JoinHandle<()> {
        let bridge = self.clone();
        tokio::spawn(async move {
            bridge
                .notify_new_message(conversation_id, recipient_id, &listing_name)
                .await;
        })
    }
}
