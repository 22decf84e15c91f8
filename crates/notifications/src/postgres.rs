//! PostgreSQL notification store

use sqlx::PgPool;
use uuid::Uuid;

use crate::{NewNotification, Notification, NotificationError, NotificationStore};

#[derive(Clone)]
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl NotificationStore for PgNotificationStore {
    async fn create(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, NotificationError> {
        let record = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (id, user_id, kind, conversation_id, message, read, created_at)
            VALUES ($1, $2, $3, $4, $5, false, NOW())
            RETURNING id, user_id, kind, conversation_id, message, read, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(notification.user_id)
        .bind(&notification.kind)
        .bind(notification.conversation_id)
        .bind(&notification.message)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(
            notification_id = %record.id,
            user_id = %record.user_id,
            "Notification stored"
        );

        Ok(record)
    }

    fn store_name(&self) -> &'static str {
        "postgres"
    }
}
