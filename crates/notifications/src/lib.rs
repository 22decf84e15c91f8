//! Staybook Notification Store
//!
//! The messaging core writes lightweight "you have mail" records here and
//! never reads them back. Provides:
//! - PostgreSQL persistence for production
//! - In-memory capture for tests and database-less local runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub mod mock;
pub mod postgres;

pub use mock::MockNotificationStore;
pub use postgres::PgNotificationStore;

/// Kind tag written for message alerts
pub const KIND_NEW_MESSAGE: &str = "new_message";

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Notification configuration error: {0}")]
    Configuration(String),

    #[error("Notification database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Notification store unavailable: {0}")]
    Unavailable(String),
}

/// Notification to be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: String,
    pub conversation_id: Uuid,
    pub message: String,
}

impl NewNotification {
    /// Alert for a message received in a conversation about `listing_name`
    pub fn new_message(user_id: Uuid, conversation_id: Uuid, listing_name: &str) -> Self {
        Self {
            user_id,
            kind: KIND_NEW_MESSAGE.to_string(),
            conversation_id,
            message: format!("New message about {}", listing_name),
        }
    }
}

/// Stored notification record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub conversation_id: Uuid,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub(crate) fn from_new(new: NewNotification) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            kind: new.kind,
            conversation_id: new.conversation_id,
            message: new.message,
            read: false,
            created_at: Utc::now(),
        }
    }
}

/// Notification store configuration
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// Store implementation (postgres, mock)
    pub provider: String,
    /// Enable notification writes (disabled falls back to the mock store)
    pub enabled: bool,
}

impl NotificationConfig {
    /// Create notification config from environment variables
    ///
    /// The provider defaults to `postgres` when a database is configured.
    pub fn from_env(database_configured: bool) -> Self {
        dotenvy::dotenv().ok();

        Self::from_lookup(database_configured, |key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(database_configured: bool, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_provider = if database_configured {
            "postgres"
        } else {
            "mock"
        };

        let provider = lookup("NOTIFICATION_PROVIDER")
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| default_provider.to_string());

        let enabled = lookup("NOTIFICATIONS_ENABLED")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(true);

        Self { provider, enabled }
    }
}

/// Notification store trait for different implementations
#[async_trait::async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist a notification and return the stored record
    async fn create(&self, notification: NewNotification)
        -> Result<Notification, NotificationError>;

    /// Name used in logs
    fn store_name(&self) -> &'static str;
}

/// Notification store factory
pub struct NotificationStoreFactory;

impl NotificationStoreFactory {
    /// Create a notification store based on configuration
    pub fn create(
        config: &NotificationConfig,
        pool: Option<PgPool>,
    ) -> Result<Arc<dyn NotificationStore>, NotificationError> {
        if !config.enabled {
            tracing::info!("Notifications disabled, using mock implementation");
            return Ok(Arc::new(MockNotificationStore::new()));
        }

        match config.provider.as_str() {
            "postgres" | "pg" => {
                let pool = pool.ok_or_else(|| {
                    NotificationError::Configuration(
                        "postgres notification store requires DATABASE_URL".to_string(),
                    )
                })?;
                tracing::info!("Creating PostgreSQL notification store");
                Ok(Arc::new(PgNotificationStore::new(pool)))
            }
            "mock" => {
                tracing::info!("Creating mock notification store");
                Ok(Arc::new(MockNotificationStore::new()))
            }
            provider => Err(NotificationError::Configuration(format!(
                "Unknown notification provider: {}. Supported providers: postgres, mock",
                provider
            ))),
        }
    }
}
