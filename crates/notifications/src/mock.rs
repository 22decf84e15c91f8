//! Mock Notification Store
//!
//! Captures notifications in memory so tests can assert on what the
//! messaging core wrote. Can be switched into a failing mode to exercise
//! best-effort delivery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::{NewNotification, Notification, NotificationError, NotificationStore};

/// Mock notification store for testing
#[derive(Debug, Clone, Default)]
pub struct MockNotificationStore {
    notifications: Arc<Mutex<Vec<Notification>>>,
    failing: Arc<AtomicBool>,
}

impl MockNotificationStore {
    /// Create a new mock notification store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock store whose writes always fail
    pub fn new_failing() -> Self {
        let store = Self::new();
        store.set_failing(true);
        store
    }

    /// Toggle failing mode; clones share the flag
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn captured(&self) -> MutexGuard<'_, Vec<Notification>> {
        self.notifications
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get all captured notifications
    pub fn all(&self) -> Vec<Notification> {
        self.captured().clone()
    }

    /// Get notifications written for a specific user
    pub fn for_user(&self, user_id: Uuid) -> Vec<Notification> {
        self.captured()
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Get count of notifications written
    pub fn count(&self) -> usize {
        self.captured().len()
    }

    /// Clear all captured notifications
    pub fn clear(&self) {
        self.captured().clear();
    }
}

#[async_trait::async_trait]
impl NotificationStore for MockNotificationStore {
    async fn create(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, NotificationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError::Unavailable(
                "mock notification store is failing".to_string(),
            ));
        }

        let record = Notification::from_new(notification);
        tracing::debug!(user_id = %record.user_id, "Mock notification captured");
        self.captured().push(record.clone());

        Ok(record)
    }

    fn store_name(&self) -> &'static str {
        "mock"
    }
}
