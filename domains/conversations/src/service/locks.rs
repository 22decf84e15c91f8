//! Per-conversation serialization point
//!
//! One async mutex per conversation id, created on demand and dropped again
//! once nobody holds or waits for it. Acquisition is bounded so a stalled
//! writer cannot wedge a conversation forever.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::domain::error::ConversationError;

type LockTable = HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>;

#[derive(Clone)]
pub struct ConversationLocks {
    table: Arc<Mutex<LockTable>>,
    timeout: Duration,
}

impl ConversationLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    fn table(&self) -> MutexGuard<'_, LockTable> {
        lock_table(&self.table)
    }

    /// Wait for exclusive access to `id`, failing with `Busy` on timeout
    pub async fn acquire(&self, id: Uuid) -> Result<ConversationGuard, ConversationError> {
        let lock = self.table().entry(id).or_default().clone();

        match tokio::time::timeout(self.timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(ConversationGuard {
                id,
                guard: Some(guard),
                table: self.table.clone(),
            }),
            Err(_) => {
                tracing::warn!(conversation_id = %id, "Timed out waiting for conversation lock");
                self.release_if_idle(id);
                Err(ConversationError::Busy)
            }
        }
    }

    fn release_if_idle(&self, id: Uuid) {
        remove_if_idle(&mut self.table(), id);
    }

    /// Number of conversations with a live lock entry
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_table(table: &Mutex<LockTable>) -> MutexGuard<'_, LockTable> {
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// Entries are cloned only while the table is locked, so a count of one
// means nobody else holds or awaits this mutex.
fn remove_if_idle(table: &mut LockTable, id: Uuid) {
    if table.get(&id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
        table.remove(&id);
    }
}

/// Exclusive access to one conversation until dropped
pub struct ConversationGuard {
    id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<Mutex<LockTable>>,
}

impl ConversationGuard {
    pub fn conversation_id(&self) -> Uuid {
        self.id
    }
}

impl Drop for ConversationGuard {
    fn drop(&mut self) {
        self.guard.take();
        remove_if_idle(&mut lock_table(&self.table), self.id);
    }
}
