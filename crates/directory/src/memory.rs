//! In-memory directory for tests and database-less runs

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{DirectoryError, ListingLookup, ListingSummary, UserDirectory, UserProfile};

#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    users: Arc<RwLock<HashMap<Uuid, UserProfile>>>,
    listings: Arc<RwLock<HashMap<Uuid, ListingSummary>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user and return its profile
    pub async fn add_user(&self, email: &str, display_name: &str) -> UserProfile {
        let profile = UserProfile {
            id: Uuid::new_v4(),
            email: email.to_string(),
            display_name: display_name.to_string(),
        };
        self.users.write().await.insert(profile.id, profile.clone());
        profile
    }

    /// Register a listing hosted by `host_id`
    pub async fn add_listing(&self, name: &str, host_id: Uuid) -> ListingSummary {
        let listing = ListingSummary {
            id: Uuid::new_v4(),
            name: name.to_string(),
            host_id,
        };
        self.listings
            .write()
            .await
            .insert(listing.id, listing.clone());
        listing
    }

    /// Rename a user; existing conversations keep their snapshot
    pub async fn rename_user(&self, id: Uuid, display_name: &str) {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.display_name = display_name.to_string();
        }
    }
}

#[async_trait::async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserProfile>, DirectoryError> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}

#[async_trait::async_trait]
impl ListingLookup for InMemoryDirectory {
    async fn find_listing(&self, id: Uuid) -> Result<Option<ListingSummary>, DirectoryError> {
        Ok(self.listings.read().await.get(&id).cloned())
    }
}
