//! Staybook directory collaborators
//!
//! Read-only lookups the messaging core depends on:
//! - `UserDirectory` resolves a user id to the identity shown in conversations
//! - `ListingLookup` resolves a listing id to the name snapshotted on a conversation
//!
//! Both come with a PostgreSQL implementation and an in-memory one for
//! tests and database-less local runs.

use serde::{Deserialize, Serialize};
use staybook_common::Error;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryDirectory;
pub use postgres::PgDirectory;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Directory database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

impl From<DirectoryError> for Error {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Database(e) => Error::Database(e),
            DirectoryError::Unavailable(msg) => Error::Transient(msg),
        }
    }
}

/// Public identity of a user, as shown to the other participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
}

/// The slice of a listing the messaging core needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ListingSummary {
    pub id: Uuid,
    pub name: String,
    pub host_id: Uuid,
}

#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserProfile>, DirectoryError>;
}

#[async_trait::async_trait]
pub trait ListingLookup: Send + Sync {
    async fn find_listing(&self, id: Uuid) -> Result<Option<ListingSummary>, DirectoryError>;
}
