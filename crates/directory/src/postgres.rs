//! PostgreSQL-backed directory

use sqlx::PgPool;
use uuid::Uuid;

use crate::{DirectoryError, ListingLookup, ListingSummary, UserDirectory, UserProfile};

#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserDirectory for PgDirectory {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserProfile>, DirectoryError> {
        let user = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, email,
                   COALESCE(NULLIF(name, ''), split_part(email, '@', 1)) AS display_name
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

#[async_trait::async_trait]
impl ListingLookup for PgDirectory {
    async fn find_listing(&self, id: Uuid) -> Result<Option<ListingSummary>, DirectoryError> {
        let listing = sqlx::query_as::<_, ListingSummary>(
            r#"
            SELECT id, title AS name, host_id
            FROM listings
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(listing)
    }
}
