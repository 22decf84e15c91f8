//! PostgreSQL conversation store
//!
//! Conversations live in three tables: the header row (`conversations`), an
//! append-only log (`conversation_messages`) and one counter row per
//! participant (`conversation_unread`). Each mutation runs in a single
//! transaction that starts by locking the header row. Reads assemble the
//! aggregate inside one repeatable-read snapshot.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use staybook_common::RepositoryError;
use uuid::Uuid;

use super::{ConversationStore, ReadOutcome};
use crate::domain::entities::{
    preview, Conversation, ConversationSummary, Message, Participant, ParticipantPair,
};
use crate::domain::ledger::UnreadLedger;

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: Uuid,
    listing_id: Uuid,
    listing_name: String,
    participants: Json<Vec<Participant>>,
    last_message: Option<String>,
    last_message_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: Uuid,
    listing_id: Uuid,
    listing_name: String,
    participants: Json<Vec<Participant>>,
    last_message: Option<String>,
    last_message_at: Option<DateTime<Utc>>,
    unread_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    sender_id: Uuid,
    sender_email: String,
    sender_name: String,
    content: String,
    read: bool,
    created_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: row.id,
            sender_id: row.sender_id,
            sender_email: row.sender_email,
            sender_name: row.sender_name,
            content: row.content,
            read: row.read,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UnreadRow {
    user_id: Uuid,
    unread_count: i32,
}

fn participant_pair(participants: Vec<Participant>) -> Result<[Participant; 2], RepositoryError> {
    <[Participant; 2]>::try_from(participants).map_err(|found| {
        RepositoryError::InvalidData(format!(
            "conversation has {} participants, expected 2",
            found.len()
        ))
    })
}

fn count_from_db(count: i32) -> u32 {
    u32::try_from(count).unwrap_or(0)
}

const CONVERSATION_COLUMNS: &str = r#"
    id, listing_id, listing_name, participants,
    last_message, last_message_at, created_at, updated_at
"#;

/// Load a full aggregate on an existing connection or transaction
async fn load(conn: &mut PgConnection, id: Uuid) -> Result<Option<Conversation>, RepositoryError> {
    let row = sqlx::query_as::<_, ConversationRow>(&format!(
        "SELECT {} FROM conversations WHERE id = $1",
        CONVERSATION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let messages = sqlx::query_as::<_, MessageRow>(
        r#"
        SELECT id, sender_id, sender_email, sender_name, content, read, created_at
        FROM conversation_messages
        WHERE conversation_id = $1
        ORDER BY seq
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let counters = sqlx::query_as::<_, UnreadRow>(
        r#"
        SELECT user_id, unread_count
        FROM conversation_unread
        WHERE conversation_id = $1
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(Conversation {
        id: row.id,
        participants: participant_pair(row.participants.0)?,
        listing_id: row.listing_id,
        listing_name: row.listing_name,
        messages: messages.into_iter().map(Message::from).collect(),
        last_message: row.last_message,
        last_message_at: row.last_message_at,
        unread_counts: UnreadLedger::from_counts(
            counters
                .into_iter()
                .map(|c| (c.user_id, count_from_db(c.unread_count))),
        ),
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

/// Read-only transaction whose statements all see the same snapshot
async fn begin_snapshot(pool: &PgPool) -> Result<Transaction<'static, Postgres>, RepositoryError> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

async fn insert_message(
    conn: &mut PgConnection,
    conversation_id: Uuid,
    message: &Message,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
        INSERT INTO conversation_messages (
            id, conversation_id, seq, sender_id, sender_email, sender_name,
            content, read, created_at
        )
        SELECT $1, $2, COALESCE(MAX(seq), 0) + 1, $3, $4, $5, $6, $7, $8
        FROM conversation_messages
        WHERE conversation_id = $2
        "#,
    )
    .bind(message.id)
    .bind(conversation_id)
    .bind(message.sender_id)
    .bind(&message.sender_email)
    .bind(&message.sender_name)
    .bind(&message.content)
    .bind(message.read)
    .bind(message.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[derive(Clone)]
pub struct PgConversationStore {
    pool: PgPool,
}

impl PgConversationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationStore for PgConversationStore {
    async fn insert(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        let pair = conversation.pair();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO conversations (
                id, listing_id, listing_name, participants,
                participant_low, participant_high,
                last_message, last_message_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(conversation.id)
        .bind(conversation.listing_id)
        .bind(&conversation.listing_name)
        .bind(Json(conversation.participants.to_vec()))
        .bind(pair.low)
        .bind(pair.high)
        .bind(&conversation.last_message)
        .bind(conversation.last_message_at)
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from_insert)?;

        for message in &conversation.messages {
            insert_message(&mut *tx, conversation.id, message).await?;
        }

        for user_id in conversation.participant_ids() {
            sqlx::query(
                r#"
                INSERT INTO conversation_unread (conversation_id, user_id, unread_count)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(conversation.id)
            .bind(user_id)
            .bind(i32::try_from(conversation.unread_for(user_id)).unwrap_or(i32::MAX))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Conversation>, RepositoryError> {
        let mut tx = begin_snapshot(&self.pool).await?;
        let conversation = load(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(conversation)
    }

    async fn find_by_pair(
        &self,
        listing_id: Uuid,
        pair: ParticipantPair,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let mut tx = begin_snapshot(&self.pool).await?;

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM conversations
            WHERE listing_id = $1 AND participant_low = $2 AND participant_high = $3
            "#,
        )
        .bind(listing_id)
        .bind(pair.low)
        .bind(pair.high)
        .fetch_optional(&mut *tx)
        .await?;

        let conversation = match id {
            Some(id) => load(&mut *tx, id).await?,
            None => None,
        };
        tx.commit().await?;
        Ok(conversation)
    }

    async fn list_for_participant(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT c.id, c.listing_id, c.listing_name, c.participants,
                   c.last_message, c.last_message_at,
                   COALESCE(u.unread_count, 0) AS unread_count,
                   c.created_at, c.updated_at
            FROM conversations c
            LEFT JOIN conversation_unread u
                   ON u.conversation_id = c.id AND u.user_id = $1
            WHERE c.participant_low = $1 OR c.participant_high = $1
            ORDER BY c.updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ConversationSummary {
                    id: row.id,
                    participants: participant_pair(row.participants.0)?,
                    listing_id: row.listing_id,
                    listing_name: row.listing_name,
                    last_message: row.last_message,
                    last_message_at: row.last_message_at,
                    unread_count: count_from_db(row.unread_count),
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                })
            })
            .collect()
    }

    async fn unread_total(&self, user_id: Uuid) -> Result<u64, RepositoryError> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(unread_count), 0)::BIGINT
            FROM conversation_unread
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn append(
        &self,
        id: Uuid,
        message: &Message,
        recipient: Uuid,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Takes the row lock that serializes writers across processes
        let touched = sqlx::query(
            r#"
            UPDATE conversations SET
                last_message = $2,
                last_message_at = $3,
                updated_at = GREATEST(updated_at, $3)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(preview(&message.content))
        .bind(message.created_at)
        .execute(&mut *tx)
        .await?;

        if touched.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        insert_message(&mut *tx, id, message).await?;

        sqlx::query(
            r#"
            INSERT INTO conversation_unread (conversation_id, user_id, unread_count)
            VALUES ($1, $2, 1)
            ON CONFLICT (conversation_id, user_id)
            DO UPDATE SET unread_count = conversation_unread.unread_count + 1
            "#,
        )
        .bind(id)
        .bind(recipient)
        .execute(&mut *tx)
        .await?;

        let conversation = load(&mut *tx, id).await?;
        tx.commit().await?;

        Ok(conversation)
    }

    async fn mark_read(
        &self,
        id: Uuid,
        reader: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<ReadOutcome>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM conversations WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        if locked.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let flipped = sqlx::query(
            r#"
            UPDATE conversation_messages SET read = TRUE
            WHERE conversation_id = $1 AND sender_id <> $2 AND read = FALSE
            "#,
        )
        .bind(id)
        .bind(reader)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let reset = sqlx::query(
            r#"
            UPDATE conversation_unread SET unread_count = 0
            WHERE conversation_id = $1 AND user_id = $2 AND unread_count > 0
            "#,
        )
        .bind(id)
        .bind(reader)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let changed = flipped > 0 || reset > 0;
        if changed {
            sqlx::query(
                r#"
                UPDATE conversations
                SET updated_at = GREATEST($2, updated_at + INTERVAL '1 microsecond')
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(at)
            .execute(&mut *tx)
            .await?;
        }

        let conversation = load(&mut *tx, id).await?;
        tx.commit().await?;

        Ok(conversation.map(|conversation| ReadOutcome {
            conversation,
            changed,
        }))
    }
}
