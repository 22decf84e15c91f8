//! Domain entities for the Conversations domain
//!
//! A conversation binds two participants and a listing to an append-only
//! message log. Participant and listing details are snapshots taken when
//! the conversation (or message) was created.

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use staybook_directory::{ListingSummary, UserProfile};
use uuid::Uuid;

use super::error::ConversationError;
use super::ledger::UnreadLedger;

/// Maximum message length, in characters
pub const MAX_CONTENT_CHARS: usize = 1000;

/// Characters kept in the `lastMessage` preview
pub const PREVIEW_CHARS: usize = 50;

/// Trim and validate message content
pub fn validate_content(raw: &str) -> Result<String, ConversationError> {
    let content = raw.trim();
    let chars = content.chars().count();

    if chars == 0 {
        return Err(ConversationError::ContentInvalid(
            "Message content cannot be empty".to_string(),
        ));
    }
    if chars > MAX_CONTENT_CHARS {
        return Err(ConversationError::ContentInvalid(format!(
            "Message content must be at most {} characters",
            MAX_CONTENT_CHARS
        )));
    }

    Ok(content.to_string())
}

/// Preview shown in conversation lists
pub fn preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_CHARS {
        let head: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        content.to_string()
    }
}

/// Current time at the precision the store keeps
pub fn now_micros() -> DateTime<Utc> {
    truncate_micros(Utc::now())
}

fn truncate_micros(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(Duration::microseconds(1)).unwrap_or(at)
}

/// Participant snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
}

impl From<UserProfile> for Participant {
    fn from(profile: UserProfile) -> Self {
        Self {
            user_id: profile.id,
            email: profile.email,
            display_name: profile.display_name,
        }
    }
}

/// Unordered participant pair, stored low/high
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticipantPair {
    pub low: Uuid,
    pub high: Uuid,
}

impl ParticipantPair {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }
}

/// Message entity; only `read` changes after append
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub sender_email: String,
    pub sender_name: String,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a new unread message from `sender`
    pub fn new(
        sender: &Participant,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ConversationError> {
        let content = validate_content(content)?;

        Ok(Message {
            id: Uuid::new_v4(),
            sender_id: sender.user_id,
            sender_email: sender.email.clone(),
            sender_name: sender.display_name.clone(),
            content,
            read: false,
            created_at,
        })
    }
}

/// Conversation aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub participants: [Participant; 2],
    pub listing_id: Uuid,
    pub listing_name: String,
    pub messages: Vec<Message>,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_counts: UnreadLedger,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create an empty conversation between `initiator` and `recipient`
    pub fn new(
        initiator: Participant,
        recipient: Participant,
        listing: &ListingSummary,
    ) -> Result<Self, ConversationError> {
        if initiator.user_id == recipient.user_id {
            return Err(ConversationError::SelfConversation);
        }

        let now = now_micros();
        Ok(Conversation {
            id: Uuid::new_v4(),
            unread_counts: UnreadLedger::new([initiator.user_id, recipient.user_id]),
            participants: [initiator, recipient],
            listing_id: listing.id,
            listing_name: listing.name.clone(),
            messages: Vec::new(),
            last_message: None,
            last_message_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn participant(&self, user_id: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.participant(user_id).is_some()
    }

    /// The other participant, if `user_id` is one of the pair
    pub fn counterpart(&self, user_id: Uuid) -> Option<&Participant> {
        if !self.is_participant(user_id) {
            return None;
        }
        self.participants.iter().find(|p| p.user_id != user_id)
    }

    pub fn participant_ids(&self) -> [Uuid; 2] {
        [self.participants[0].user_id, self.participants[1].user_id]
    }

    pub fn pair(&self) -> ParticipantPair {
        let [a, b] = self.participant_ids();
        ParticipantPair::new(a, b)
    }

    pub fn unread_for(&self, user_id: Uuid) -> u32 {
        self.unread_counts.get(user_id)
    }

    /// Timestamp for the next message, strictly after the last mutation
    pub fn next_message_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let now = truncate_micros(now);
        let floor = match self.last_message_at {
            Some(last) => last.max(self.updated_at),
            None => self.updated_at,
        };
        if now <= floor {
            floor + Duration::microseconds(1)
        } else {
            now
        }
    }

    /// Validate the sender and append, returning the recipient
    pub fn apply_append(&mut self, message: Message) -> Result<Uuid, ConversationError> {
        let recipient = self
            .counterpart(message.sender_id)
            .ok_or(ConversationError::SenderNotParticipant)?
            .user_id;
        self.record_message(message, recipient);
        Ok(recipient)
    }

    /// Append an already validated message for `recipient`
    pub fn record_message(&mut self, message: Message, recipient: Uuid) {
        self.last_message = Some(preview(&message.content));
        self.last_message_at = Some(message.created_at);
        self.updated_at = message.created_at.max(self.updated_at);
        self.unread_counts.record_append(recipient);
        self.messages.push(message);
    }

    /// Mark everything sent to `reader` as read. Returns whether anything
    /// changed; a no-op leaves `updated_at` untouched.
    pub fn apply_mark_read(
        &mut self,
        reader: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, ConversationError> {
        if !self.is_participant(reader) {
            return Err(ConversationError::CallerNotParticipant);
        }

        let mut changed = false;
        for message in self
            .messages
            .iter_mut()
            .filter(|m| m.sender_id != reader && !m.read)
        {
            message.read = true;
            changed = true;
        }
        changed |= self.unread_counts.reset(reader);

        if changed {
            self.updated_at = truncate_micros(at).max(self.updated_at + Duration::microseconds(1));
        }
        Ok(changed)
    }

    /// List view for `user_id`
    pub fn summary_for(&self, user_id: Uuid) -> ConversationSummary {
        ConversationSummary {
            id: self.id,
            participants: self.participants.clone(),
            listing_id: self.listing_id,
            listing_name: self.listing_name.clone(),
            last_message: self.last_message.clone(),
            last_message_at: self.last_message_at,
            unread_count: self.unread_for(user_id),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Conversation without its message log, as seen by one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Uuid,
    pub participants: [Participant; 2],
    pub listing_id: Uuid,
    pub listing_name: String,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
