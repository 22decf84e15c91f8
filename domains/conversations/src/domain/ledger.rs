//! Per-participant unread bookkeeping
//!
//! For every participant `p`, the count equals the number of messages sent
//! by someone other than `p` that `p` has not yet read. Counts only move
//! through `record_append` (exactly +1 for the recipient) and `reset`
//! (back to 0 for the reader), never by recomputation from a stale copy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entities::Message;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnreadLedger(BTreeMap<Uuid, u32>);

impl UnreadLedger {
    /// Ledger with every participant at zero
    pub fn new(participants: impl IntoIterator<Item = Uuid>) -> Self {
        Self(participants.into_iter().map(|p| (p, 0)).collect())
    }

    /// Rebuild a ledger from stored counters
    pub fn from_counts(counts: impl IntoIterator<Item = (Uuid, u32)>) -> Self {
        Self(counts.into_iter().collect())
    }

    /// Unread count for `user_id`; absent keys read as zero
    pub fn get(&self, user_id: Uuid) -> u32 {
        self.0.get(&user_id).copied().unwrap_or(0)
    }

    /// Count one new message for `recipient`, returning the new count
    pub fn record_append(&mut self, recipient: Uuid) -> u32 {
        let count = self.0.entry(recipient).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Reset `reader` to zero. Returns whether the count changed.
    pub fn reset(&mut self, reader: Uuid) -> bool {
        match self.0.insert(reader, 0) {
            Some(previous) => previous > 0,
            None => false,
        }
    }

    pub fn counts(&self) -> &BTreeMap<Uuid, u32> {
        &self.0
    }

    /// Counts implied by the message log alone
    pub fn expected(participants: &[Uuid], messages: &[Message]) -> Self {
        Self(
            participants
                .iter()
                .map(|&p| {
                    let unread = messages
                        .iter()
                        .filter(|m| m.sender_id != p && !m.read)
                        .count();
                    (p, u32::try_from(unread).unwrap_or(u32::MAX))
                })
                .collect(),
        )
    }

    /// Whether every participant's count matches the message log
    pub fn is_consistent_with(&self, participants: &[Uuid], messages: &[Message]) -> bool {
        let expected = Self::expected(participants, messages);
        participants.iter().all(|&p| self.get(p) == expected.get(p))
            && self.0.keys().all(|k| participants.contains(k))
    }
}
