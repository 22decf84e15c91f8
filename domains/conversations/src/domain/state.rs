//! State machine for conversation room membership
//!
//! Tracked per (connection, conversation): Unjoined ↔ Joined

pub use staybook_common::StateError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomState {
    Unjoined,
    Joined,
}

impl RoomState {
    /// Get all valid next states from current state
    pub fn valid_transitions(&self) -> &'static [RoomState] {
        match self {
            Self::Unjoined => &[Self::Joined],
            Self::Joined => &[Self::Unjoined],
        }
    }
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unjoined => write!(f, "unjoined"),
            Self::Joined => write!(f, "joined"),
        }
    }
}

/// Events that move a connection in or out of a conversation room
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoomEvent {
    Join,
    Leave,
    /// The connection went away
    Disconnect,
}

impl std::fmt::Display for RoomEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Join => write!(f, "join"),
            Self::Leave => write!(f, "leave"),
            Self::Disconnect => write!(f, "disconnect"),
        }
    }
}

pub struct RoomStateMachine;

impl RoomStateMachine {
    /// Attempt a state transition
    ///
    /// Joining a joined room or leaving an unjoined one is rejected; callers
    /// that want idempotent toggles treat the rejection as a no-op.
    pub fn transition(current: RoomState, event: RoomEvent) -> Result<RoomState, StateError> {
        match (current, event) {
            (RoomState::Unjoined, RoomEvent::Join) => Ok(RoomState::Joined),
            (RoomState::Joined, RoomEvent::Leave | RoomEvent::Disconnect) => {
                Ok(RoomState::Unjoined)
            }
            _ => Err(StateError::InvalidTransition {
                from: current.to_string(),
                event: event.to_string(),
            }),
        }
    }
}
