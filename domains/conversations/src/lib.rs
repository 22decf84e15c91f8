//! Conversations domain: guest/host messaging about a listing
//!
//! `ConversationService` owns every mutation of the conversation aggregate.
//! The HTTP handlers and the transport adapter both reach it through
//! `Messenger`, which also fans the result out to rooms and notifications.

pub mod api;
pub mod bridge;
pub mod domain;
pub mod pipeline;
pub mod realtime;
pub mod repository;
pub mod service;

// Re-export domain types at the crate root for convenience
pub use domain::entities::{Conversation, ConversationSummary, Message, Participant};
pub use domain::error::ConversationError;
pub use domain::ledger::UnreadLedger;
pub use domain::state::{RoomEvent, RoomState, RoomStateMachine, StateError};

// Re-export repository types
pub use repository::{
    ConversationStore, InMemoryConversationStore, PgConversationStore, ReadOutcome,
};

// Re-export service and delivery types
pub use bridge::NotificationBridge;
pub use pipeline::Messenger;
pub use realtime::{ClientEvent, InMemoryGateway, RealtimeGateway, ServerEvent};
pub use service::{Appended, ConversationService};

// Re-export API types
pub use api::handlers::realtime::ClientSession;
pub use api::routes;
pub use api::ConversationsState;
