//! Realtime delivery: transport events and the connection gateway

pub mod events;
pub mod gateway;

pub use events::{ClientEvent, ServerEvent};
pub use gateway::{ConnectionId, InMemoryGateway, Outbound, RealtimeGateway};
