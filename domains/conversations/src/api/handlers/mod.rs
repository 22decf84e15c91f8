//! HTTP and transport-event handlers

pub mod conversations;
pub mod messages;
pub mod realtime;
