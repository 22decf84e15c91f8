//! API layer for the Conversations domain
//!
//! Contains HTTP handlers, the transport-event adapter, routes, and domain
//! state definition.

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use middleware::ConversationsState;
pub use routes::routes;
