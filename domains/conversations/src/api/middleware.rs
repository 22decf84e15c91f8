//! Conversations domain state and auth backend integration

use crate::pipeline::Messenger;
use crate::realtime::RealtimeGateway;
use axum::extract::FromRef;
use staybook_auth::AuthBackend;
use std::sync::Arc;

/// Application state for the Conversations domain
#[derive(Clone)]
pub struct ConversationsState {
    pub messenger: Messenger,
    pub gateway: Arc<dyn RealtimeGateway>,
    pub auth: AuthBackend,
}

impl FromRef<ConversationsState> for AuthBackend {
    fn from_ref(state: &ConversationsState) -> Self {
        state.auth.clone()
    }
}
