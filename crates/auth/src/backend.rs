//! Identity backend
//!
//! Domain states expose this via `FromRef`:
//! ```ignore
//! impl FromRef<MyDomainState> for AuthBackend {
//!     fn from_ref(state: &MyDomainState) -> Self {
//!         state.auth.clone()
//!     }
//! }
//! ```

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::identity::Identity;
use crate::jwt::decode_identity_token;

#[derive(Debug, Clone, Default)]
pub struct AuthBackend {
    config: AuthConfig,
}

impl AuthBackend {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Resolve the caller from a forwarded identity token
    pub fn authenticate_token(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = decode_identity_token(token, &self.config)?;
        let identity = Identity::try_from(claims)?;
        tracing::trace!(user_id = %identity.user_id, "Identity resolved");
        Ok(identity)
    }
}
