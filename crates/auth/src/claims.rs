//! Identity token claims

use serde::{Deserialize, Serialize};

/// Claims forwarded by the identity layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject (user ID)
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
    /// Issued at
    pub iat: Option<u64>,
    /// Expires at
    pub exp: Option<u64>,
}
