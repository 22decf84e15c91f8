//! Identity configuration

/// Optional claim checks applied to forwarded identity tokens
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub issuer: Option<String>,
    pub audience: Option<String>,
}
