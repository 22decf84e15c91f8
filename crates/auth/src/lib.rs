//! Identity extraction for Staybook
//!
//! The external identity layer authenticates callers and forwards a signed
//! token. This crate trusts that token: it decodes the claims, checks the
//! optional issuer/audience/expiry, and exposes the caller's user id through
//! axum extractors that work with any state implementing `FromRef<S>` for
//! `AuthBackend`.

mod backend;
mod claims;
mod config;
mod error;
mod extractors;
mod identity;
mod jwt;

pub use backend::AuthBackend;
pub use claims::IdentityClaims;
pub use config::AuthConfig;
pub use error::AuthError;
pub use extractors::{AuthUser, SocketUser};
pub use identity::Identity;
