//! Shared utilities, configuration, and error handling for Staybook
//!
//! This crate provides common functionality used across the Staybook workspace:
//! - Configuration management following 12-factor principles
//! - Error types and their HTTP rendering
//! - Request extractors
//! - State machine errors

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod state;

pub use config::Config;
pub use db::RepositoryError;
pub use error::{Error, Result};
pub use extractors::ValidatedJson;
pub use state::StateError;
