//! Configuration management following 12-factor app principles
//!
//! All configuration is loaded from environment variables to ensure
//! clean separation between code and config.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database connection URL (PostgreSQL). Unset runs everything in memory.
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    /// Identity token claim checks (the token signature is verified upstream)
    pub identity_issuer: Option<String>,
    pub identity_audience: Option<String>,

    /// Timeouts, in milliseconds
    pub request_timeout_ms: u64,
    pub conversation_lock_timeout_ms: u64,
    pub store_timeout_ms: u64,

    /// Runtime configuration
    pub rust_log: String,
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            database_url: non_empty("DATABASE_URL"),
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,

            identity_issuer: non_empty("IDENTITY_ISSUER"),
            identity_audience: non_empty("IDENTITY_AUDIENCE"),

            request_timeout_ms: parse_or(&lookup, "REQUEST_TIMEOUT_MS", 10_000)?,
            conversation_lock_timeout_ms: parse_or(&lookup, "CONVERSATION_LOCK_TIMEOUT_MS", 5_000)?,
            store_timeout_ms: parse_or(&lookup, "STORE_TIMEOUT_MS", 5_000)?,

            rust_log: lookup("RUST_LOG")
                .unwrap_or_else(|| "staybook=debug,tower_http=info".to_string()),
            port: parse_or(&lookup, "PORT", 3000)?,
        };

        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn conversation_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.conversation_lock_timeout_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}
