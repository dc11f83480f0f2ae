//! Configuration module - environment variable parsing

use std::env;

/// Client configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the Ender backend
    pub server_url: String,
    /// Numeric user id the hero is fetched or created for
    pub user_id: i64,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Milliseconds between world-delta polls
    pub poll_interval_ms: u64,
    /// Per-request timeout; kept below the poll interval so a hung fetch
    /// is superseded rather than piled onto
    pub request_timeout_ms: u64,

    /// Drive the local hero with the seeded wander bot
    pub wander_enabled: bool,
    /// Seed for the wander bot's RNG
    pub bot_seed: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_url = env::var("ENDER_SERVER_URL")
            .map_err(|_| ConfigError::Missing("ENDER_SERVER_URL"))?
            .trim_end_matches('/')
            .to_string();

        let user_id = env::var("ENDER_USER_ID")
            .map_err(|_| ConfigError::Missing("ENDER_USER_ID"))?
            .parse()
            .map_err(|_| ConfigError::Invalid("ENDER_USER_ID"))?;

        Ok(Self {
            server_url,
            user_id,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            poll_interval_ms: parse_or("ENDER_POLL_INTERVAL_MS", 1_000)?,
            request_timeout_ms: parse_or("ENDER_REQUEST_TIMEOUT_MS", 900)?,
            wander_enabled: env::var("ENDER_WANDER")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
            bot_seed: parse_or("ENDER_BOT_SEED", 42)?,
        })
    }
}

fn parse_or(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
