// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
use anyhow::Result;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::net::SocketAddr;

/// Application settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Log level filter
    pub log_level: String,
    /// Session store selection
    pub store: StoreSettings,
    /// Per-user per-event rate limiting
    pub rate_limit: RateLimitSettings,
    /// Whiteboard snapshot TTL in seconds
    pub whiteboard_ttl_secs: u64,
}

/// Which session store backend to run against. Selection is an explicit
/// configuration choice; business logic never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Redis,
}

/// Session store settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub redis_url: String,
    /// Pub/sub channel used for cross-process fan-out
    pub pubsub_channel: String,
}

/// Rate limit window and ceiling
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub window_secs: u64,
    pub max_events: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".parse().unwrap(),
            log_level: "info".to_string(),
            store: StoreSettings::default(),
            rate_limit: RateLimitSettings::default(),
            whiteboard_ttl_secs: 60 * 60 * 24, // 24 hours
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            pubsub_channel: "classroom:fanout".to_string(),
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_events: 100,
        }
    }
}

impl Settings {
    /// Load settings from `config.toml` and `CLASSROOM_`-prefixed
    /// environment variables, env taking precedence.
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load settings from an explicit file path plus the environment.
    pub fn load_from(path: &str) -> Result<Self> {
        let settings = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("CLASSROOM_").split("__"))
            .extract()?;
        Ok(settings)
    }
}
