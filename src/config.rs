//! Configuration and settings management
//!
//! Loads settings from optional config files and environment variables.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::favorites::DEFAULT_LIST_LIMIT;
use crate::session::FileSessionStore;

/// Where per-browser Telegram sessions are kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackendKind {
    /// Process memory, lost on restart
    #[default]
    Memory,
    /// One file per browser session
    File,
}

/// Application settings
#[derive(Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram API id (from my.telegram.org)
    pub api_id: i32,
    /// Telegram API hash
    pub api_hash: String,

    /// HTTP listen address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Session store backend
    #[serde(default)]
    pub session_backend: SessionBackendKind,
    /// Directory of the file-backed session store
    pub session_dir: Option<PathBuf>,
    /// Browser-session lifetime without activity, in seconds
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,

    /// Messages inspected per dashboard load
    #[serde(default = "default_favorites_limit")]
    pub favorites_limit: usize,

    /// Seconds to wait for open Telegram connections at shutdown
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8501".to_string()
}

const fn default_session_idle_secs() -> u64 {
    6 * 60 * 60
}

const fn default_favorites_limit() -> usize {
    DEFAULT_LIST_LIMIT
}

const fn default_shutdown_grace_secs() -> u64 {
    5
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_id", &self.api_id)
            .field("api_hash", &"[MASKED]")
            .field("bind_addr", &self.bind_addr)
            .field("session_backend", &self.session_backend)
            .field("session_dir", &self.session_dir)
            .field("session_idle_secs", &self.session_idle_secs)
            .field("favorites_limit", &self.favorites_limit)
            .field("shutdown_grace_secs", &self.shutdown_grace_secs)
            .finish()
    }
}

impl Settings {
    /// Create new settings by loading from config files and the environment
    ///
    /// Sources, later ones winning: `config/default`, `config/{RUN_MODE}`,
    /// `config/local` (development secrets, never committed), `APP__*`
    /// variables, plain variables such as `API_ID` / `API_HASH`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or a value is invalid.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        let settings: Self = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check values the type system cannot
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` describing the first invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_id <= 0 {
            return Err(ConfigError::Message("API_ID must be a positive number".into()));
        }
        if self.api_hash.trim().is_empty() {
            return Err(ConfigError::Message("API_HASH is missing".into()));
        }
        if self.favorites_limit == 0 {
            return Err(ConfigError::Message("FAVORITES_LIMIT must be at least 1".into()));
        }
        self.socket_addr()?;
        Ok(())
    }

    /// Parsed listen address
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` if `bind_addr` is not `host:port`.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_addr
            .parse()
            .map_err(|e| ConfigError::Message(format!("BIND_ADDR '{}': {e}", self.bind_addr)))
    }

    /// Directory for the file-backed session store
    #[must_use]
    pub fn session_dir(&self) -> PathBuf {
        self.session_dir
            .clone()
            .unwrap_or_else(FileSessionStore::default_dir)
    }

    /// Browser-session lifetime
    #[must_use]
    pub const fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    /// Shutdown grace period
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
