//! Per-browser-session storage of Telegram session strings
//!
//! Every browser session owns at most one serialized Telegram session.
//! Two backends exist: an in-memory cache that forgets everything on restart
//! and a file-backed store that keeps one file per browser session.

mod file;
mod memory;

pub use file::FileSessionStore;
pub use memory::MemorySessionStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Length of a browser-session identifier in hex characters
pub const BROWSER_SESSION_ID_LEN: usize = 16;

/// Errors raised by session stores
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Corrupt session file
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Identifier failed validation
    #[error("invalid browser session id")]
    InvalidId,
}

/// Random identifier of one browser session (16 lowercase hex characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BrowserSessionId(String);

impl BrowserSessionId {
    /// Generate a fresh random identifier
    #[must_use]
    pub fn generate() -> Self {
        use std::fmt::Write as _;

        // Bytes 6 and 8 of a v4 UUID carry version and variant bits; skip them.
        let uuid = Uuid::new_v4();
        let bytes = uuid.as_bytes();
        let mut raw = String::with_capacity(BROWSER_SESSION_ID_LEN);
        for byte in bytes[..6].iter().chain(&bytes[10..12]) {
            let _ = write!(raw, "{byte:02x}");
        }
        Self(raw)
    }

    /// Parse an identifier received from the client
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidId` unless the value is exactly 16
    /// lowercase hex characters.
    pub fn parse(value: &str) -> Result<Self, StoreError> {
        let valid = value.len() == BROWSER_SESSION_ID_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(value.to_string()))
        } else {
            Err(StoreError::InvalidId)
        }
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BrowserSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BrowserSessionId {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BrowserSessionId> for String {
    fn from(id: BrowserSessionId) -> Self {
        id.0
    }
}

/// Storage for the serialized Telegram session of each browser session
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current session string, `None` when nothing is stored
    async fn get(&self, id: &BrowserSessionId) -> Result<Option<String>, StoreError>;

    /// Replace the session string
    async fn set(&self, id: &BrowserSessionId, session: String) -> Result<(), StoreError>;

    /// Forget the session string
    async fn clear(&self, id: &BrowserSessionId) -> Result<(), StoreError>;
}
