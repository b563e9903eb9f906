use super::{BrowserSessionId, SessionStore, StoreError};
use async_trait::async_trait;
use moka::future::Cache;
use std::time::Duration;
use tracing::debug;

/// In-memory session store
///
/// Entries expire after `idle` without access, mirroring browser-session
/// expiry. Nothing survives a process restart.
#[derive(Clone)]
pub struct MemorySessionStore {
    cache: Cache<BrowserSessionId, String>,
}

impl MemorySessionStore {
    /// Create a store whose entries expire after `idle` of inactivity
    #[must_use]
    pub fn new(idle: Duration, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_idle(idle)
            .build();
        Self { cache }
    }

    /// Number of stored sessions
    #[must_use]
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Returns `true` if no sessions are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &BrowserSessionId) -> Result<Option<String>, StoreError> {
        Ok(self.cache.get(id).await)
    }

    async fn set(&self, id: &BrowserSessionId, session: String) -> Result<(), StoreError> {
        debug!(browser_session = %id, "Storing Telegram session in memory");
        self.cache.insert(id.clone(), session).await;
        Ok(())
    }

    async fn clear(&self, id: &BrowserSessionId) -> Result<(), StoreError> {
        self.cache.invalidate(id).await;
        Ok(())
    }
}
