//! Registry of open Telegram connections
//!
//! Owned by the process entry point. It is bookkeeping only: connections are
//! never shared through it. At shutdown the entry point calls
//! [`ConnectionRegistry::shutdown`] to wait for in-flight operations.

use super::TelegramError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{info, warn};

struct OpenConnection {
    purpose: &'static str,
    opened_at: Instant,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    open: HashMap<u64, OpenConnection>,
}

/// Tracks open connections so shutdown can wait for them
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: Mutex<Inner>,
    closing: AtomicBool,
    drained: Notify,
}

impl ConnectionRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a new connection
    ///
    /// # Errors
    ///
    /// Returns `TelegramError::ShuttingDown` after shutdown started.
    pub fn register(self: &Arc<Self>, purpose: &'static str) -> Result<RegistryTicket, TelegramError> {
        if self.closing.load(Ordering::Acquire) {
            return Err(TelegramError::ShuttingDown);
        }
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.open.insert(
            id,
            OpenConnection {
                purpose,
                opened_at: Instant::now(),
            },
        );
        Ok(RegistryTicket {
            id,
            registry: Arc::clone(self),
        })
    }

    /// Number of connections currently open
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.lock().open.len()
    }

    /// Whether shutdown has started
    #[must_use]
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    fn release(&self, id: u64) {
        let empty = {
            let mut inner = self.lock();
            inner.open.remove(&id);
            inner.open.is_empty()
        };
        if empty {
            self.drained.notify_waiters();
        }
    }

    /// Refuse new connections and wait up to `grace` for open ones to close
    ///
    /// Best-effort: returns the number of connections still open when the
    /// grace period ran out.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        self.closing.store(true, Ordering::Release);

        let deadline = tokio::time::Instant::now() + grace;
        loop {
            let drained = self.drained.notified();
            let remaining = self.open_count();
            if remaining == 0 {
                info!("All Telegram connections closed");
                return 0;
            }
            if tokio::time::timeout_at(deadline, drained).await.is_err() {
                break;
            }
        }

        let inner = self.lock();
        for (id, conn) in &inner.open {
            warn!(
                connection = id,
                purpose = conn.purpose,
                open_for_ms = conn.opened_at.elapsed().as_millis(),
                "Telegram connection still open at shutdown"
            );
        }
        inner.open.len()
    }
}

/// Registration of one open connection; dropping it deregisters
pub struct RegistryTicket {
    id: u64,
    registry: Arc<ConnectionRegistry>,
}

impl RegistryTicket {
    /// Registry-local id of the connection
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for RegistryTicket {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tickets_deregister_on_drop() -> Result<(), TelegramError> {
        let registry = Arc::new(ConnectionRegistry::new());
        let first = registry.register("list")?;
        let second = registry.register("download")?;
        assert_ne!(first.id(), second.id());
        assert_eq!(registry.open_count(), 2);

        drop(first);
        assert_eq!(registry.open_count(), 1);
        drop(second);
        assert_eq!(registry.open_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_shutdown_refuses_new_connections() {
        let registry = Arc::new(ConnectionRegistry::new());
        assert_eq!(registry.shutdown(Duration::from_millis(10)).await, 0);
        assert!(registry.is_closing());
        assert!(matches!(
            registry.register("late"),
            Err(TelegramError::ShuttingDown)
        ));
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_open_connections() -> Result<(), TelegramError> {
        let registry = Arc::new(ConnectionRegistry::new());
        let ticket = registry.register("archive")?;

        let releaser = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            drop(ticket);
        });

        assert_eq!(registry.shutdown(Duration::from_secs(5)).await, 0);
        let _ = releaser.await;
        Ok(())
    }

    #[tokio::test]
    async fn test_shutdown_gives_up_after_grace() -> Result<(), TelegramError> {
        let registry = Arc::new(ConnectionRegistry::new());
        let _stuck = registry.register("stuck")?;
        assert_eq!(registry.shutdown(Duration::from_millis(20)).await, 1);
        Ok(())
    }
}
