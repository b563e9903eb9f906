//! Login attempts waiting for their next step
//!
//! A code request can move the client to the account's home data center,
//! and the session only records that DC once login completes. The client
//! that asked for the code is therefore kept with its login token, and the
//! code and password steps go through it.

use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// One pending login: the client that requested the code and its token
pub struct PendingLogin<C, T> {
    pub client: C,
    pub token: T,
}

/// Pending logins keyed by a random id, dropped after `ttl`
pub struct PendingLogins<C, T> {
    logins: Cache<String, Arc<PendingLogin<C, T>>>,
}

impl<C, T> Clone for PendingLogins<C, T> {
    fn clone(&self) -> Self {
        Self {
            logins: self.logins.clone(),
        }
    }
}

impl<C, T> PendingLogins<C, T>
where
    C: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        let logins = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { logins }
    }

    /// Keep `client` and `token` until the login finishes; returns its id
    pub async fn insert(&self, client: C, token: T) -> String {
        let id = Uuid::new_v4().simple().to_string();
        self.logins
            .insert(id.clone(), Arc::new(PendingLogin { client, token }))
            .await;
        id
    }

    pub async fn get(&self, id: &str) -> Option<Arc<PendingLogin<C, T>>> {
        self.logins.get(id).await
    }

    /// Forget a login once it completed
    pub async fn finish(&self, id: &str) {
        self.logins.invalidate(id).await;
    }
}
