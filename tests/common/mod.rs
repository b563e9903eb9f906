//! In-process Telegram stand-in for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tg_favorites::media::{Attachment, MediaKind, MessageId, MessageRecord};
use tg_favorites::session::{BrowserSessionId, MemorySessionStore, SessionStore};
use tg_favorites::telegram::{
    CodeHandle, ConnectionRegistry, TelegramBackend, TelegramClient, TelegramConnection,
    TelegramError, UserId,
};
use tg_favorites::workflow::Services;

pub const PHONE: &str = "+10000000000";
pub const GOOD_CODE: &str = "12345";
pub const BAD_CODE: &str = "00000";
pub const USER_ID: UserId = 777;
/// Stored session value the fake cannot decode
pub const GARBAGE_SESSION: &str = "garbage";

/// Account and message state shared by all fake connections
#[derive(Default)]
pub struct FakeAccount {
    pub messages: Mutex<Vec<MessageRecord>>,
    pub payloads: Mutex<HashMap<MessageId, Vec<u8>>>,
    pub failing_downloads: Mutex<HashSet<MessageId>>,
    pub revoking_downloads: Mutex<HashSet<MessageId>>,
    pub password: Mutex<Option<String>>,
    pub revoked: AtomicBool,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
}

impl FakeAccount {
    pub fn with_password(self, password: &str) -> Self {
        *self.password.lock().expect("lock") = Some(password.to_string());
        self
    }

    /// Add a message, newest first
    pub fn push(&self, record: MessageRecord, payload: &[u8]) {
        self.payloads
            .lock()
            .expect("lock")
            .insert(record.id, payload.to_vec());
        self.messages.lock().expect("lock").insert(0, record);
    }

    pub fn remove(&self, id: MessageId) {
        self.messages.lock().expect("lock").retain(|m| m.id != id);
    }

    pub fn fail_download(&self, id: MessageId) {
        self.failing_downloads.lock().expect("lock").insert(id);
    }

    /// Revoke the session remotely when `id` is downloaded
    pub fn revoke_on_download(&self, id: MessageId) {
        self.revoking_downloads.lock().expect("lock").insert(id);
    }
}

pub struct FakeBackend {
    pub account: Arc<FakeAccount>,
}

#[async_trait]
impl TelegramBackend for FakeBackend {
    async fn connect(
        &self,
        session: Option<&str>,
    ) -> Result<Box<dyn TelegramConnection>, TelegramError> {
        let state = match session {
            Some(GARBAGE_SESSION) => {
                return Err(TelegramError::InvalidSession("unreadable".to_string()))
            }
            Some(s) => s.to_string(),
            None => "anon".to_string(),
        };
        self.account.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            account: self.account.clone(),
            state: Mutex::new(state),
        }))
    }
}

/// Session state is the serialized session: `anon`, `pending`, `2fa`, `auth`
pub struct FakeConnection {
    account: Arc<FakeAccount>,
    state: Mutex<String>,
}

impl FakeConnection {
    fn state(&self) -> String {
        self.state.lock().expect("lock").clone()
    }

    fn set_state(&self, state: &str) {
        *self.state.lock().expect("lock") = state.to_string();
    }

    fn authorized(&self) -> bool {
        self.state() == "auth" && !self.account.revoked.load(Ordering::SeqCst)
    }

    fn require_auth(&self) -> Result<(), TelegramError> {
        if self.authorized() {
            Ok(())
        } else {
            Err(TelegramError::NotAuthorized)
        }
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.account.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TelegramConnection for FakeConnection {
    async fn is_authorized(&self) -> Result<bool, TelegramError> {
        Ok(self.authorized())
    }

    async fn current_user(&self) -> Result<UserId, TelegramError> {
        self.require_auth()?;
        Ok(USER_ID)
    }

    async fn request_code(&self, phone: &str) -> Result<CodeHandle, TelegramError> {
        if !phone.starts_with('+') || phone.len() < 8 {
            return Err(TelegramError::Auth("PHONE_NUMBER_INVALID".to_string()));
        }
        self.set_state("pending");
        Ok(CodeHandle {
            phone: phone.to_string(),
            token_id: "token-1".to_string(),
        })
    }

    async fn sign_in_with_code(
        &self,
        _handle: &CodeHandle,
        code: &str,
    ) -> Result<UserId, TelegramError> {
        if code != GOOD_CODE {
            return Err(TelegramError::Auth("PHONE_CODE_INVALID".to_string()));
        }
        if self.account.password.lock().expect("lock").is_some() {
            self.set_state("2fa");
            return Err(TelegramError::TwoFactorRequired);
        }
        self.set_state("auth");
        Ok(USER_ID)
    }

    async fn sign_in_with_password(
        &self,
        _handle: &CodeHandle,
        password: &str,
    ) -> Result<UserId, TelegramError> {
        let expected = self.account.password.lock().expect("lock").clone();
        if self.state() != "2fa" || expected.as_deref() != Some(password) {
            return Err(TelegramError::Auth("PASSWORD_HASH_INVALID".to_string()));
        }
        self.set_state("auth");
        Ok(USER_ID)
    }

    async fn recent_self_messages(
        &self,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, TelegramError> {
        self.require_auth()?;
        let messages = self.account.messages.lock().expect("lock");
        Ok(messages.iter().take(limit).cloned().collect())
    }

    async fn self_message(&self, id: MessageId) -> Result<Option<MessageRecord>, TelegramError> {
        self.require_auth()?;
        let messages = self.account.messages.lock().expect("lock");
        Ok(messages.iter().find(|m| m.id == id).cloned())
    }

    async fn download_self_media(&self, id: MessageId) -> Result<Option<Vec<u8>>, TelegramError> {
        if self.account.revoking_downloads.lock().expect("lock").contains(&id) {
            self.account.revoked.store(true, Ordering::SeqCst);
        }
        self.require_auth()?;
        if self.account.failing_downloads.lock().expect("lock").contains(&id) {
            return Err(TelegramError::Unavailable("FILE_REFERENCE_EXPIRED".to_string()));
        }
        let exists = self
            .account
            .messages
            .lock()
            .expect("lock")
            .iter()
            .any(|m| m.id == id && m.is_downloadable());
        if !exists {
            return Ok(None);
        }
        Ok(self.account.payloads.lock().expect("lock").get(&id).cloned())
    }

    fn export_session(&self) -> Result<String, TelegramError> {
        Ok(self.state())
    }
}

/// Everything a test needs: services over the fake plus handles to inspect it
pub struct Harness {
    pub account: Arc<FakeAccount>,
    pub registry: Arc<ConnectionRegistry>,
    pub store: Arc<MemorySessionStore>,
    pub services: Services,
}

impl Harness {
    pub fn new(account: FakeAccount) -> Self {
        let account = Arc::new(account);
        let registry = Arc::new(ConnectionRegistry::new());
        let backend = Arc::new(FakeBackend {
            account: account.clone(),
        });
        let store = Arc::new(MemorySessionStore::new(Duration::from_secs(3600), 100));
        let services = Services {
            telegram: TelegramClient::new(backend, registry.clone()),
            sessions: store.clone(),
            favorites_limit: 200,
        };
        Self {
            account,
            registry,
            store,
            services,
        }
    }

    /// Store an authorized session for `browser`
    pub async fn authorize(&self, browser: &BrowserSessionId) {
        self.store
            .set(browser, "auth".to_string())
            .await
            .expect("store session");
    }

    /// Open an authorized connection directly
    pub async fn connection(&self) -> tg_favorites::telegram::ConnectionGuard {
        self.services
            .telegram
            .open(Some("auth"), "test")
            .await
            .expect("open connection")
    }

    /// Every opened connection was dropped and deregistered
    pub fn assert_all_closed(&self) {
        assert_eq!(self.registry.open_count(), 0, "registry still tracks connections");
        assert_eq!(
            self.account.opened.load(Ordering::SeqCst),
            self.account.closed.load(Ordering::SeqCst),
            "fake connections leaked"
        );
    }
}

pub fn at(minute: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0)
        .single()
        .expect("valid date")
}

pub fn photo(id: MessageId) -> MessageRecord {
    MessageRecord::with_attachment(id, at(0), MediaKind::Photo, Attachment::unnamed(Some(3)))
}

pub fn document(id: MessageId, name: &str) -> MessageRecord {
    MessageRecord::with_attachment(
        id,
        at(1),
        MediaKind::Document,
        Attachment::named(name, Some(4)),
    )
}
