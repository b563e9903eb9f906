//! Telegram session client
//!
//! The rest of the crate talks to Telegram only through
//! [`TelegramBackend`] / [`TelegramConnection`]. Every connection is wrapped
//! in a [`ConnectionGuard`] that closes the transport and removes it from the
//! [`ConnectionRegistry`] when dropped, whatever the exit path.

mod grammers;
mod pending;
mod registry;

pub use grammers::GrammersBackend;
pub use registry::{ConnectionRegistry, RegistryTicket};

use crate::media::{MessageId, MessageRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Telegram user identifier
pub type UserId = i64;

/// Errors surfaced by the Telegram client
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Bad phone, code or password, or an expired code
    #[error("Authorization failed: {0}")]
    Auth(String),
    /// The account has a two-factor password; not a failure
    #[error("Two-factor password required")]
    TwoFactorRequired,
    /// Connection or network failure
    #[error("Telegram is unavailable: {0}")]
    Unavailable(String),
    /// The stored session is not (or no longer) logged in
    #[error("Session is not authorized")]
    NotAuthorized,
    /// Stored session data could not be decoded
    #[error("Invalid session data: {0}")]
    InvalidSession(String),
    /// The process is shutting down and refuses new connections
    #[error("Service is shutting down")]
    ShuttingDown,
}

/// Handle correlating a requested login code with its login attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeHandle {
    /// Phone number the code was sent to
    pub phone: String,
    /// Opaque token reference issued by the backend
    pub token_id: String,
}

/// Factory for connections to Telegram
#[async_trait]
pub trait TelegramBackend: Send + Sync {
    /// Open a connection resuming `session`, or a fresh anonymous one
    async fn connect(
        &self,
        session: Option<&str>,
    ) -> Result<Box<dyn TelegramConnection>, TelegramError>;
}

/// An open connection to Telegram
///
/// Dropping the value closes the underlying transport.
#[async_trait]
pub trait TelegramConnection: Send + Sync {
    /// Whether the session behind this connection is logged in
    async fn is_authorized(&self) -> Result<bool, TelegramError>;

    /// Id of the logged-in user
    async fn current_user(&self) -> Result<UserId, TelegramError>;

    /// Ask Telegram to send a login code to `phone`
    async fn request_code(&self, phone: &str) -> Result<CodeHandle, TelegramError>;

    /// Complete login with the received code
    ///
    /// Fails with `TwoFactorRequired` when the account has a password.
    async fn sign_in_with_code(
        &self,
        handle: &CodeHandle,
        code: &str,
    ) -> Result<UserId, TelegramError>;

    /// Complete login with the two-factor password
    ///
    /// `handle` is the one whose code was accepted with `TwoFactorRequired`.
    async fn sign_in_with_password(
        &self,
        handle: &CodeHandle,
        password: &str,
    ) -> Result<UserId, TelegramError>;

    /// Most recent messages of the self-conversation, newest first
    async fn recent_self_messages(
        &self,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, TelegramError>;

    /// One message of the self-conversation, `None` if it does not exist
    async fn self_message(&self, id: MessageId) -> Result<Option<MessageRecord>, TelegramError>;

    /// Full media payload of one self-conversation message
    ///
    /// `None` if the message is gone or has nothing downloadable.
    async fn download_self_media(&self, id: MessageId) -> Result<Option<Vec<u8>>, TelegramError>;

    /// Serialize the current session so a later connection can resume it
    fn export_session(&self) -> Result<String, TelegramError>;
}

/// Scoped connection: the transport is released when the guard drops
pub struct ConnectionGuard {
    // Field order matters: the connection is dropped before the ticket.
    connection: Box<dyn TelegramConnection>,
    ticket: RegistryTicket,
}

impl ConnectionGuard {
    /// Registry id of this connection
    #[must_use]
    pub fn id(&self) -> u64 {
        self.ticket.id()
    }

    /// Close the connection now
    pub fn close(self) {
        debug!(connection = self.id(), "Closing Telegram connection");
        drop(self);
    }
}

impl Deref for ConnectionGuard {
    type Target = dyn TelegramConnection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_ref()
    }
}

/// Telegram client service shared by all requests
#[derive(Clone)]
pub struct TelegramClient {
    backend: Arc<dyn TelegramBackend>,
    registry: Arc<ConnectionRegistry>,
}

impl TelegramClient {
    /// Create a client over `backend`, tracking connections in `registry`
    #[must_use]
    pub fn new(backend: Arc<dyn TelegramBackend>, registry: Arc<ConnectionRegistry>) -> Self {
        Self { backend, registry }
    }

    /// Registry of currently open connections
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Open a short-lived connection for one operation
    ///
    /// # Errors
    ///
    /// Returns `ShuttingDown` once shutdown started, or whatever the backend
    /// reports while connecting.
    pub async fn open(
        &self,
        session: Option<&str>,
        purpose: &'static str,
    ) -> Result<ConnectionGuard, TelegramError> {
        let ticket = self.registry.register(purpose)?;
        let connection = self.backend.connect(session).await?;
        debug!(connection = ticket.id(), purpose, "Opened Telegram connection");
        Ok(ConnectionGuard { connection, ticket })
    }
}
