//! MTProto backend built on `grammers`

use super::pending::{PendingLogin, PendingLogins};
use super::{CodeHandle, TelegramBackend, TelegramConnection, TelegramError, UserId};
use crate::media::{Attachment, MediaKind, MessageId, MessageRecord};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use grammers_client::types::media::Document;
use grammers_client::types::{Downloadable, LoginToken, Media, Message, PasswordToken, User};
use grammers_client::{Client, Config, InitParams, InvocationError, SignInError};
use grammers_mtsender::AuthorizationError;
use grammers_session::Session;
use grammers_tl_types as tl;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// How long an issued login code stays usable on our side
const LOGIN_TOKEN_TTL: Duration = Duration::from_secs(10 * 60);
const LOGIN_TOKEN_CAPACITY: u64 = 10_000;

type Logins = PendingLogins<Client, LoginToken>;

/// Backend connecting to the real Telegram servers
#[derive(Clone)]
pub struct GrammersBackend {
    api_id: i32,
    api_hash: String,
    logins: Logins,
}

impl GrammersBackend {
    /// Create a backend with the application's API credentials
    #[must_use]
    pub fn new(api_id: i32, api_hash: String) -> Self {
        Self {
            api_id,
            api_hash,
            logins: PendingLogins::new(LOGIN_TOKEN_TTL, LOGIN_TOKEN_CAPACITY),
        }
    }
}

#[async_trait]
impl TelegramBackend for GrammersBackend {
    async fn connect(
        &self,
        session: Option<&str>,
    ) -> Result<Box<dyn TelegramConnection>, TelegramError> {
        let session = match session.filter(|s| !s.is_empty()) {
            Some(encoded) => {
                let bytes = STANDARD
                    .decode(encoded)
                    .map_err(|e| TelegramError::InvalidSession(e.to_string()))?;
                Session::load(&bytes).map_err(|e| TelegramError::InvalidSession(e.to_string()))?
            }
            None => Session::new(),
        };

        let client = Client::connect(Config {
            session,
            api_id: self.api_id,
            api_hash: self.api_hash.clone(),
            params: InitParams::default(),
        })
        .await
        .map_err(|e| TelegramError::Unavailable(e.to_string()))?;

        Ok(Box::new(GrammersConnection {
            client,
            logins: self.logins.clone(),
            login_client: Mutex::new(None),
            me: OnceCell::new(),
            media: Mutex::new(HashMap::new()),
        }))
    }
}

/// One client connection; dropping the client closes its socket
struct GrammersConnection {
    client: Client,
    logins: Logins,
    /// Client of a pending login that advanced during this connection; its
    /// session is the one to persist
    login_client: Mutex<Option<Client>>,
    me: OnceCell<User>,
    /// Media seen during this connection, so a lookup followed by a download
    /// does not fetch the message twice
    media: Mutex<HashMap<MessageId, Media>>,
}

impl GrammersConnection {
    async fn me(&self) -> Result<&User, TelegramError> {
        self.me
            .get_or_try_init(|| async { self.client.get_me().await.map_err(remote_error) })
            .await
    }

    async fn pending_login(
        &self,
        handle: &CodeHandle,
    ) -> Result<Arc<PendingLogin<Client, LoginToken>>, TelegramError> {
        self.logins.get(&handle.token_id).await.ok_or_else(|| {
            TelegramError::Auth("the login code expired, request a new one".to_string())
        })
    }

    fn adopt(&self, client: &Client) {
        *self
            .login_client
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(client.clone());
    }

    fn remember_media(&self, message: &Message) {
        if let Some(media) = message.media() {
            self.media
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(message.id(), media);
        }
    }

    fn remembered_media(&self, id: MessageId) -> Option<Media> {
        self.media
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    async fn fetch_message(&self, id: MessageId) -> Result<Option<Message>, TelegramError> {
        let me = self.me().await?;
        let mut found = self
            .client
            .get_messages_by_id(me.pack(), &[id])
            .await
            .map_err(remote_error)?;
        let message = found.pop().flatten();
        if let Some(message) = &message {
            self.remember_media(message);
        }
        Ok(message)
    }
}

#[async_trait]
impl TelegramConnection for GrammersConnection {
    async fn is_authorized(&self) -> Result<bool, TelegramError> {
        self.client.is_authorized().await.map_err(remote_error)
    }

    async fn current_user(&self) -> Result<UserId, TelegramError> {
        Ok(self.me().await?.id())
    }

    async fn request_code(&self, phone: &str) -> Result<CodeHandle, TelegramError> {
        let token = self
            .client
            .request_login_code(phone)
            .await
            .map_err(login_request_error)?;

        // The client now sits on the DC that issued the code.
        let token_id = self.logins.insert(self.client.clone(), token).await;
        info!("Login code requested");
        Ok(CodeHandle {
            phone: phone.to_string(),
            token_id,
        })
    }

    async fn sign_in_with_code(
        &self,
        handle: &CodeHandle,
        code: &str,
    ) -> Result<UserId, TelegramError> {
        let login = self.pending_login(handle).await?;

        match login.client.sign_in(&login.token, code).await {
            Ok(user) => {
                self.adopt(&login.client);
                self.logins.finish(&handle.token_id).await;
                Ok(user.id())
            }
            Err(err) => {
                let err = sign_in_error(err);
                if matches!(err, TelegramError::TwoFactorRequired) {
                    self.adopt(&login.client);
                }
                Err(err)
            }
        }
    }

    async fn sign_in_with_password(
        &self,
        handle: &CodeHandle,
        password: &str,
    ) -> Result<UserId, TelegramError> {
        let login = self.pending_login(handle).await?;

        // Fresh SRP parameters for every attempt: a failed check consumes them.
        let tl::enums::account::Password::Password(params) = login
            .client
            .invoke(&tl::functions::account::GetPassword {})
            .await
            .map_err(remote_error)?;

        let user = login
            .client
            .check_password(PasswordToken::new(params), password.as_bytes())
            .await
            .map_err(sign_in_error)?;
        self.adopt(&login.client);
        self.logins.finish(&handle.token_id).await;
        Ok(user.id())
    }

    async fn recent_self_messages(
        &self,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, TelegramError> {
        let me = self.me().await?;
        let mut messages = self.client.iter_messages(me.pack()).limit(limit);
        let mut records = Vec::new();
        while let Some(message) = messages.next().await.map_err(remote_error)? {
            records.push(project_message(&message));
        }
        debug!(count = records.len(), "Listed self-conversation messages");
        Ok(records)
    }

    async fn self_message(&self, id: MessageId) -> Result<Option<MessageRecord>, TelegramError> {
        Ok(self.fetch_message(id).await?.as_ref().map(project_message))
    }

    async fn download_self_media(&self, id: MessageId) -> Result<Option<Vec<u8>>, TelegramError> {
        let media = match self.remembered_media(id) {
            Some(media) => Some(media),
            None => self
                .fetch_message(id)
                .await?
                .and_then(|message| message.media()),
        };
        let Some(media) = media.filter(is_downloadable) else {
            return Ok(None);
        };

        let mut download = self.client.iter_download(&Downloadable::Media(media));
        let mut bytes = Vec::new();
        while let Some(chunk) = download.next().await.map_err(remote_error)? {
            bytes.extend_from_slice(&chunk);
        }
        Ok(Some(bytes))
    }

    fn export_session(&self) -> Result<String, TelegramError> {
        let login_client = self
            .login_client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let client = login_client.as_ref().unwrap_or(&self.client);
        Ok(STANDARD.encode(client.session().save()))
    }
}

/// RPC failure of a regular call
fn rpc_error(code: i32, message: String) -> TelegramError {
    if code == 401 {
        TelegramError::NotAuthorized
    } else {
        TelegramError::Unavailable(message)
    }
}

/// RPC failure of a login step: rejected input is an authorization failure,
/// server-side trouble is not
fn login_rpc_error(code: i32, message: String) -> TelegramError {
    if code >= 500 || code < 0 {
        TelegramError::Unavailable(message)
    } else {
        TelegramError::Auth(message)
    }
}

fn remote_error(err: InvocationError) -> TelegramError {
    match err {
        InvocationError::Rpc(rpc) => rpc_error(rpc.code, rpc.to_string()),
        other => TelegramError::Unavailable(other.to_string()),
    }
}

fn login_request_error(err: AuthorizationError) -> TelegramError {
    match err {
        AuthorizationError::Invoke(InvocationError::Rpc(rpc)) => {
            login_rpc_error(rpc.code, rpc.name)
        }
        AuthorizationError::Invoke(other) => remote_error(other),
        other => TelegramError::Unavailable(other.to_string()),
    }
}

fn sign_in_error(err: SignInError) -> TelegramError {
    match err {
        SignInError::PasswordRequired(_) => TelegramError::TwoFactorRequired,
        SignInError::InvalidCode => TelegramError::Auth("invalid code".to_string()),
        SignInError::InvalidPassword => TelegramError::Auth("invalid password".to_string()),
        SignInError::Other(InvocationError::Rpc(rpc)) => login_rpc_error(rpc.code, rpc.name),
        SignInError::Other(other) => remote_error(other),
        other => TelegramError::Auth(other.to_string()),
    }
}

fn is_downloadable(media: &Media) -> bool {
    matches!(
        media,
        Media::Photo(_) | Media::Document(_) | Media::Sticker(_)
    )
}

fn project_message(message: &Message) -> MessageRecord {
    let id = message.id();
    let date = message.date();
    let Some(media) = message.media() else {
        return MessageRecord::text(id, date);
    };

    let (kind, attachment) = match &media {
        Media::Photo(_) => (MediaKind::Photo, Attachment::unnamed(None)),
        Media::Document(document) => project_document(document),
        Media::Sticker(sticker) => {
            let (_, attachment) = project_document(&sticker.document);
            (MediaKind::Document, attachment)
        }
        _ => (MediaKind::Unknown, Attachment::default()),
    };
    MessageRecord::with_attachment(id, date, kind, attachment)
}

fn project_document(document: &Document) -> (MediaKind, Attachment) {
    let hints: Vec<AttributeHint> = match &document.raw.document {
        Some(tl::enums::Document::Document(raw)) => raw.attributes.iter().map(hint).collect(),
        _ => Vec::new(),
    };
    let (kind, name) = classify_attributes(&hints);
    let size = u64::try_from(document.size()).ok();
    let attachment = match name {
        Some(name) => Attachment::named(name, size),
        None => Attachment::unnamed(size),
    };
    (kind, attachment)
}

/// What one document attribute says about the file
#[derive(Debug, Clone, PartialEq, Eq)]
enum AttributeHint {
    Video,
    Audio { voice: bool },
    FileName(String),
    Other,
}

fn hint(attribute: &tl::enums::DocumentAttribute) -> AttributeHint {
    match attribute {
        tl::enums::DocumentAttribute::Video(_) => AttributeHint::Video,
        tl::enums::DocumentAttribute::Audio(audio) => AttributeHint::Audio { voice: audio.voice },
        tl::enums::DocumentAttribute::Filename(file) => {
            AttributeHint::FileName(file.file_name.clone())
        }
        _ => AttributeHint::Other,
    }
}

/// Kind and declared name of a document
///
/// Video beats voice, voice beats audio, whatever the attribute order.
fn classify_attributes(hints: &[AttributeHint]) -> (MediaKind, Option<String>) {
    let kind = if hints.contains(&AttributeHint::Video) {
        MediaKind::Video
    } else if hints.contains(&AttributeHint::Audio { voice: true }) {
        MediaKind::Voice
    } else if hints.contains(&AttributeHint::Audio { voice: false }) {
        MediaKind::Audio
    } else {
        MediaKind::Document
    };
    let name = hints.iter().find_map(|hint| match hint {
        AttributeHint::FileName(name) if !name.trim().is_empty() => Some(name.clone()),
        _ => None,
    });
    (kind, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> AttributeHint {
        AttributeHint::FileName(name.to_string())
    }

    #[test]
    fn test_video_wins_whatever_the_order() {
        let expected = (MediaKind::Video, Some("clip.mp4".to_string()));
        let audio = AttributeHint::Audio { voice: false };
        assert_eq!(
            classify_attributes(&[AttributeHint::Video, audio.clone(), file("clip.mp4")]),
            expected
        );
        assert_eq!(
            classify_attributes(&[audio, file("clip.mp4"), AttributeHint::Video]),
            expected
        );
    }

    #[test]
    fn test_voice_and_audio() {
        assert_eq!(
            classify_attributes(&[AttributeHint::Audio { voice: true }]),
            (MediaKind::Voice, None)
        );
        assert_eq!(
            classify_attributes(&[
                AttributeHint::Audio { voice: false },
                file("song.mp3"),
                AttributeHint::Audio { voice: true },
            ]),
            (MediaKind::Voice, Some("song.mp3".to_string()))
        );
        assert_eq!(
            classify_attributes(&[file("song.flac"), AttributeHint::Audio { voice: false }]),
            (MediaKind::Audio, Some("song.flac".to_string()))
        );
    }

    #[test]
    fn test_plain_documents_and_names() {
        assert_eq!(
            classify_attributes(&[file("report.pdf"), AttributeHint::Other]),
            (MediaKind::Document, Some("report.pdf".to_string()))
        );
        assert_eq!(classify_attributes(&[]), (MediaKind::Document, None));
        assert_eq!(
            classify_attributes(&[file("   ")]),
            (MediaKind::Document, None)
        );
    }

    #[test]
    fn test_filename_attribute_is_read() {
        let attribute = tl::enums::DocumentAttribute::Filename(tl::types::DocumentAttributeFilename {
            file_name: "notes.txt".to_string(),
        });
        assert_eq!(hint(&attribute), file("notes.txt"));
    }

    #[test]
    fn test_rpc_errors_of_regular_calls() {
        assert!(matches!(
            rpc_error(401, "AUTH_KEY_UNREGISTERED".to_string()),
            TelegramError::NotAuthorized
        ));
        assert!(matches!(
            rpc_error(400, "MSG_ID_INVALID".to_string()),
            TelegramError::Unavailable(_)
        ));
    }

    #[test]
    fn test_rpc_errors_of_login_steps() {
        for name in ["PHONE_CODE_INVALID", "PHONE_CODE_EXPIRED", "PHONE_NUMBER_INVALID"] {
            assert!(
                matches!(login_rpc_error(400, name.to_string()), TelegramError::Auth(m) if m == name),
                "{name} should be an authorization failure"
            );
        }
        assert!(matches!(
            login_rpc_error(500, "AUTH_RESTART".to_string()),
            TelegramError::Unavailable(_)
        ));
    }

    #[test]
    fn test_network_failures_are_not_auth_failures() {
        assert!(matches!(
            remote_error(InvocationError::Dropped),
            TelegramError::Unavailable(_)
        ));
        assert!(matches!(
            login_request_error(AuthorizationError::Invoke(InvocationError::Dropped)),
            TelegramError::Unavailable(_)
        ));
        assert!(matches!(
            sign_in_error(SignInError::Other(InvocationError::Dropped)),
            TelegramError::Unavailable(_)
        ));
    }

    #[test]
    fn test_sign_in_outcomes() {
        assert!(matches!(
            sign_in_error(SignInError::InvalidCode),
            TelegramError::Auth(_)
        ));
        assert!(matches!(
            sign_in_error(SignInError::InvalidPassword),
            TelegramError::Auth(_)
        ));
    }
}
