//! Screen workflow of one browser session
//!
//! `Landing → Login → VerifyCode → TwoFactor (optional) → Dashboard`, with
//! `Logout` back to `Landing`. A failed action leaves the page untouched and
//! stores a notice for the next render.

mod page;

pub use page::{Action, Page};

use crate::favorites::{self, Archive, ArchiveError, FavoriteItem, MediaBlob};
use crate::media::MessageId;
use crate::session::{BrowserSessionId, SessionStore, StoreError};
use crate::telegram::{CodeHandle, ConnectionGuard, TelegramClient, TelegramError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Errors shown to the user as a notice
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Telegram failure
    #[error(transparent)]
    Telegram(#[from] TelegramError),
    /// Session storage failure
    #[error("Session storage failed: {0}")]
    Store(#[from] StoreError),
    /// Archive construction failure
    #[error("Could not build the archive: {0}")]
    Archive(#[from] ArchiveError),
    /// Action not valid on the current screen
    #[error("{action} is not available on the {page} screen")]
    InvalidAction {
        /// Rejected action
        action: &'static str,
        /// Current screen
        page: &'static str,
    },
    /// Required form field left empty
    #[error("Please enter your {0}")]
    MissingField(&'static str),
    /// Requested favorite no longer exists or has no media
    #[error("Favorite {0} is no longer available")]
    MediaAbsent(MessageId),
}

/// Shared services the workflow calls into
#[derive(Clone)]
pub struct Services {
    /// Telegram client
    pub telegram: TelegramClient,
    /// Session string storage
    pub sessions: Arc<dyn SessionStore>,
    /// Messages inspected per dashboard load
    pub favorites_limit: usize,
}

/// Workflow state of one browser session
#[derive(Debug)]
pub struct Workflow {
    browser: BrowserSessionId,
    page: Page,
    notice: Option<String>,
}

impl Workflow {
    /// Fresh workflow on the landing screen
    #[must_use]
    pub const fn new(browser: BrowserSessionId) -> Self {
        Self {
            browser,
            page: Page::Landing,
            notice: None,
        }
    }

    /// Browser session this workflow belongs to
    #[must_use]
    pub const fn browser(&self) -> &BrowserSessionId {
        &self.browser
    }

    /// Current screen
    #[must_use]
    pub const fn page(&self) -> &Page {
        &self.page
    }

    /// Pending notice without consuming it
    #[must_use]
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Consume the pending notice
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    /// Apply one user action
    ///
    /// On failure the page does not change and the error becomes the notice.
    ///
    /// # Errors
    ///
    /// Returns the error that was stored as notice.
    pub async fn apply(&mut self, action: Action, services: &Services) -> Result<(), WorkflowError> {
        let action_name = action.name();
        let from = self.page.name();
        match self.transition(action, services).await {
            Ok(next) => {
                info!(
                    browser_session = %self.browser,
                    action = action_name,
                    from,
                    to = next.name(),
                    "Workflow transition"
                );
                self.page = next;
                self.notice = None;
                Ok(())
            }
            Err(err) => Err(self.fail(action_name, err)),
        }
    }

    fn fail(&mut self, action: &'static str, err: WorkflowError) -> WorkflowError {
        warn!(
            browser_session = %self.browser,
            action,
            page = self.page.name(),
            error = %err,
            "Workflow action failed"
        );
        self.notice = Some(err.to_string());
        err
    }

    async fn transition(&self, action: Action, services: &Services) -> Result<Page, WorkflowError> {
        match (&self.page, action) {
            (_, Action::Logout) => self.logout(services).await,
            (Page::Landing, Action::Start) => Ok(Page::Login),
            (Page::Login, Action::SubmitPhone(phone)) => self.submit_phone(services, &phone).await,
            (Page::VerifyCode { pending }, Action::SubmitCode(code)) => {
                self.submit_code(services, pending, &code).await
            }
            (Page::TwoFactor { pending }, Action::SubmitPassword(password)) => {
                self.submit_password(services, pending, &password).await
            }
            (Page::Login, Action::Back) => Ok(Page::Landing),
            (Page::VerifyCode { .. }, Action::Back) => Ok(Page::Login),
            (Page::TwoFactor { pending }, Action::Back) => Ok(Page::VerifyCode {
                pending: pending.clone(),
            }),
            (page, action) => Err(WorkflowError::InvalidAction {
                action: action.name(),
                page: page.name(),
            }),
        }
    }

    async fn logout(&self, services: &Services) -> Result<Page, WorkflowError> {
        services.sessions.clear(&self.browser).await?;
        Ok(Page::Landing)
    }

    async fn submit_phone(&self, services: &Services, raw: &str) -> Result<Page, WorkflowError> {
        let phone = normalize_phone(raw).ok_or(WorkflowError::MissingField("phone number"))?;
        let connection = self.open(services, "request_code").await?;

        if connection.is_authorized().await? {
            let user_id = connection.current_user().await?;
            self.persist(services, &connection).await?;
            info!(browser_session = %self.browser, "Session already authorized");
            return Ok(Page::Dashboard { user_id });
        }

        let pending = connection.request_code(&phone).await?;
        self.persist(services, &connection).await?;
        Ok(Page::VerifyCode { pending })
    }

    async fn submit_code(
        &self,
        services: &Services,
        pending: &CodeHandle,
        code: &str,
    ) -> Result<Page, WorkflowError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(WorkflowError::MissingField("login code"));
        }
        let connection = self.open(services, "sign_in").await?;

        match connection.sign_in_with_code(pending, code).await {
            Ok(user_id) => {
                self.persist(services, &connection).await?;
                Ok(Page::Dashboard { user_id })
            }
            Err(TelegramError::TwoFactorRequired) => {
                self.persist(services, &connection).await?;
                Ok(Page::TwoFactor {
                    pending: pending.clone(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn submit_password(
        &self,
        services: &Services,
        pending: &CodeHandle,
        password: &str,
    ) -> Result<Page, WorkflowError> {
        if password.is_empty() {
            return Err(WorkflowError::MissingField("password"));
        }
        let connection = self.open(services, "check_password").await?;
        let user_id = connection.sign_in_with_password(pending, password).await?;
        self.persist(services, &connection).await?;
        Ok(Page::Dashboard { user_id })
    }

    /// List favorites for the dashboard
    ///
    /// # Errors
    ///
    /// Fails outside the dashboard or on Telegram errors. A session that is
    /// no longer authorized resets the workflow to the landing screen.
    pub async fn load_dashboard(&mut self, services: &Services) -> Result<Vec<FavoriteItem>, WorkflowError> {
        let result = self.dashboard_list(services).await;
        self.settle("Load favorites", services, result).await
    }

    /// Download one favorite
    ///
    /// # Errors
    ///
    /// `MediaAbsent` if the message vanished or has no media.
    pub async fn download_item(
        &mut self,
        services: &Services,
        id: MessageId,
    ) -> Result<MediaBlob, WorkflowError> {
        let result = self.dashboard_download(services, id).await;
        self.settle("Download", services, result).await
    }

    /// Build the zip of all favorites
    ///
    /// # Errors
    ///
    /// Fails outside the dashboard, on listing errors or on zip errors.
    /// Individual items that fail are skipped, not reported here.
    pub async fn download_archive(&mut self, services: &Services) -> Result<Archive, WorkflowError> {
        let result = self.dashboard_archive(services).await;
        self.settle("Download all", services, result).await
    }

    async fn dashboard_list(&self, services: &Services) -> Result<Vec<FavoriteItem>, WorkflowError> {
        self.require_dashboard("Load favorites")?;
        let connection = self.open(services, "list").await?;
        Ok(favorites::list(&*connection, services.favorites_limit).await?)
    }

    async fn dashboard_download(&self, services: &Services, id: MessageId) -> Result<MediaBlob, WorkflowError> {
        self.require_dashboard("Download")?;
        let connection = self.open(services, "download").await?;
        if !connection.is_authorized().await? {
            return Err(TelegramError::NotAuthorized.into());
        }
        favorites::fetch(&*connection, id)
            .await?
            .ok_or(WorkflowError::MediaAbsent(id))
    }

    async fn dashboard_archive(&self, services: &Services) -> Result<Archive, WorkflowError> {
        self.require_dashboard("Download all")?;
        let connection = self.open(services, "archive").await?;
        let items = favorites::list(&*connection, services.favorites_limit).await?;
        let archive = favorites::build_zip(&*connection, &items).await?;
        if !archive.skipped.is_empty() {
            warn!(
                browser_session = %self.browser,
                skipped = archive.skipped.len(),
                "Archive built without some favorites"
            );
        }
        Ok(archive)
    }

    async fn settle<T>(
        &mut self,
        action: &'static str,
        services: &Services,
        result: Result<T, WorkflowError>,
    ) -> Result<T, WorkflowError> {
        match result {
            Ok(value) => Ok(value),
            Err(err) if is_not_authorized(&err) => {
                // Session was revoked remotely: start over from the landing screen.
                if let Err(store_err) = services.sessions.clear(&self.browser).await {
                    warn!(error = %store_err, "Failed to clear revoked session");
                }
                self.page = Page::Landing;
                Err(self.fail(action, err))
            }
            Err(err) => Err(self.fail(action, err)),
        }
    }

    fn require_dashboard(&self, action: &'static str) -> Result<(), WorkflowError> {
        match self.page {
            Page::Dashboard { .. } => Ok(()),
            ref page => Err(WorkflowError::InvalidAction {
                action,
                page: page.name(),
            }),
        }
    }

    /// Open a connection with the stored session
    ///
    /// A stored session that cannot be decoded is dropped and replaced by a
    /// fresh one, so the user can log in again.
    async fn open(&self, services: &Services, purpose: &'static str) -> Result<ConnectionGuard, WorkflowError> {
        let stored = services.sessions.get(&self.browser).await?;
        match services.telegram.open(stored.as_deref(), purpose).await {
            Err(TelegramError::InvalidSession(reason)) => {
                warn!(browser_session = %self.browser, reason, "Discarding unreadable session");
                services.sessions.clear(&self.browser).await?;
                Ok(services.telegram.open(None, purpose).await?)
            }
            other => Ok(other?),
        }
    }

    /// Store the session right after a step that changed it
    async fn persist(&self, services: &Services, connection: &ConnectionGuard) -> Result<(), WorkflowError> {
        let session = connection.export_session()?;
        services.sessions.set(&self.browser, session).await?;
        Ok(())
    }
}

fn is_not_authorized(err: &WorkflowError) -> bool {
    matches!(
        err,
        WorkflowError::Telegram(TelegramError::NotAuthorized)
            | WorkflowError::Archive(ArchiveError::Telegram(TelegramError::NotAuthorized))
    )
}

/// Strip formatting from a phone number, keeping a leading `+` and digits
///
/// Returns `None` when no digits remain. Validity is left to Telegram.
#[must_use]
pub fn normalize_phone(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    if raw.starts_with('+') {
        Some(format!("+{digits}"))
    } else {
        Some(digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+1 (000) 000-0000").as_deref(), Some("+10000000000"));
        assert_eq!(normalize_phone(" 79123456789 ").as_deref(), Some("79123456789"));
        assert_eq!(normalize_phone("   "), None);
        assert_eq!(normalize_phone("+"), None);
    }

    #[test]
    fn test_page_names_and_pending_phone() {
        let pending = CodeHandle {
            phone: "+10000000000".to_string(),
            token_id: "t".to_string(),
        };
        let page = Page::VerifyCode { pending };
        assert_eq!(page.name(), "code verification");
        assert_eq!(page.pending_phone(), Some("+10000000000"));
        assert_eq!(Page::default(), Page::Landing);
        assert_eq!(Page::Login.pending_phone(), None);
    }
}
