use super::{BrowserSessionId, SessionStore, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const SESSION_FILE_EXTENSION: &str = "session";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionFile {
    session: String,
    updated_at: i64,
}

/// File-backed session store
///
/// Keeps one `<id>.session` file per browser session under a shared
/// directory. Stale files are not collected.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Create a store rooted at `dir` (created lazily)
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Default location under the system temporary directory
    #[must_use]
    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join("tg-favorites-sessions")
    }

    /// Directory holding the session files
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &BrowserSessionId) -> Result<PathBuf, StoreError> {
        // Ids reaching the store normally come validated, re-check before
        // building a path from them.
        let id = BrowserSessionId::parse(id.as_str())?;
        Ok(self
            .dir
            .join(format!("{}.{SESSION_FILE_EXTENSION}", id.as_str())))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, id: &BrowserSessionId) -> Result<Option<String>, StoreError> {
        let path = self.path_for(id)?;
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::Io(err)),
        };
        let file: SessionFile = serde_json::from_str(&contents)?;
        Ok(Some(file.session).filter(|session| !session.is_empty()))
    }

    async fn set(&self, id: &BrowserSessionId, session: String) -> Result<(), StoreError> {
        let path = self.path_for(id)?;
        ensure_dir(&self.dir).await?;

        let payload = serde_json::to_string(&SessionFile {
            session,
            updated_at: chrono::Utc::now().timestamp(),
        })?;
        fs::write(&path, payload).await?;
        set_permissions(&path, 0o600).await?;
        debug!(browser_session = %id, path = %path.display(), "Stored Telegram session file");
        Ok(())
    }

    async fn clear(&self, id: &BrowserSessionId) -> Result<(), StoreError> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::Io(err)),
        }
    }
}

async fn ensure_dir(path: &Path) -> Result<(), io::Error> {
    fs::create_dir_all(path).await?;
    set_permissions(path, 0o700).await
}

#[cfg(unix)]
async fn set_permissions(path: &Path, mode: u32) -> Result<(), io::Error> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
async fn set_permissions(_path: &Path, _mode: u32) -> Result<(), io::Error> {
    Ok(())
}
