//! Saved Messages favorites: listing, single downloads and zip archives
//!
//! All operations take an open [`TelegramConnection`]; opening and closing
//! it is the caller's job (see [`crate::telegram::ConnectionGuard`]).

pub mod archive;
pub mod retriever;

pub use archive::{build_zip, Archive, ArchiveError, SkipReason, SkippedItem, ARCHIVE_FILE_NAME};
pub use retriever::{fetch, MediaBlob};

use crate::media::{classify, derive_filename, MediaKind, MessageId, MessageRecord};
use crate::telegram::{TelegramConnection, TelegramError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

/// Default number of recent messages inspected per listing
pub const DEFAULT_LIST_LIMIT: usize = 200;

/// Lightweight projection of one media message in Saved Messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FavoriteItem {
    /// Message id
    pub id: MessageId,
    /// Send date
    pub date: DateTime<Utc>,
    /// Media category
    pub kind: MediaKind,
    /// Display filename (not guaranteed unique)
    pub filename: String,
    /// Payload size when known
    pub size: Option<u64>,
}

impl FavoriteItem {
    /// Project a message record
    #[must_use]
    pub fn from_record(record: &MessageRecord) -> Self {
        Self {
            id: record.id,
            date: record.date,
            kind: classify(record),
            filename: derive_filename(record),
            size: record.primary_attachment().and_then(|a| a.size),
        }
    }
}

/// List the media favorites among the `limit` most recent saved messages
///
/// Order follows Telegram (newest first).
///
/// # Errors
///
/// `NotAuthorized` if the connection is not logged in, otherwise whatever the
/// connection reports.
pub async fn list(
    connection: &dyn TelegramConnection,
    limit: usize,
) -> Result<Vec<FavoriteItem>, TelegramError> {
    if !connection.is_authorized().await? {
        return Err(TelegramError::NotAuthorized);
    }

    let messages = connection.recent_self_messages(limit).await?;
    let scanned = messages.len();
    let items: Vec<FavoriteItem> = messages
        .iter()
        .filter(|message| message.has_media)
        .map(FavoriteItem::from_record)
        .collect();

    info!(scanned, favorites = items.len(), "Loaded favorites");
    Ok(items)
}
