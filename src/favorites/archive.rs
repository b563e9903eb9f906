//! In-memory zip archive of all favorites

use super::{fetch, FavoriteItem};
use crate::media::MessageId;
use crate::telegram::{TelegramConnection, TelegramError};
use bytes::Bytes;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use thiserror::Error;
use tracing::{info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// File name offered for the archive download
pub const ARCHIVE_FILE_NAME: &str = "telegram_favorites.zip";

/// Errors that abort archive construction
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Telegram failure before any item was processed
    #[error(transparent)]
    Telegram(#[from] TelegramError),
    /// Zip encoding failure
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    /// Write failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why an item is missing from the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Message deleted or without media
    Absent,
    /// Download failed
    Failed(String),
}

/// One item left out of the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    /// Message id
    pub id: MessageId,
    /// Reason
    pub reason: SkipReason,
}

/// Finished archive
#[derive(Debug, Clone)]
pub struct Archive {
    /// Zip bytes
    pub bytes: Bytes,
    /// Entry names in write order
    pub entries: Vec<String>,
    /// Items that could not be included
    pub skipped: Vec<SkippedItem>,
}

/// Download every item and pack it into one zip
///
/// Items whose message vanished or whose download failed are skipped; the
/// batch goes on. Colliding names get a numeric suffix (`report_2.pdf`).
///
/// # Errors
///
/// `NotAuthorized` if the connection is not logged in or loses its
/// authorization during the batch, or a zip encoding failure.
pub async fn build_zip(
    connection: &dyn TelegramConnection,
    items: &[FavoriteItem],
) -> Result<Archive, ArchiveError> {
    if !connection.is_authorized().await? {
        return Err(TelegramError::NotAuthorized.into());
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut used = HashSet::new();
    let mut entries = Vec::with_capacity(items.len());
    let mut skipped = Vec::new();

    for item in items {
        let blob = match fetch(connection, item.id).await {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                skipped.push(SkippedItem {
                    id: item.id,
                    reason: SkipReason::Absent,
                });
                continue;
            }
            // A revoked session fails every remaining item; abort the batch.
            Err(TelegramError::NotAuthorized) => return Err(TelegramError::NotAuthorized.into()),
            Err(err) => {
                warn!(message_id = item.id, error = %err, "Skipping favorite in archive");
                skipped.push(SkippedItem {
                    id: item.id,
                    reason: SkipReason::Failed(err.to_string()),
                });
                continue;
            }
        };

        let name = unique_name(&entry_name(&item.filename, item.id), &mut used);
        zip.start_file(name.clone(), options)?;
        zip.write_all(&blob.bytes)?;
        entries.push(name);
    }

    let bytes = zip.finish()?.into_inner();
    info!(
        entries = entries.len(),
        skipped = skipped.len(),
        size = bytes.len(),
        "Built favorites archive"
    );
    Ok(Archive {
        bytes: Bytes::from(bytes),
        entries,
        skipped,
    })
}

/// Make a remote-supplied file name safe as a flat zip entry name
fn entry_name(filename: &str, id: MessageId) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').trim();
    if cleaned.is_empty() {
        format!("file_{id}")
    } else {
        cleaned.to_string()
    }
}

fn unique_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }

    let (stem, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name, ""),
    };
    let mut n = 2_u32;
    loop {
        let candidate = format!("{stem}_{n}{extension}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
