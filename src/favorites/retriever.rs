//! Single-item media download

use super::FavoriteItem;
use crate::media::MessageId;
use crate::telegram::{TelegramConnection, TelegramError};
use bytes::Bytes;
use tracing::{debug, info};

/// Downloaded payload of one favorite, alive for one response only
#[derive(Debug, Clone)]
pub struct MediaBlob {
    /// Item the payload belongs to
    pub item: FavoriteItem,
    /// Raw bytes
    pub bytes: Bytes,
}

impl MediaBlob {
    /// Content type for serving the payload
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        self.item.kind.content_type()
    }
}

/// Download the media of message `id` into memory
///
/// Returns `Ok(None)` when the message no longer exists or carries nothing
/// downloadable. Interrupted downloads are not resumed.
///
/// # Errors
///
/// Propagates connection failures.
pub async fn fetch(
    connection: &dyn TelegramConnection,
    id: MessageId,
) -> Result<Option<MediaBlob>, TelegramError> {
    let Some(record) = connection.self_message(id).await? else {
        debug!(message_id = id, "Message vanished before download");
        return Ok(None);
    };
    if !record.is_downloadable() {
        debug!(message_id = id, "Message has no downloadable media");
        return Ok(None);
    }

    let Some(bytes) = connection.download_self_media(id).await? else {
        return Ok(None);
    };

    info!(message_id = id, size = bytes.len(), "Downloaded media");
    Ok(Some(MediaBlob {
        item: FavoriteItem::from_record(&record),
        bytes: Bytes::from(bytes),
    }))
}
