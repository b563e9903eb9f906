//! Media classification for Saved Messages entries
//!
//! Maps a message projection to a coarse [`MediaKind`] and derives the
//! display filename used for downloads and archive entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Telegram message identifier inside the self-conversation
pub type MessageId = i32;

/// Coarse media category of a favorite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Compressed photo
    Photo,
    /// Video file (including round videos and GIF-like videos)
    Video,
    /// Any other document
    Document,
    /// Music or other audio file
    Audio,
    /// Voice note
    Voice,
    /// Media present but nothing downloadable recognised
    Unknown,
}

impl MediaKind {
    /// Human-readable label for the dashboard
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Photo => "Photo",
            Self::Video => "Video",
            Self::Document => "Document",
            Self::Audio => "Audio",
            Self::Voice => "Voice",
            Self::Unknown => "Unknown",
        }
    }

    /// Content type used when the item is served on its own
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Photo => "image/jpeg",
            Self::Video => "video/mp4",
            Self::Audio => "audio/mpeg",
            Self::Voice => "audio/ogg",
            Self::Document | Self::Unknown => "application/octet-stream",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One downloadable attachment slot of a message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attachment {
    /// File name declared by the sender, if any
    pub file_name: Option<String>,
    /// Size in bytes as reported by Telegram
    pub size: Option<u64>,
}

impl Attachment {
    /// Attachment without a declared name
    #[must_use]
    pub const fn unnamed(size: Option<u64>) -> Self {
        Self {
            file_name: None,
            size,
        }
    }

    /// Attachment with a declared file name
    #[must_use]
    pub fn named(file_name: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            size,
        }
    }

    fn declared_name(&self) -> Option<&str> {
        self.file_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// Message-like record exposing the optional attachments of a message
///
/// Produced by the Telegram backend; at most one slot is expected to be set,
/// but [`classify`] resolves ambiguity by a fixed priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    /// Message id
    pub id: MessageId,
    /// Send date
    pub date: DateTime<Utc>,
    /// Whether the message carries any media at all (downloadable or not)
    pub has_media: bool,
    /// Photo slot
    pub photo: Option<Attachment>,
    /// Video slot
    pub video: Option<Attachment>,
    /// Generic document slot
    pub document: Option<Attachment>,
    /// Audio slot
    pub audio: Option<Attachment>,
    /// Voice note slot
    pub voice: Option<Attachment>,
}

impl MessageRecord {
    /// Plain text message without media
    #[must_use]
    pub const fn text(id: MessageId, date: DateTime<Utc>) -> Self {
        Self {
            id,
            date,
            has_media: false,
            photo: None,
            video: None,
            document: None,
            audio: None,
            voice: None,
        }
    }

    /// Message with a single attachment of the given kind
    ///
    /// `MediaKind::Unknown` yields a message that has media but no
    /// downloadable attachment (web page preview, contact, location...).
    #[must_use]
    pub fn with_attachment(
        id: MessageId,
        date: DateTime<Utc>,
        kind: MediaKind,
        attachment: Attachment,
    ) -> Self {
        let mut record = Self::text(id, date);
        record.has_media = true;
        let slot = match kind {
            MediaKind::Photo => &mut record.photo,
            MediaKind::Video => &mut record.video,
            MediaKind::Document => &mut record.document,
            MediaKind::Audio => &mut record.audio,
            MediaKind::Voice => &mut record.voice,
            MediaKind::Unknown => return record,
        };
        *slot = Some(attachment);
        record
    }

    /// Attachment selected by [`classify`], if any
    #[must_use]
    pub fn primary_attachment(&self) -> Option<&Attachment> {
        self.photo
            .as_ref()
            .or(self.video.as_ref())
            .or(self.document.as_ref())
            .or(self.audio.as_ref())
            .or(self.voice.as_ref())
    }

    /// Whether the message has something that can be downloaded
    #[must_use]
    pub fn is_downloadable(&self) -> bool {
        self.has_media && self.primary_attachment().is_some()
    }
}

/// Classify a message: photo, video, document, audio, voice, first match wins
#[must_use]
pub fn classify(record: &MessageRecord) -> MediaKind {
    if record.photo.is_some() {
        MediaKind::Photo
    } else if record.video.is_some() {
        MediaKind::Video
    } else if record.document.is_some() {
        MediaKind::Document
    } else if record.audio.is_some() {
        MediaKind::Audio
    } else if record.voice.is_some() {
        MediaKind::Voice
    } else {
        MediaKind::Unknown
    }
}

/// Derive the display filename for a message
///
/// Declared names win for videos, documents and audio; photos and voice
/// notes always get a synthetic name.
#[must_use]
pub fn derive_filename(record: &MessageRecord) -> String {
    let id = record.id;
    let declared = |slot: &Option<Attachment>| {
        slot.as_ref()
            .and_then(Attachment::declared_name)
            .map(ToString::to_string)
    };

    match classify(record) {
        MediaKind::Photo => format!("photo_{id}.jpg"),
        MediaKind::Video => declared(&record.video).unwrap_or_else(|| format!("video_{id}.mp4")),
        MediaKind::Document => {
            declared(&record.document).unwrap_or_else(|| format!("document_{id}"))
        }
        MediaKind::Audio => declared(&record.audio).unwrap_or_else(|| format!("audio_{id}.mp3")),
        MediaKind::Voice => format!("voice_{id}.ogg"),
        MediaKind::Unknown => format!("file_{id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53)
            .single()
            .unwrap_or_default()
    }

    #[test]
    fn test_synthetic_names() {
        let cases = [
            (MediaKind::Photo, "photo_7.jpg"),
            (MediaKind::Video, "video_7.mp4"),
            (MediaKind::Document, "document_7"),
            (MediaKind::Audio, "audio_7.mp3"),
            (MediaKind::Voice, "voice_7.ogg"),
            (MediaKind::Unknown, "file_7"),
        ];
        for (kind, expected) in cases {
            let record = MessageRecord::with_attachment(7, date(), kind, Attachment::default());
            assert_eq!(classify(&record), kind);
            assert_eq!(derive_filename(&record), expected);
        }
    }

    #[test]
    fn test_declared_names() {
        let video = MessageRecord::with_attachment(
            1,
            date(),
            MediaKind::Video,
            Attachment::named("holiday.mov", None),
        );
        assert_eq!(derive_filename(&video), "holiday.mov");

        let doc = MessageRecord::with_attachment(
            2,
            date(),
            MediaKind::Document,
            Attachment::named("report.pdf", Some(1024)),
        );
        assert_eq!(derive_filename(&doc), "report.pdf");

        // Voice notes and photos ignore declared names
        let voice = MessageRecord::with_attachment(
            3,
            date(),
            MediaKind::Voice,
            Attachment::named("note.oga", None),
        );
        assert_eq!(derive_filename(&voice), "voice_3.ogg");
    }

    #[test]
    fn test_blank_declared_name_is_ignored() {
        let audio = MessageRecord::with_attachment(
            9,
            date(),
            MediaKind::Audio,
            Attachment::named("   ", None),
        );
        assert_eq!(derive_filename(&audio), "audio_9.mp3");
    }

    #[test]
    fn test_text_message_is_unknown() {
        let record = MessageRecord::text(42, date());
        assert_eq!(classify(&record), MediaKind::Unknown);
        assert_eq!(derive_filename(&record), "file_42");
        assert!(!record.is_downloadable());
    }

    #[test]
    fn test_priority_order_resolves_ambiguity() {
        let mut record = MessageRecord::with_attachment(
            5,
            date(),
            MediaKind::Audio,
            Attachment::named("song.flac", None),
        );
        record.document = Some(Attachment::named("cover.txt", None));
        assert_eq!(classify(&record), MediaKind::Document);
        assert_eq!(derive_filename(&record), "cover.txt");

        record.photo = Some(Attachment::default());
        assert_eq!(classify(&record), MediaKind::Photo);
        assert_eq!(derive_filename(&record), "photo_5.jpg");
    }
}
