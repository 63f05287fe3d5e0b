//! Shared data types: inbound events, milestones, capture records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A messaging address, e.g. `5491100000000@c.us` or `104977657778311@lid`.
pub type Address = String;

/// Returns the number part of an address (everything before `@`).
///
/// The same account can show up under different suffixes (`@lid` vs `@c.us`),
/// so target matching compares numbers, not full addresses.
pub fn address_number(address: &str) -> &str {
    address.split('@').next().unwrap_or_default()
}

/// Kind of media attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Sticker,
    Image,
    Video,
    Audio,
    Ptt,
    Document,
    #[serde(other)]
    Other,
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sticker => "sticker",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Ptt => "ptt",
            Self::Document => "document",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// A message observed on the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    /// Sender address.
    pub source_address: Address,
    /// Text body, if any.
    #[serde(default)]
    pub body: Option<String>,
    /// Whether the message carries media.
    #[serde(default)]
    pub has_attachment: bool,
    /// Kind of the attached media.
    #[serde(default)]
    pub attachment_kind: Option<AttachmentKind>,
    /// When the message was received.
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    /// A plain text message.
    pub fn text(source: impl Into<Address>, body: impl Into<String>) -> Self {
        Self {
            source_address: source.into(),
            body: Some(body.into()),
            has_attachment: false,
            attachment_kind: None,
            received_at: Utc::now(),
        }
    }

    /// A media message with no caption.
    pub fn media(source: impl Into<Address>, kind: AttachmentKind) -> Self {
        Self {
            source_address: source.into(),
            body: None,
            has_attachment: true,
            attachment_kind: Some(kind),
            received_at: Utc::now(),
        }
    }

    /// Non-empty text body.
    pub fn text_body(&self) -> Option<&str> {
        self.body.as_deref().filter(|b| !b.is_empty())
    }

    /// Whether the message carries an attachment of `kind`.
    pub fn carries(&self, kind: &AttachmentKind) -> bool {
        self.has_attachment && self.attachment_kind.as_ref() == Some(kind)
    }

    /// Text shown in logs: the body, or `[kind]` for bodiless media.
    pub fn display_body(&self) -> String {
        match (self.text_body(), &self.attachment_kind) {
            (Some(body), _) => body.to_string(),
            (None, Some(kind)) => format!("[{kind}]"),
            (None, None) => "[empty]".to_string(),
        }
    }
}

/// Connection lifecycle reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A pairing code must be scanned.
    Qr(String),
    /// The session is authenticated and usable.
    Ready,
    /// Pairing or session restore failed.
    AuthFailure(String),
    /// The session dropped.
    Disconnected(String),
}

/// A milestone tracked as a run post-condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Milestone {
    /// The opening attachment that starts the conversation flow.
    Opening,
    /// The terminal attachment that ends the quote.
    Terminal,
}

impl Milestone {
    /// Fixed file basename for captures of this milestone.
    pub fn basename(self) -> &'static str {
        match self {
            Self::Opening => "respuesta-tenes-patente",
            Self::Terminal => "empezar",
        }
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opening => f.write_str("opening attachment"),
            Self::Terminal => f.write_str("terminal attachment"),
        }
    }
}

/// A filed capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRecord {
    /// Which milestone the capture documents.
    pub label: Milestone,
    /// Where the PNG was written.
    pub file_path: PathBuf,
    /// Local wall-clock time of the capture.
    pub captured_at: chrono::NaiveDateTime,
}
