//! Email snapshot types produced by a mailbox provider.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A message retrieved from the inbound mailbox.
///
/// Read-only once built: the EZD side only copies fields out of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Server-assigned identifier (IMAP UID), stable within a mailbox session.
    pub unique_id: String,
    /// Sender address.
    pub from_email: String,
    /// Sender display name.
    pub from_name: String,
    /// Subject line.
    pub subject: String,
    /// When the message was sent, in local time.
    pub date: NaiveDateTime,
    /// HTML body if present, otherwise plain text.
    pub body: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<EmailAttachment>,
    /// Full RFC 5322 source, kept for archival.
    #[serde(default, skip_serializing)]
    pub raw_message: Option<Vec<u8>>,
}

/// A decoded attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailAttachment {
    pub file_name: String,
    #[serde(skip_serializing, default)]
    pub content: Vec<u8>,
    pub content_type: String,
}

impl EmailAttachment {
    pub fn new(
        file_name: impl Into<String>,
        content: Vec<u8>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content,
            content_type: content_type.into(),
        }
    }
}
