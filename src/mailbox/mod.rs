//! Mailbox provider: where emails to register come from.

pub mod imap;
pub mod mime;

use async_trait::async_trait;

use crate::error::MailboxError;
use crate::models::email::EmailMessage;

pub use imap::ImapMailbox;
pub use mime::parse_message;

/// Default number of messages fetched for review.
pub const DEFAULT_FETCH_COUNT: usize = 50;

/// Source of inbound emails.
#[async_trait]
pub trait MailboxProvider: Send + Sync {
    /// Connection settings are present.
    fn is_configured(&self) -> bool;

    /// Fetch up to `count` most recent messages, newest first.
    async fn fetch_recent(&self, count: usize) -> Result<Vec<EmailMessage>, MailboxError>;

    /// Permanently delete a message. `Ok(false)` when nothing was deleted.
    async fn delete(&self, unique_id: &str) -> Result<bool, MailboxError>;
}
