//! Data shapes shared between the mailbox side and the EZD side.

pub mod email;
pub mod form;
pub mod result;

pub use email::{EmailAttachment, EmailMessage};
pub use form::{AttachmentSelection, RegistrationForm, split_display_name};
pub use result::{Registration, RegistrationResult};
