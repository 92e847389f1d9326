//! Registration form: the editable staging object submitted to EZD.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::email::EmailMessage;

/// Delivery method label used when nothing else is chosen.
pub const DEFAULT_DELIVERY_METHOD: &str = "Email";

/// Form data for one inflow registration.
///
/// Built from an email by [`RegistrationForm::from_email`], then edited by
/// the operator. Given/family name are independent fields and may drift from
/// `addressee_name` after edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationForm {
    // Sender
    pub addressee_name: String,
    pub addressee_given_name: String,
    pub addressee_family_name: String,
    pub addressee_email: String,
    pub addressee_phone: String,

    // Document
    pub title: String,
    pub remarks: String,
    pub document_date: NaiveDateTime,
    pub arrival_date: NaiveDateTime,

    pub delivery_method: String,
    pub is_electronic: bool,

    pub attachments: Vec<AttachmentSelection>,

    // Origin
    pub email_unique_id: String,
    #[serde(default, skip_serializing)]
    pub raw_email_content: Option<Vec<u8>>,
}

impl Default for RegistrationForm {
    fn default() -> Self {
        let now = Local::now().naive_local();
        Self {
            addressee_name: String::new(),
            addressee_given_name: String::new(),
            addressee_family_name: String::new(),
            addressee_email: String::new(),
            addressee_phone: String::new(),
            title: String::new(),
            remarks: String::new(),
            document_date: now,
            arrival_date: now,
            delivery_method: DEFAULT_DELIVERY_METHOD.to_string(),
            is_electronic: true,
            attachments: Vec::new(),
            email_unique_id: String::new(),
            raw_email_content: None,
        }
    }
}

impl RegistrationForm {
    /// Auto-fill a form from an email, stamping the arrival date with the
    /// current local time.
    pub fn from_email(email: &EmailMessage) -> Self {
        Self::from_email_at(email, Local::now().naive_local())
    }

    /// Auto-fill a form from an email with an explicit arrival time.
    pub fn from_email_at(email: &EmailMessage, arrived_at: NaiveDateTime) -> Self {
        let (given, family) = split_display_name(&email.from_name);

        Self {
            addressee_name: email.from_name.clone(),
            addressee_given_name: given.to_string(),
            addressee_family_name: family.to_string(),
            addressee_email: email.from_email.clone(),
            title: email.subject.clone(),
            document_date: email.date,
            arrival_date: arrived_at,
            attachments: email
                .attachments
                .iter()
                .map(|att| AttachmentSelection {
                    file_name: att.file_name.clone(),
                    content: att.content.clone(),
                    content_type: att.content_type.clone(),
                    is_selected: true,
                })
                .collect(),
            email_unique_id: email.unique_id.clone(),
            raw_email_content: email.raw_message.clone(),
            ..Self::default()
        }
    }

    /// Number of attachments the operator kept selected.
    pub fn selected_attachment_count(&self) -> usize {
        self.attachments.iter().filter(|a| a.is_selected).count()
    }

    /// Toggle selection for every attachment with the given file name.
    /// Returns how many entries matched.
    pub fn set_attachment_selected(&mut self, file_name: &str, selected: bool) -> usize {
        let mut matched = 0;
        for att in self.attachments.iter_mut().filter(|a| a.file_name == file_name) {
            att.is_selected = selected;
            matched += 1;
        }
        matched
    }
}

/// Split a display name into (given name, family name).
///
/// Heuristic only: the first whitespace-delimited token is the given name and
/// everything after the first whitespace run is the family name. Names with a
/// single token (or none) get an empty family name. The operator is expected
/// to correct the result.
pub fn split_display_name(name: &str) -> (&str, &str) {
    let name = name.trim();
    match name.split_once(char::is_whitespace) {
        Some((given, rest)) => (given, rest.trim_start()),
        None => (name, ""),
    }
}

/// An attachment together with the operator's include/exclude choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentSelection {
    pub file_name: String,
    #[serde(skip_serializing, default)]
    pub content: Vec<u8>,
    pub content_type: String,
    #[serde(default = "default_selected")]
    pub is_selected: bool,
}

fn default_selected() -> bool {
    true
}

impl AttachmentSelection {
    /// Human-readable size: B below 1 KiB, KB below 1 MiB, MB above.
    /// Uses truncating division.
    pub fn size_formatted(&self) -> String {
        format_size(self.content.len())
    }
}

fn format_size(len: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * 1024;
    match len {
        n if n < KB => format!("{n} B"),
        n if n < MB => format!("{} KB", n / KB),
        n => format!("{} MB", n / MB),
    }
}
