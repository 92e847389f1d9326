//! Outcome of a single inflow registration attempt.

use serde::{Deserialize, Serialize};

/// Identifiers EZD returns for a registered inflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// RPW registration number (ZnakWplywu). The authoritative identifier.
    pub rpw_number: String,
    /// Internal document ID (IdDokumentu).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<i64>,
    /// Internal inflow ID (IdWplywu).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inflow_id: Option<i32>,
    /// Folder (koszulka) ID (IdKoszulki).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<i32>,
}

impl Registration {
    pub fn new(rpw_number: impl Into<String>) -> Self {
        Self {
            rpw_number: rpw_number.into(),
            document_id: None,
            inflow_id: None,
            folder_id: None,
        }
    }
}

/// Result of `register_inflow`: either a registration or an error message,
/// never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegistrationResult {
    Registered(Registration),
    Failed { message: String },
}

impl RegistrationResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Registered(_))
    }

    pub fn registration(&self) -> Option<&Registration> {
        match self {
            Self::Registered(reg) => Some(reg),
            Self::Failed { .. } => None,
        }
    }

    pub fn rpw_number(&self) -> Option<&str> {
        self.registration().map(|r| r.rpw_number.as_str())
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Registered(_) => None,
            Self::Failed { message } => Some(message),
        }
    }
}

impl From<Registration> for RegistrationResult {
    fn from(reg: Registration) -> Self {
        Self::Registered(reg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_on_success() {
        let result: RegistrationResult = Registration {
            document_id: Some(5001),
            ..Registration::new("RPW/2024/002")
        }
        .into();
        assert!(result.is_success());
        assert_eq!(result.rpw_number(), Some("RPW/2024/002"));
        assert_eq!(result.error_message(), None);
        assert_eq!(result.registration().and_then(|r| r.document_id), Some(5001));
    }

    #[test]
    fn accessors_on_failure() {
        let result = RegistrationResult::failure("Duplicate document");
        assert!(!result.is_success());
        assert_eq!(result.rpw_number(), None);
        assert_eq!(result.error_message(), Some("Duplicate document"));
    }

    #[test]
    fn serializes_tagged_and_omits_absent_ids() {
        let ok = RegistrationResult::from(Registration {
            inflow_id: Some(0),
            ..Registration::new("RPW/1")
        });
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["status"], "registered");
        assert_eq!(json["rpw_number"], "RPW/1");
        assert_eq!(json["inflow_id"], 0);
        assert!(json.get("document_id").is_none());

        let failed = serde_json::to_value(RegistrationResult::failure("nope")).unwrap();
        assert_eq!(failed["status"], "failed");
        assert_eq!(failed["message"], "nope");
    }
}
