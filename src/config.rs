//! Configuration types.
//!
//! Both configs are read once at startup from environment variables and then
//! passed by value into the components that need them.

use secrecy::{ExposeSecret, SecretString};

use crate::error::ConfigError;

pub const EZD_ENDPOINT: &str = "EZD_ENDPOINT";
pub const EZD_CID: &str = "EZD_CID";
pub const EZD_OWNER_EMPLOYEE_ID: &str = "EZD_OWNER_EMPLOYEE_ID";
pub const EZD_OWNER_POSITION_ID: &str = "EZD_OWNER_POSITION_ID";

pub const MAILBOX_IMAP_HOST: &str = "MAILBOX_IMAP_HOST";
pub const MAILBOX_IMAP_PORT: &str = "MAILBOX_IMAP_PORT";
pub const MAILBOX_USE_TLS: &str = "MAILBOX_USE_TLS";
pub const MAILBOX_USERNAME: &str = "MAILBOX_USERNAME";
pub const MAILBOX_PASSWORD: &str = "MAILBOX_PASSWORD";

const DEFAULT_IMAP_PORT: u16 = 993;

// ── EZD ─────────────────────────────────────────────────────────────

/// Office identity and endpoint for the EZD registration API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EzdConfig {
    /// Registration endpoint URL.
    pub endpoint: String,
    /// Organizational client ID (CID).
    pub cid: i64,
    /// Employee who will own registered documents.
    pub owner_employee_id: i64,
    /// Position (stanowisko) that will own registered documents.
    pub owner_position_id: i64,
}

impl EzdConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// Absent keys leave the field unconfigured; present but non-numeric
    /// IDs are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            endpoint: lookup(EZD_ENDPOINT)
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            cid: parse_id(&lookup, EZD_CID)?,
            owner_employee_id: parse_id(&lookup, EZD_OWNER_EMPLOYEE_ID)?,
            owner_position_id: parse_id(&lookup, EZD_OWNER_POSITION_ID)?,
        })
    }

    pub fn has_endpoint(&self) -> bool {
        !self.endpoint.is_empty()
    }

    pub fn has_cid(&self) -> bool {
        self.cid > 0
    }

    pub fn has_owner_employee(&self) -> bool {
        self.owner_employee_id > 0
    }

    pub fn has_owner_position(&self) -> bool {
        self.owner_position_id > 0
    }

    /// All four settings are present.
    pub fn is_configured(&self) -> bool {
        self.has_endpoint() && self.has_cid() && self.has_owner_employee() && self.has_owner_position()
    }

    /// Names of the settings that still need a value.
    pub fn missing_items(&self) -> Vec<String> {
        [
            (self.has_endpoint(), EZD_ENDPOINT),
            (self.has_cid(), EZD_CID),
            (self.has_owner_employee(), EZD_OWNER_EMPLOYEE_ID),
            (self.has_owner_position(), EZD_OWNER_POSITION_ID),
        ]
        .into_iter()
        .filter(|(present, _)| !present)
        .map(|(_, key)| key.to_string())
        .collect()
    }

    /// Check completeness, naming every missing setting on failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing = self.missing_items();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Incomplete { missing })
        }
    }
}

// ── Mailbox ─────────────────────────────────────────────────────────

/// IMAP connection settings for the inbound mailbox.
#[derive(Debug, Clone)]
pub struct MailboxConfig {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub username: String,
    pub password: SecretString,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_IMAP_PORT,
            use_tls: true,
            username: String::new(),
            password: SecretString::from(String::new()),
        }
    }
}

impl MailboxConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup(MAILBOX_IMAP_PORT) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: MAILBOX_IMAP_PORT.to_string(),
                    message: e.to_string(),
                })?,
            None => DEFAULT_IMAP_PORT,
        };

        let use_tls = match lookup(MAILBOX_USE_TLS) {
            Some(raw) => parse_bool(MAILBOX_USE_TLS, &raw)?,
            None => true,
        };

        Ok(Self {
            host: lookup(MAILBOX_IMAP_HOST)
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            port,
            use_tls,
            username: lookup(MAILBOX_USERNAME).unwrap_or_default(),
            password: SecretString::from(lookup(MAILBOX_PASSWORD).unwrap_or_default()),
        })
    }

    /// Host and credentials are present.
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty()
            && !self.username.is_empty()
            && !self.password.expose_secret().is_empty()
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn parse_id<F>(lookup: &F, key: &str) -> Result<i64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(0),
        Some(raw) if raw.trim().is_empty() => Ok(0),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn full_ezd() -> EzdConfig {
        EzdConfig {
            endpoint: "https://ezd.example.gov.pl/api".into(),
            cid: 7,
            owner_employee_id: 101,
            owner_position_id: 202,
        }
    }

    #[test]
    fn ezd_full_config_is_configured() {
        let cfg = full_ezd();
        assert!(cfg.is_configured());
        assert!(cfg.missing_items().is_empty());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn ezd_default_reports_everything_missing() {
        let cfg = EzdConfig::default();
        assert!(!cfg.is_configured());
        assert_eq!(
            cfg.missing_items(),
            vec![
                EZD_ENDPOINT,
                EZD_CID,
                EZD_OWNER_EMPLOYEE_ID,
                EZD_OWNER_POSITION_ID
            ]
        );
    }

    #[test]
    fn ezd_non_positive_ids_are_missing() {
        let cfg = EzdConfig {
            cid: -3,
            owner_position_id: 0,
            ..full_ezd()
        };
        assert_eq!(cfg.missing_items(), vec![EZD_CID, EZD_OWNER_POSITION_ID]);
    }

    #[test]
    fn ezd_validate_names_missing_items() {
        let cfg = EzdConfig {
            endpoint: String::new(),
            ..full_ezd()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains(EZD_ENDPOINT));
    }

    #[test]
    fn ezd_from_lookup_parses_values() {
        let cfg = EzdConfig::from_lookup(lookup_from(&[
            (EZD_ENDPOINT, " https://ezd.test/svc "),
            (EZD_CID, "12"),
            (EZD_OWNER_EMPLOYEE_ID, "34"),
            (EZD_OWNER_POSITION_ID, " 56 "),
        ]))
        .unwrap();
        assert_eq!(cfg.endpoint, "https://ezd.test/svc");
        assert_eq!(cfg.cid, 12);
        assert_eq!(cfg.owner_employee_id, 34);
        assert_eq!(cfg.owner_position_id, 56);
        assert!(cfg.is_configured());
    }

    #[test]
    fn ezd_from_lookup_absent_keys_are_unconfigured() {
        let cfg = EzdConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg, EzdConfig::default());
    }

    #[test]
    fn ezd_from_lookup_rejects_non_numeric_id() {
        let err = EzdConfig::from_lookup(lookup_from(&[(EZD_CID, "abc")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == EZD_CID));
    }

    #[test]
    fn mailbox_defaults() {
        let cfg = MailboxConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.port, 993);
        assert!(cfg.use_tls);
        assert!(!cfg.is_configured());
    }

    #[test]
    fn mailbox_from_lookup_parses_values() {
        let cfg = MailboxConfig::from_lookup(lookup_from(&[
            (MAILBOX_IMAP_HOST, "imap.urzad.test"),
            (MAILBOX_IMAP_PORT, "143"),
            (MAILBOX_USE_TLS, "false"),
            (MAILBOX_USERNAME, "kancelaria"),
            (MAILBOX_PASSWORD, "s3cret"),
        ]))
        .unwrap();
        assert_eq!(cfg.host, "imap.urzad.test");
        assert_eq!(cfg.port, 143);
        assert!(!cfg.use_tls);
        assert_eq!(cfg.password.expose_secret(), "s3cret");
        assert!(cfg.is_configured());
    }

    #[test]
    fn mailbox_rejects_bad_port_and_bool() {
        assert!(MailboxConfig::from_lookup(lookup_from(&[(MAILBOX_IMAP_PORT, "99999")])).is_err());
        assert!(MailboxConfig::from_lookup(lookup_from(&[(MAILBOX_USE_TLS, "maybe")])).is_err());
    }

    #[test]
    fn mailbox_debug_does_not_leak_password() {
        let cfg = MailboxConfig {
            password: SecretString::from("hunter2".to_string()),
            ..MailboxConfig::default()
        };
        assert!(!format!("{cfg:?}").contains("hunter2"));
    }
}
