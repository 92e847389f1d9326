//! Error types for the EZD inflow bridge.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("EZD error: {0}")]
    Ezd(#[from] EzdError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Missing required configuration: {}", missing.join(", "))]
    Incomplete { missing: Vec<String> },
}

/// Errors raised while talking to the EZD registration endpoint.
///
/// The `Display` text of each variant is what ends up in a failed
/// `RegistrationResult`, so it is written for an operator.
#[derive(Debug, thiserror::Error)]
pub enum EzdError {
    #[error("EZD API is not configured. Missing: {}", missing.join(", "))]
    NotConfigured { missing: Vec<String> },

    #[error("Failed to build EZD request: {0}")]
    Encode(String),

    #[error("EZD request failed: {0}")]
    Transport(String),

    #[error("API Error: HTTP {status}")]
    Status { status: u16 },

    #[error("Failed to parse response from EZD API: {0}")]
    UnparseableResponse(String),
}

/// Mailbox (IMAP) errors.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Failed to connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("IMAP login failed for {username}")]
    Auth { username: String },

    #[error("IMAP command {command} failed: {reason}")]
    Protocol { command: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
