//! Error taxonomy for formguard scanning.

use thiserror::Error;

/// Errors that abort a scan.
///
/// Oversized records, unreconciled matches and malformed response shapes are
/// not errors: they are logged and the scan carries on without them.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Scan endpoint URL or API key is unset. Raised before any network activity.
    #[error("scan endpoint URL and API key are required")]
    MissingCredentials,

    /// Non-success response or network failure from the scan endpoint
    #[error("scan transport error{}: {reason}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Transport { status: Option<u16>, reason: String },

    /// Settings could not be loaded or parsed
    #[error("settings error: {0}")]
    Settings(String),

    /// JSON (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScanError {
    /// Transport failure without an HTTP status (connection refused, timeout, ...).
    pub fn network(reason: impl Into<String>) -> Self {
        ScanError::Transport {
            status: None,
            reason: reason.into(),
        }
    }

    /// Whether this error happened before anything was sent.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ScanError::MissingCredentials | ScanError::Settings(_))
    }
}

impl From<toml::de::Error> for ScanError {
    fn from(err: toml::de::Error) -> Self {
        ScanError::Settings(err.to_string())
    }
}

/// Result type for formguard operations.
pub type Result<T> = std::result::Result<T, ScanError>;
