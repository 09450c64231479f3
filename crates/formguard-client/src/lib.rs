//! Formguard Client: HTTP transport for the secret scanning API
//!
//! Implements [`formguard_core::ScanTransport`] over `reqwest`. Single
//! documents go to `/v1/scan`, batches to `/v1/multiscan`.

pub mod error;
pub mod transport;

use std::time::Duration;

pub use error::ClientError;
pub use transport::{endpoint_for, request_body, HttpScanTransport, MULTISCAN_PATH, SCAN_PATH};

/// Environment variable holding the request timeout in seconds.
pub const TIMEOUT_ENV: &str = "FORMGUARD_HTTP_TIMEOUT_SECS";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            user_agent: format!("formguard/{}", env!("CARGO_PKG_VERSION")),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Defaults, with the timeout overridden by `FORMGUARD_HTTP_TIMEOUT_SECS`
    /// when it holds a positive integer.
    pub fn from_env() -> Self {
        let timeout = std::env::var(TIMEOUT_ENV)
            .ok()
            .and_then(|v| parse_timeout(&v))
            .unwrap_or(DEFAULT_TIMEOUT);
        ClientConfig {
            timeout,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn parse_timeout(raw: &str) -> Option<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout("12"), Some(Duration::from_secs(12)));
        assert_eq!(parse_timeout(" 5 "), Some(Duration::from_secs(5)));
        assert_eq!(parse_timeout("0"), None);
        assert_eq!(parse_timeout("soon"), None);
    }

    #[test]
    fn test_default_user_agent_carries_version() {
        let config = ClientConfig::default();
        assert!(config.user_agent.starts_with("formguard/"));
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }
}
