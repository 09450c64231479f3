//! Error types for formguard-client

use formguard_core::ScanError;
use thiserror::Error;

/// Errors raised while talking to the scan API
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Build(String),

    /// Request never produced a response (DNS, connect, timeout)
    #[error("request failed: {0}")]
    Http(String),

    /// Endpoint answered with a non-success status
    #[error("scan API returned {status}: {reason}")]
    Status { status: u16, reason: String },

    /// Response body was not JSON
    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Http(err.to_string())
    }
}

impl From<ClientError> for ScanError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Status { status, reason } => ScanError::Transport {
                status: Some(status),
                reason,
            },
            ClientError::Json(err) => ScanError::Serialization(err),
            ClientError::Build(reason) => ScanError::Settings(reason),
            ClientError::Http(reason) => ScanError::network(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_maps_to_transport_with_code() {
        let err: ScanError = ClientError::Status {
            status: 401,
            reason: "401 Unauthorized - invalid key".to_string(),
        }
        .into();
        assert!(matches!(err, ScanError::Transport { status: Some(401), .. }));
        assert!(err.to_string().contains("HTTP 401"));
    }

    #[test]
    fn test_network_failure_has_no_status() {
        let err: ScanError = ClientError::Http("connection refused".to_string()).into();
        assert!(matches!(err, ScanError::Transport { status: None, .. }));
    }
}
