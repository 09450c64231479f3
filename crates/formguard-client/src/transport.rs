//! `reqwest`-backed scan transport.

use async_trait::async_trait;
use formguard_core::{
    Result, ScanCredentials, ScanPayload, ScanRequest, ScanResponse, ScanTransport,
};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::ClientConfig;

pub const SCAN_PATH: &str = "/v1/scan";
pub const MULTISCAN_PATH: &str = "/v1/multiscan";

/// Endpoint URL for `base`, ignoring trailing slashes on the base.
pub fn endpoint_for(base: &str, multiscan: bool) -> String {
    let path = if multiscan { MULTISCAN_PATH } else { SCAN_PATH };
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// JSON body for `request`.
///
/// Multiscan takes a bare array of documents; `/v1/scan` takes one document
/// unwrapped or several under `documents`.
pub fn request_body(request: &ScanRequest) -> std::result::Result<Value, serde_json::Error> {
    if request.use_multiscan {
        serde_json::to_value(&request.documents)
    } else {
        serde_json::to_value(ScanPayload::for_documents(&request.documents))
    }
}

/// Scan transport talking HTTP to a GitGuardian-compatible API.
///
/// No retries: a failed request fails the scan.
pub struct HttpScanTransport {
    http_client: reqwest::Client,
}

impl HttpScanTransport {
    pub fn new(config: ClientConfig) -> std::result::Result<Self, ClientError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        Ok(HttpScanTransport { http_client })
    }

    /// Transport configured from the environment.
    pub fn from_env() -> std::result::Result<Self, ClientError> {
        Self::new(ClientConfig::from_env())
    }

    async fn post(
        &self,
        credentials: &ScanCredentials,
        request: &ScanRequest,
    ) -> std::result::Result<ScanResponse, ClientError> {
        let url = endpoint_for(credentials.api_url(), request.use_multiscan);
        let body = request_body(request)?;
        debug!(url = %url, documents = request.documents.len(), "posting scan request");

        let response = self
            .http_client
            .post(&url)
            .header(AUTHORIZATION, format!("Token {}", credentials.api_key()))
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let reason = format!(
                "{} {} - {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown"),
                text
            );
            warn!(status = status.as_u16(), "scan API rejected request");
            return Err(ClientError::Status {
                status: status.as_u16(),
                reason,
            });
        }

        let text = response.text().await?;
        let value: Value = serde_json::from_str(&text)?;
        Ok(ScanResponse::from_value(value))
    }
}

#[async_trait]
impl ScanTransport for HttpScanTransport {
    async fn send(&self, request: &ScanRequest) -> Result<ScanResponse> {
        let credentials = ScanCredentials::new(&request.api_url, &request.api_key)?;
        Ok(self.post(&credentials, request).await?)
    }
}
