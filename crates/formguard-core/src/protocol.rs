//! Wire types of the scan API and the transport seam.
//!
//! Response decoding happens here, once: whatever shape the endpoint returns
//! is turned into a [`ScanResponse`] holding one [`DocumentScanResult`] per
//! scanned document, in submission order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::chunker::Chunk;
use crate::error::Result;

/// Maximum number of documents per multiscan request.
pub const MAX_DOCS_PER_SCAN: usize = 20;

/// One concrete occurrence of a detected secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// The matched secret text.
    #[serde(rename = "match", default)]
    pub text: String,
    /// Kind of secret part matched (e.g. `client_id`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub match_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_end: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_end: Option<usize>,
}

impl Match {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn on_lines(text: impl Into<String>, line_start: usize, line_end: usize) -> Self {
        Self {
            text: text.into(),
            line_start: Some(line_start),
            line_end: Some(line_end),
            ..Self::default()
        }
    }
}

/// One detected secret category with its matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyBreak {
    #[serde(rename = "type", default)]
    pub break_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity: Option<String>,
    #[serde(default)]
    pub matches: Vec<Match>,
}

impl PolicyBreak {
    pub fn new(break_type: impl Into<String>, matches: Vec<Match>) -> Self {
        Self {
            break_type: break_type.into(),
            matches,
            ..Self::default()
        }
    }
}

/// Scan result for one submitted document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentScanResult {
    #[serde(default)]
    pub policy_break_count: u64,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub policy_breaks: Vec<PolicyBreak>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Canonical decoded response: one result per submitted document, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResponse {
    pub results: Vec<DocumentScanResult>,
}

impl ScanResponse {
    pub fn new(results: Vec<DocumentScanResult>) -> Self {
        Self { results }
    }

    /// Decode any of the accepted response shapes:
    ///
    /// - a bare array of results (multiscan),
    /// - an object wrapping them under `scan_results`,
    /// - a single result object.
    ///
    /// Anything else decodes to no results. An array element that is not a
    /// result object becomes an empty result so positions stay aligned.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::new(items.into_iter().map(decode_result).collect()),
            Value::Object(mut map) => match map.remove("scan_results") {
                Some(Value::Array(items)) => {
                    Self::new(items.into_iter().map(decode_result).collect())
                }
                Some(other) => {
                    warn!(shape = %shape_name(&other), "scan_results is not an array, treating as no breaks");
                    Self::default()
                }
                None => Self::new(vec![decode_result(Value::Object(map))]),
            },
            other => {
                warn!(shape = %shape_name(&other), "unrecognized scan response shape, treating as no breaks");
                Self::default()
            }
        }
    }

    pub fn total_break_count(&self) -> u64 {
        self.results.iter().map(|r| r.policy_break_count).sum()
    }
}

fn decode_result(value: Value) -> DocumentScanResult {
    match serde_json::from_value::<DocumentScanResult>(value) {
        Ok(result) => result,
        Err(err) => {
            warn!(error = %err, "malformed document result, treating as no breaks");
            DocumentScanResult::default()
        }
    }
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Document as submitted to the scan API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanDocument {
    pub document: String,
    pub filename: String,
}

impl From<&Chunk> for ScanDocument {
    fn from(chunk: &Chunk) -> Self {
        Self {
            document: chunk.document.clone(),
            filename: chunk.filename.clone(),
        }
    }
}

/// Request handed to a [`ScanTransport`].
///
/// Carries the credentials along with the documents so a transport running
/// in another process needs no configuration of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub api_url: String,
    pub api_key: String,
    pub documents: Vec<ScanDocument>,
    /// Use the batched `/v1/multiscan` variant of the protocol.
    pub use_multiscan: bool,
}

/// JSON body of a `/v1/scan` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ScanPayload {
    Single { document: String, filename: String },
    Many { documents: Vec<ScanDocument> },
}

impl ScanPayload {
    /// One document goes unwrapped, several go under `documents`.
    pub fn for_documents(documents: &[ScanDocument]) -> Self {
        match documents {
            [only] => ScanPayload::Single {
                document: only.document.clone(),
                filename: only.filename.clone(),
            },
            many => ScanPayload::Many {
                documents: many.to_vec(),
            },
        }
    }
}

/// Sends scan requests to the remote scanner.
#[async_trait]
pub trait ScanTransport: Send + Sync {
    async fn send(&self, request: &ScanRequest) -> Result<ScanResponse>;
}
