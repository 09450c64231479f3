//! In-memory fakes for the scan transport (testing only)
//!
//! `ScriptedTransport` replays queued responses in order and records every
//! request it receives.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, ScanError};
use crate::protocol::{DocumentScanResult, ScanRequest, ScanResponse, ScanTransport};

/// Transport that answers from a script.
///
/// With the script exhausted every request gets one clean result per
/// document, so callers only script the interesting responses.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<ScanResponse>>>,
    requests: Mutex<Vec<ScanRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: ScanResponse) {
        self.script.lock().unwrap().push_back(Ok(response));
    }

    /// Queue a raw response body, decoded the way a real transport would.
    pub fn push_json(&self, body: Value) {
        self.push_response(ScanResponse::from_value(body));
    }

    pub fn push_error(&self, error: ScanError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<ScanRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScanTransport for ScriptedTransport {
    async fn send(&self, request: &ScanRequest) -> Result<ScanResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(scripted) => scripted,
            None => Ok(ScanResponse::new(
                request
                    .documents
                    .iter()
                    .map(|_| DocumentScanResult::default())
                    .collect(),
            )),
        }
    }
}
