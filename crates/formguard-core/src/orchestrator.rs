//! Scan orchestration: chunking, single vs batched dispatch, result merging.
//!
//! Batches are awaited one after the other. Results are paired with chunks
//! purely by position, so the order of chunks, batches and per-document
//! results must stay aligned from end to end.

use serde::{Deserialize, Serialize};
use tracing::{debug, Instrument};

use crate::chunker::{chunk_document_with_limit, Chunk, MAX_CHUNK_SIZE};
use crate::collector::FormData;
use crate::config::{ScanCredentials, Settings};
use crate::error::Result;
use crate::metrics::METRICS;
use crate::obs::{emit_batch_sent, emit_scan_finished, emit_scan_started, new_scan_id, scan_span};
use crate::protocol::{
    PolicyBreak, ScanDocument, ScanRequest, ScanResponse, ScanTransport, MAX_DOCS_PER_SCAN,
};

/// A policy break plus, for chunked scans, the ids of the fields in the chunk
/// it was reported for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedPolicyBreak {
    #[serde(flatten)]
    pub policy_break: PolicyBreak,
    /// `None` when the scanned document was the whole collected document, so
    /// its line numbers are usable as is.
    #[serde(
        rename = "_chunkFieldIds",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub chunk_field_ids: Option<Vec<String>>,
}

/// Merged result of every request made for one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedScanResult {
    pub total_break_count: u64,
    /// Policy names, deduplicated, in first-seen order.
    pub policies: Vec<String>,
    pub policy_breaks: Vec<TaggedPolicyBreak>,
    /// Ids of every field that was actually scanned.
    pub field_ids: Vec<String>,
}

impl CombinedScanResult {
    pub fn has_secrets(&self) -> bool {
        self.total_break_count > 0 || !self.policy_breaks.is_empty()
    }

    fn absorb_policies(&mut self, policies: &[String]) {
        for policy in policies {
            if !self.policies.contains(policy) {
                self.policies.push(policy.clone());
            }
        }
    }
}

/// Size and count limits applied while dispatching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanLimits {
    pub max_chunk_bytes: usize,
    pub max_docs_per_batch: usize,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            max_chunk_bytes: MAX_CHUNK_SIZE,
            max_docs_per_batch: MAX_DOCS_PER_SCAN,
        }
    }
}

/// Result of a single-document scan, untagged.
pub fn single_scan_result(response: ScanResponse, chunk: &Chunk) -> CombinedScanResult {
    let mut combined = CombinedScanResult {
        field_ids: chunk.field_ids.clone(),
        ..CombinedScanResult::default()
    };
    for result in response.results {
        combined.total_break_count += result.policy_break_count;
        combined.absorb_policies(&result.policies);
        combined
            .policy_breaks
            .extend(result.policy_breaks.into_iter().map(|policy_break| TaggedPolicyBreak {
                policy_break,
                chunk_field_ids: None,
            }));
    }
    combined
}

/// Merge batch responses, tagging every break with the field ids of the chunk
/// at the same position as the result that reported it.
///
/// A result without a chunk at its position is tagged with an empty list.
pub fn combine_scan_results(batches: &[(ScanResponse, &[Chunk])]) -> CombinedScanResult {
    let mut combined = CombinedScanResult::default();

    for (response, chunks) in batches {
        combined
            .field_ids
            .extend(chunks.iter().flat_map(|c| c.field_ids.iter().cloned()));

        for (index, result) in response.results.iter().enumerate() {
            let chunk_ids = chunks
                .get(index)
                .map(|c| c.field_ids.clone())
                .unwrap_or_default();

            debug!(
                chunk = index,
                breaks = result.policy_breaks.len(),
                fields = chunk_ids.len(),
                "merging document result"
            );

            combined.total_break_count += result.policy_break_count;
            combined.absorb_policies(&result.policies);
            combined
                .policy_breaks
                .extend(result.policy_breaks.iter().map(|policy_break| TaggedPolicyBreak {
                    policy_break: policy_break.clone(),
                    chunk_field_ids: Some(chunk_ids.clone()),
                }));
        }
    }

    combined
}

/// Scans collected form data through a [`ScanTransport`].
pub struct Scanner<T: ScanTransport> {
    transport: T,
    api_url: String,
    api_key: String,
    limits: ScanLimits,
}

impl<T: ScanTransport> Scanner<T> {
    /// Credentials are validated when a scan starts, not here.
    pub fn new(transport: T, api_url: &str, api_key: &str) -> Self {
        Self {
            transport,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            limits: ScanLimits::default(),
        }
    }

    pub fn from_settings(transport: T, settings: &Settings) -> Self {
        Self::new(transport, &settings.scan_endpoint_url, &settings.api_key)
    }

    pub fn with_limits(mut self, limits: ScanLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Scan `form_data`, chunking and batching as needed.
    ///
    /// Fails with [`crate::ScanError::MissingCredentials`] before sending
    /// anything if the endpoint or key is unset. A failed batch aborts the
    /// whole scan.
    pub async fn scan(&self, form_data: &FormData) -> Result<CombinedScanResult> {
        let credentials = ScanCredentials::new(&self.api_url, &self.api_key)?;
        let span = scan_span(&new_scan_id());
        self.scan_with(&credentials, form_data).instrument(span).await
    }

    async fn scan_with(
        &self,
        credentials: &ScanCredentials,
        form_data: &FormData,
    ) -> Result<CombinedScanResult> {
        METRICS.inc_scans();
        emit_scan_started(
            &form_data.filename,
            form_data.field_ids.len(),
            form_data.document.len(),
        );

        let chunks = chunk_document_with_limit(
            &form_data.document,
            form_data.base_name(),
            self.limits.max_chunk_bytes,
        );
        METRICS.add_chunks(chunks.len() as u64);
        debug!(chunks = chunks.len(), "content split into chunks");

        let result = match chunks.as_slice() {
            [only] if only.document == form_data.document => {
                let response = self.scan_single(credentials, only).await?;
                single_scan_result(response, only)
            }
            // an oversized record was dropped: line numbers are chunk-relative
            [only] => {
                let response = self.scan_single(credentials, only).await?;
                combine_scan_results(&[(response, std::slice::from_ref(only))])
            }
            many => self.scan_multiple(credentials, many).await?,
        };

        emit_scan_finished(
            chunks.len(),
            result.total_break_count,
            result.policy_breaks.len(),
        );
        Ok(result)
    }

    async fn scan_single(&self, credentials: &ScanCredentials, chunk: &Chunk) -> Result<ScanResponse> {
        let request = ScanRequest {
            api_url: credentials.api_url().to_string(),
            api_key: credentials.api_key().to_string(),
            documents: vec![ScanDocument::from(chunk)],
            use_multiscan: false,
        };
        emit_batch_sent(0, 1, false);
        METRICS.inc_batches();

        self.transport.send(&request).await
    }

    async fn scan_multiple(
        &self,
        credentials: &ScanCredentials,
        chunks: &[Chunk],
    ) -> Result<CombinedScanResult> {
        let batch_size = self.limits.max_docs_per_batch.max(1);
        let mut responses: Vec<(ScanResponse, &[Chunk])> = Vec::new();

        for (batch_index, batch) in chunks.chunks(batch_size).enumerate() {
            let request = ScanRequest {
                api_url: credentials.api_url().to_string(),
                api_key: credentials.api_key().to_string(),
                documents: batch.iter().map(ScanDocument::from).collect(),
                use_multiscan: true,
            };
            emit_batch_sent(batch_index, batch.len(), true);
            METRICS.inc_batches();

            let response = self.transport.send(&request).await?;
            responses.push((response, batch));
        }

        Ok(combine_scan_results(&responses))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{DocumentScanResult, Match};

    fn chunk(ids: &[&str]) -> Chunk {
        Chunk {
            document: String::new(),
            filename: "c.yaml".to_string(),
            field_ids: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn result(count: u64, policies: &[&str], secret: &str) -> DocumentScanResult {
        DocumentScanResult {
            policy_break_count: count,
            policies: policies.iter().map(|s| s.to_string()).collect(),
            policy_breaks: vec![PolicyBreak::new("Generic", vec![Match::text(secret)])],
            filename: None,
        }
    }

    #[test]
    fn test_combine_pairs_results_with_chunks_by_position() {
        let first = [chunk(&["a"]), chunk(&["b", "c"])];
        let second = [chunk(&["d"])];
        let batches = vec![
            (
                ScanResponse::new(vec![result(1, &["Secrets"], "s1"), result(2, &["Secrets", "Files"], "s2")]),
                &first[..],
            ),
            (ScanResponse::new(vec![result(1, &["Files"], "s3")]), &second[..]),
        ];

        let combined = combine_scan_results(&batches);
        assert_eq!(combined.total_break_count, 4);
        assert_eq!(combined.policies, vec!["Secrets", "Files"]);
        assert_eq!(combined.field_ids, vec!["a", "b", "c", "d"]);

        let tags: Vec<Vec<String>> = combined
            .policy_breaks
            .iter()
            .map(|b| b.chunk_field_ids.clone().unwrap())
            .collect();
        assert_eq!(tags, vec![vec!["a"], vec!["b", "c"], vec!["d"]]);
    }

    #[test]
    fn test_combine_extra_result_gets_empty_tag() {
        let only = [chunk(&["a"])];
        let batches = vec![(
            ScanResponse::new(vec![result(1, &[], "s1"), result(1, &[], "s2")]),
            &only[..],
        )];
        let combined = combine_scan_results(&batches);
        assert_eq!(combined.policy_breaks[1].chunk_field_ids, Some(vec![]));
    }

    #[test]
    fn test_single_result_is_untagged() {
        let c = chunk(&["a", "b"]);
        let combined = single_scan_result(ScanResponse::new(vec![result(1, &["Secrets"], "s")]), &c);
        assert_eq!(combined.field_ids, vec!["a", "b"]);
        assert!(combined.policy_breaks[0].chunk_field_ids.is_none());
        assert!(combined.has_secrets());
    }

    #[tokio::test]
    async fn test_lone_chunk_is_tagged_only_when_records_were_dropped() {
        use crate::collector::collect_form_data;
        use crate::fakes::ScriptedTransport;
        use crate::snapshot::{ElementSnapshot, MemoryPage};

        let mut page = MemoryPage::new();
        page.push(ElementSnapshot::input("text", "big", &"x".repeat(300)));
        page.push(ElementSnapshot::input("text", "small", "ok"));
        let form_data = collect_form_data(&page).unwrap();

        let whole = Scanner::new(ScriptedTransport::new(), "https://api.example.com", "key");
        whole
            .transport()
            .push_response(ScanResponse::new(vec![result(1, &["Secrets"], "ok")]));
        let result = whole.scan(&form_data).await.unwrap();
        assert_eq!(result.policy_breaks.len(), 1);
        assert!(result.policy_breaks[0].chunk_field_ids.is_none());

        let limited = Scanner::new(ScriptedTransport::new(), "https://api.example.com", "key")
            .with_limits(ScanLimits {
                max_chunk_bytes: 100,
                max_docs_per_batch: 20,
            });
        limited
            .transport()
            .push_response(ScanResponse::new(vec![self::result(1, &["Secrets"], "ok")]));
        let result = limited.scan(&form_data).await.unwrap();

        assert_eq!(result.field_ids, vec!["input_text_small"]);
        assert_eq!(
            result.policy_breaks[0].chunk_field_ids,
            Some(vec!["input_text_small".to_string()])
        );
        let requests = limited.transport().requests();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].use_multiscan);
    }

    #[test]
    fn test_tagged_break_serializes_chunk_ids() {
        let tagged = TaggedPolicyBreak {
            policy_break: PolicyBreak::new("Generic", vec![]),
            chunk_field_ids: Some(vec!["a".to_string()]),
        };
        let value = serde_json::to_value(&tagged).unwrap();
        assert_eq!(value["type"], "Generic");
        assert_eq!(value["_chunkFieldIds"][0], "a");
    }
}
