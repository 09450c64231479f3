//! Structured observability hooks for the scan lifecycle.
//!
//! This module provides:
//! - Scan-scoped tracing spans, attached to the scan future with `Instrument`
//! - Emission functions for key lifecycle events: scan start, batch dispatch,
//!   dropped records, scan finish
//!
//! Events are emitted at `info!` level unless noted (filter with `RUST_LOG`).

use tracing::info;
use uuid::Uuid;

/// Span for one scan invocation.
pub fn scan_span(scan_id: &str) -> tracing::Span {
    tracing::info_span!("formguard.scan", scan_id = %scan_id)
}

/// Fresh identifier for a scan invocation.
pub fn new_scan_id() -> String {
    Uuid::new_v4().to_string()
}

/// Emit event: scan started for a document.
pub fn emit_scan_started(filename: &str, fields: usize, bytes: usize) {
    info!(event = "scan.started", filename = %filename, fields, bytes);
}

/// Emit event: a batch of chunks is being sent.
pub fn emit_batch_sent(batch_index: usize, documents: usize, multiscan: bool) {
    info!(event = "scan.batch_sent", batch_index, documents, multiscan);
}

/// Emit event (warn): a field record was too large to scan.
pub fn emit_record_dropped(field_id: &str, size: usize) {
    tracing::warn!(event = "scan.record_dropped", field_id = %field_id, size);
}

/// Emit event: scan finished with totals.
pub fn emit_scan_finished(chunks: usize, total_break_count: u64, policy_breaks: usize) {
    info!(
        event = "scan.finished",
        chunks,
        total_break_count,
        policy_breaks,
    );
}

/// Emit event (error): scan aborted, nothing applied.
pub fn emit_scan_failed(error: &dyn std::fmt::Display) {
    tracing::error!(event = "scan.failed", error = %error);
}
