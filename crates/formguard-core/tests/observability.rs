//! Observability tests for the scan lifecycle.
//!
//! These tests check that the structured events the scanner relies on for
//! diagnostics are actually emitted.

use formguard_core::fakes::ScriptedTransport;
use formguard_core::obs::{emit_batch_sent, emit_record_dropped, scan_span};
use formguard_core::{
    chunk_document_with_limit, emit_scan_failed, emit_scan_finished, emit_scan_started,
    ElementSnapshot, FieldTracker, MemoryPage, ScanError, Settings,
};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_scan_started_logs_filename_and_size() {
    emit_scan_started("form_data_1.yaml", 3, 120);
    assert!(logs_contain("scan.started"));
    assert!(logs_contain("form_data_1.yaml"));
}

#[traced_test]
#[test]
fn test_emit_batch_and_finish() {
    emit_batch_sent(1, 20, true);
    emit_scan_finished(21, 4, 3);
    assert!(logs_contain("scan.batch_sent"));
    assert!(logs_contain("scan.finished"));
}

#[traced_test]
#[test]
fn test_scan_failed_logs_error() {
    emit_scan_failed(&ScanError::MissingCredentials);
    assert!(logs_contain("scan.failed"));
    assert!(logs_contain("ERROR"));
}

#[traced_test]
#[test]
fn test_events_inside_scan_span_carry_scan_id() {
    scan_span("scan-span-test").in_scope(|| emit_record_dropped("input_text_big", 2_000_000));
    assert!(logs_contain("scan-span-test"));
}

#[traced_test]
#[test]
fn test_chunker_warns_about_oversized_record() {
    let document = format!(
        "- field_id: huge\n  value: |\n    {}\n- field_id: small\n  value: |\n    ok\n",
        "x".repeat(300)
    );
    let chunks = chunk_document_with_limit(&document, "form_data_2", 100);
    assert_eq!(chunks.len(), 1);
    assert!(logs_contain("scan.record_dropped"));
    assert!(logs_contain("huge"));
}

#[traced_test]
#[tokio::test]
async fn test_tracker_logs_failed_scan() {
    let mut page = MemoryPage::new();
    page.push(ElementSnapshot::input("text", "user", "alice"));

    let tracker = FieldTracker::from_settings(ScriptedTransport::new(), &Settings::default());
    assert!(tracker.scan_all_fields(&page).await.is_none());
    assert!(logs_contain("scan.failed"));
}

#[traced_test]
#[tokio::test]
async fn test_successful_scan_logs_lifecycle_inside_scan_span() {
    let mut page = MemoryPage::new();
    page.push(ElementSnapshot::input("text", "user", "alice"));

    let tracker = FieldTracker::from_settings(
        ScriptedTransport::new(),
        &Settings::new("https://api.example.com", "key"),
    );
    assert!(tracker.scan_all_fields(&page).await.is_some());
    assert!(logs_contain("scan.started"));
    assert!(logs_contain("scan.finished"));
    assert!(logs_contain("formguard.scan"));
}
