//! Formguard Core Library
//!
//! Collects editable form fields into a scan document, splits it into chunks
//! the scan API accepts, and maps the reported secrets back onto the fields
//! they came from.

pub mod chunker;
pub mod collector;
pub mod config;
pub mod document;
pub mod dom;
pub mod error;
pub mod fakes;
pub mod metrics;
pub mod obs;
pub mod orchestrator;
pub mod protocol;
pub mod reconcile;
pub mod redact;
pub mod snapshot;
pub mod telemetry;
pub mod tracker;

pub use chunker::{chunk_document, chunk_document_with_limit, Chunk, MAX_CHUNK_SIZE};
pub use collector::{collect_form_data, collect_form_data_as, field_identifier, is_trackable, FormData};
pub use config::{
    FileSettingsStore, MemorySettingsStore, ScanCredentials, Settings, SettingsStore,
    DEFAULT_REDACT_TEXT,
};
pub use document::{
    extract_field_ids, render_document, split_records, value_line_count, DocumentRecord,
    FieldRecord, FieldSpan, SpanMap,
};
pub use dom::{
    editable_value, mark_field, set_editable_value, FormElement, Page, FIELD_ID_ATTRIBUTE,
    NO_SECRET_CLASS, SECRET_FOUND_CLASS,
};
pub use error::{Result, ScanError};
pub use orchestrator::{
    combine_scan_results, single_scan_result, CombinedScanResult, ScanLimits, Scanner,
    TaggedPolicyBreak,
};
pub use protocol::{
    DocumentScanResult, Match, PolicyBreak, ScanDocument, ScanPayload, ScanRequest, ScanResponse,
    ScanTransport, MAX_DOCS_PER_SCAN,
};
pub use reconcile::{attribute_matches, resolve_match, resolve_match_cached, Attribution, ValueCache};
pub use redact::{find_occurrences, redact_value, Redactor};
pub use snapshot::{ElementSnapshot, MemoryElement, MemoryPage, PageSnapshot};
pub use tracker::{FieldTracker, ScanReport, TrackerOptions, BORDER_BATCH_SIZE};

pub use metrics::METRICS;
pub use obs::{emit_scan_failed, emit_scan_finished, emit_scan_started};
pub use telemetry::{follow_debug_flag, init_tracing, LogControl};

/// Formguard version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
