//! Global atomic counters for scan observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a scan).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations, no locking.
pub struct Metrics {
    scans_started: AtomicU64,
    chunks_scanned: AtomicU64,
    batches_sent: AtomicU64,
    records_dropped: AtomicU64,
    unreconciled_matches: AtomicU64,
    fields_redacted: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            scans_started: AtomicU64::new(0),
            chunks_scanned: AtomicU64::new(0),
            batches_sent: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
            unreconciled_matches: AtomicU64::new(0),
            fields_redacted: AtomicU64::new(0),
        }
    }

    pub fn inc_scans(&self) {
        self.scans_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "scans_started", "counter incremented");
    }

    pub fn add_chunks(&self, n: u64) {
        self.chunks_scanned.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "chunks_scanned", n, "counter incremented");
    }

    pub fn inc_batches(&self) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "batches_sent", "counter incremented");
    }

    /// A field record was too large for any chunk.
    pub fn inc_records_dropped(&self) {
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "records_dropped", "counter incremented");
    }

    pub fn inc_unreconciled(&self) {
        self.unreconciled_matches.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "unreconciled_matches", "counter incremented");
    }

    pub fn inc_redacted(&self) {
        self.fields_redacted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "fields_redacted", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call this at natural boundaries (end of a scan, CLI exit)
    /// rather than on every increment.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            scans_started = self.scans_started(),
            chunks_scanned = self.chunks_scanned(),
            batches_sent = self.batches_sent(),
            records_dropped = self.records_dropped(),
            unreconciled_matches = self.unreconciled_matches(),
            fields_redacted = self.fields_redacted(),
        );
    }

    pub fn scans_started(&self) -> u64 {
        self.scans_started.load(Ordering::Relaxed)
    }

    pub fn chunks_scanned(&self) -> u64 {
        self.chunks_scanned.load(Ordering::Relaxed)
    }

    pub fn batches_sent(&self) -> u64 {
        self.batches_sent.load(Ordering::Relaxed)
    }

    pub fn records_dropped(&self) -> u64 {
        self.records_dropped.load(Ordering::Relaxed)
    }

    pub fn unreconciled_matches(&self) -> u64 {
        self.unreconciled_matches.load(Ordering::Relaxed)
    }

    pub fn fields_redacted(&self) -> u64 {
        self.fields_redacted.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.scans_started.store(0, Ordering::Relaxed);
        self.chunks_scanned.store(0, Ordering::Relaxed);
        self.batches_sent.store(0, Ordering::Relaxed);
        self.records_dropped.store(0, Ordering::Relaxed);
        self.unreconciled_matches.store(0, Ordering::Relaxed);
        self.fields_redacted.store(0, Ordering::Relaxed);
    }
}
