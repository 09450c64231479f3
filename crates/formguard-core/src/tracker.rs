//! Field tracker: runs a full scan over a page and applies the outcome.
//!
//! Outcome is applied only after the scan succeeded. On any error no field
//! is classified and nothing is redacted.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::collector::{collect_form_data, is_trackable, FormData};
use crate::config::Settings;
use crate::dom::{editable_value, mark_field, Page};
use crate::error::Result;
use crate::metrics::METRICS;
use crate::obs::emit_scan_failed;
use crate::orchestrator::{CombinedScanResult, Scanner};
use crate::protocol::ScanTransport;
use crate::reconcile::{attribute_matches, ValueCache};
use crate::redact::Redactor;

/// Fields classified per slice before yielding back to the runtime.
pub const BORDER_BATCH_SIZE: usize = 100;

/// Summary of one applied scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Fields that were collected and scanned.
    pub scanned: usize,
    pub secret_fields: Vec<String>,
    pub clean_fields: Vec<String>,
    pub redacted_fields: Vec<String>,
    /// Fields left out of every chunk for being too large; never classified.
    pub dropped_fields: Vec<String>,
    /// Fields that could no longer be found on the page when results arrived.
    pub detached_fields: Vec<String>,
    pub unreconciled_matches: usize,
    pub total_break_count: u64,
    pub policies: Vec<String>,
}

/// Tracker behaviour taken from settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerOptions {
    pub continuous_mode: bool,
    pub redactor: Redactor,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            continuous_mode: false,
            redactor: Redactor::default(),
        }
    }
}

impl TrackerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            continuous_mode: settings.continuous_mode,
            redactor: Redactor::from_settings(settings),
        }
    }
}

pub struct FieldTracker<T: ScanTransport> {
    scanner: Scanner<T>,
    options: TrackerOptions,
    scanned_fields: Mutex<HashMap<String, bool>>,
}

impl<T: ScanTransport> FieldTracker<T> {
    pub fn new(scanner: Scanner<T>, options: TrackerOptions) -> Self {
        Self {
            scanner,
            options,
            scanned_fields: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_settings(transport: T, settings: &Settings) -> Self {
        Self::new(
            Scanner::from_settings(transport, settings),
            TrackerOptions::from_settings(settings),
        )
    }

    pub fn scanner(&self) -> &Scanner<T> {
        &self.scanner
    }

    pub fn options(&self) -> &TrackerOptions {
        &self.options
    }

    /// Last classification of every field seen so far (`true` = secret found).
    pub async fn scanned_fields(&self) -> HashMap<String, bool> {
        self.scanned_fields.lock().await.clone()
    }

    /// Collect, scan and apply. Errors are logged and yield `None`.
    pub async fn scan_all_fields<P: Page>(&self, page: &P) -> Option<ScanReport> {
        match self.try_scan_all_fields(page).await {
            Ok(report) => report,
            Err(err) => {
                emit_scan_failed(&err);
                None
            }
        }
    }

    /// Collect, scan and apply. `Ok(None)` when there was nothing to scan.
    pub async fn try_scan_all_fields<P: Page>(&self, page: &P) -> Result<Option<ScanReport>> {
        let Some(form_data) = collect_form_data(page) else {
            debug!("nothing to scan");
            return Ok(None);
        };

        let result = self.scanner.scan(&form_data).await?;
        Ok(Some(self.update_field_borders(page, &result, &form_data).await))
    }

    /// React to a field change: in continuous mode a trackable field triggers
    /// a full scan.
    pub async fn handle_change<P: Page>(&self, page: &P, element: &P::Element) -> Option<ScanReport> {
        if !self.options.continuous_mode || !is_trackable(element) {
            return None;
        }
        self.scan_all_fields(page).await
    }

    /// Classify and redact every collected field from a scan result.
    pub async fn update_field_borders<P: Page>(
        &self,
        page: &P,
        result: &CombinedScanResult,
        form_data: &FormData,
    ) -> ScanReport {
        let mut report = ScanReport {
            scanned: form_data.field_ids.len(),
            total_break_count: result.total_break_count,
            policies: result.policies.clone(),
            ..ScanReport::default()
        };

        let mut value_cache = ValueCache::new();
        for id in &form_data.field_ids {
            if let Some(element) = page.find_by_field_id(id) {
                value_cache.insert(id.clone(), editable_value(&element));
            }
        }

        let attribution = attribute_matches(result, &form_data.span_map, &value_cache, |id| {
            page.find_by_field_id(id).map(|el| editable_value(&el))
        });
        report.unreconciled_matches = attribution.unreconciled;
        info!(
            breaks = result.policy_breaks.len(),
            fields_with_secrets = attribution.by_field.len(),
            unreconciled = attribution.unreconciled,
            "matches attributed"
        );

        let scanned_ids: HashSet<&str> = result.field_ids.iter().map(String::as_str).collect();
        let mut classified: HashMap<String, bool> = HashMap::new();
        for (slice_index, slice) in form_data.field_ids.chunks(BORDER_BATCH_SIZE).enumerate() {
            if slice_index > 0 {
                tokio::task::yield_now().await;
            }

            for id in slice {
                if !scanned_ids.contains(id.as_str()) {
                    report.dropped_fields.push(id.clone());
                    continue;
                }
                let Some(element) = page.find_by_field_id(id) else {
                    warn!(field_id = %id, "field detached before results were applied");
                    report.detached_fields.push(id.clone());
                    continue;
                };

                let has_secret = attribution.has_secret(id);
                mark_field(&element, has_secret);
                classified.insert(id.clone(), has_secret);

                if !has_secret {
                    report.clean_fields.push(id.clone());
                    continue;
                }

                report.secret_fields.push(id.clone());
                if self.options.redactor.apply(&element, attribution.matches_for(id)) > 0 {
                    METRICS.inc_redacted();
                    report.redacted_fields.push(id.clone());
                }
            }
        }

        self.scanned_fields.lock().await.extend(classified);
        info!(
            secret = report.secret_fields.len(),
            clean = report.clean_fields.len(),
            redacted = report.redacted_fields.len(),
            "field updates complete"
        );
        report
    }
}
