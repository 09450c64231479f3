//! Attribution of reported matches to the fields they came from.
//!
//! Two modes, picked per policy break:
//!
//! - chunked: the break carries its chunk's field ids. Line numbers are
//!   relative to the chunk, so they are ignored and the match text is searched
//!   in the candidate fields' values instead.
//! - un-chunked: the match's line range is looked up in the [`SpanMap`] of the
//!   single scanned document.
//!
//! Nothing here touches the page; current values come in through a cache or
//! a lookup closure.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::document::SpanMap;
use crate::metrics::METRICS;
use crate::orchestrator::CombinedScanResult;
use crate::protocol::Match;

/// Current field values keyed by field id.
pub type ValueCache = HashMap<String, String>;

/// Resolve `m` to the id of the field it belongs to.
///
/// `live_lookup` is consulted for candidates missing from `value_cache`.
pub fn resolve_match<F>(
    m: &Match,
    span_map: Option<&SpanMap>,
    chunk_field_ids: Option<&[String]>,
    value_cache: Option<&ValueCache>,
    live_lookup: F,
) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(candidates) = chunk_field_ids.filter(|ids| !ids.is_empty()) {
        return candidates
            .iter()
            .find(|id| {
                let value = value_cache
                    .and_then(|cache| cache.get(id.as_str()).cloned())
                    .or_else(|| live_lookup(id.as_str()));
                value.is_some_and(|v| !v.is_empty() && v.contains(&m.text))
            })
            .cloned();
    }

    let (line_start, line_end) = match (m.line_start, m.line_end) {
        (Some(start), Some(end)) if start > 0 => (start, end),
        _ => {
            debug!(line_start = ?m.line_start, line_end = ?m.line_end, "match has no usable line range");
            return None;
        }
    };

    let found = span_map?
        .iter()
        .find(|(_, span)| span.contains_value_range(line_start, line_end))
        .map(|(id, _)| id.to_string());

    if found.is_none() {
        debug!(line_start, line_end, "no field span contains match");
    }
    found
}

/// [`resolve_match`] without a live lookup.
pub fn resolve_match_cached(
    m: &Match,
    span_map: Option<&SpanMap>,
    chunk_field_ids: Option<&[String]>,
    value_cache: Option<&ValueCache>,
) -> Option<String> {
    resolve_match(m, span_map, chunk_field_ids, value_cache, |_| None)
}

/// Matches grouped by the field they were attributed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Attribution {
    pub by_field: BTreeMap<String, Vec<Match>>,
    /// Matches no field could be found for.
    pub unreconciled: usize,
}

impl Attribution {
    pub fn has_secret(&self, field_id: &str) -> bool {
        self.by_field.contains_key(field_id)
    }

    pub fn matches_for(&self, field_id: &str) -> &[Match] {
        self.by_field
            .get(field_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Attribute every match of every policy break in `result`.
///
/// Unattributable matches are counted and otherwise dropped.
pub fn attribute_matches<F>(
    result: &CombinedScanResult,
    span_map: &SpanMap,
    value_cache: &ValueCache,
    live_lookup: F,
) -> Attribution
where
    F: Fn(&str) -> Option<String>,
{
    let mut attribution = Attribution::default();

    for tagged in &result.policy_breaks {
        let chunk_ids = tagged.chunk_field_ids.as_deref();
        for m in &tagged.policy_break.matches {
            match resolve_match(m, Some(span_map), chunk_ids, Some(value_cache), &live_lookup) {
                Some(field_id) => {
                    debug!(field_id = %field_id, policy = %tagged.policy_break.break_type, "match attributed");
                    attribution.by_field.entry(field_id).or_default().push(m.clone());
                }
                None => {
                    debug!(policy = %tagged.policy_break.break_type, "match not attributable to any field");
                    METRICS.inc_unreconciled();
                    attribution.unreconciled += 1;
                }
            }
        }
    }

    attribution
}
