//! In-place redaction of detected secrets.

use std::ops::Range;

use tracing::debug;

use crate::config::{Settings, DEFAULT_REDACT_TEXT};
use crate::dom::{editable_value, set_editable_value, FormElement};
use crate::protocol::Match;

/// Byte ranges of every non-overlapping occurrence of `needle` in `value`.
///
/// An empty needle has no occurrences.
pub fn find_occurrences(value: &str, needle: &str) -> Vec<Range<usize>> {
    if needle.is_empty() {
        return Vec::new();
    }
    value
        .match_indices(needle)
        .map(|(start, found)| start..start + found.len())
        .collect()
}

/// Replace every occurrence of every match in `value` with `placeholder`.
///
/// Occurrences are applied from the end of the string backwards so earlier
/// offsets stay valid. An occurrence overlapping one already replaced is
/// skipped. Returns the new value and the number of replacements.
pub fn redact_value(value: &str, matches: &[Match], placeholder: &str) -> (String, usize) {
    let mut positions: Vec<Range<usize>> = matches
        .iter()
        .flat_map(|m| find_occurrences(value, &m.text))
        .collect();
    positions.sort_by(|a, b| b.start.cmp(&a.start).then(b.end.cmp(&a.end)));

    let mut redacted = value.to_string();
    let mut applied = 0usize;
    let mut floor = usize::MAX;

    for range in positions {
        if range.end > floor {
            continue;
        }
        redacted.replace_range(range.clone(), placeholder);
        floor = range.start;
        applied += 1;
    }

    (redacted, applied)
}

/// Redaction policy from settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redactor {
    enabled: bool,
    placeholder: String,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(true, DEFAULT_REDACT_TEXT)
    }
}

impl Redactor {
    pub fn new(enabled: bool, placeholder: &str) -> Self {
        Self {
            enabled,
            placeholder: placeholder.to_string(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.auto_redact, settings.redact_placeholder())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Redact `matches` in the element's editable value.
    ///
    /// The value is read once and written once. Returns the number of
    /// replacements; zero when disabled or there is nothing to replace.
    pub fn apply<E: FormElement + ?Sized>(&self, element: &E, matches: &[Match]) -> usize {
        if !self.enabled || matches.is_empty() {
            debug!(enabled = self.enabled, matches = matches.len(), "skipping redaction");
            return 0;
        }

        let current = editable_value(element);
        let (redacted, applied) = redact_value(&current, matches, &self.placeholder);
        if applied > 0 {
            set_editable_value(element, &redacted);
        }
        debug!(replacements = applied, "redaction applied");
        applied
    }
}
