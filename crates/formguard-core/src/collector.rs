//! Collects trackable form fields into one serialized document.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{FieldRecord, FieldSpan, SpanMap, DOCUMENT_EXTENSION, RECORD_OVERHEAD_LINES};
use crate::dom::{editable_value, FormElement, Page, FIELD_ID_ATTRIBUTE};

/// Input types whose values are scanned.
pub const TRACKABLE_INPUT_TYPES: &[&str] = &[
    "text",
    "email",
    "password",
    "search",
    "tel",
    "url",
    "number",
    "date",
    "datetime-local",
    "month",
    "time",
    "week",
];

/// Prefix of generated document filenames.
pub const FORM_DATA_PREFIX: &str = "form_data";

/// Output of a collection pass.
///
/// Elements are not held here: callers re-resolve them through
/// [`Page::find_by_field_id`] when they need to touch the page again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormData {
    pub document: String,
    pub filename: String,
    /// Collected field ids, unique, in first-seen order.
    pub field_ids: Vec<String>,
    /// Every appended record, duplicates included, in document order.
    pub records: Vec<FieldRecord>,
    pub span_map: SpanMap,
}

impl FormData {
    /// Filename without its extension, used to name chunks.
    pub fn base_name(&self) -> &str {
        self.filename
            .strip_suffix(&format!(".{DOCUMENT_EXTENSION}"))
            .unwrap_or(&self.filename)
    }
}

/// Whether `element` is a field we scan.
pub fn is_trackable<E: FormElement + ?Sized>(element: &E) -> bool {
    if element.is_disabled() || element.is_read_only() {
        return false;
    }

    match element.tag_name().to_ascii_lowercase().as_str() {
        "textarea" => return true,
        "input" => {
            let input_type = element
                .input_type()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "text".to_string())
                .to_ascii_lowercase();
            return TRACKABLE_INPUT_TYPES.contains(&input_type.as_str());
        }
        _ => {}
    }

    element.is_content_editable()
}

fn unsafe_id_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_-]").expect("static regex"))
}

/// Deterministic identifier: `{tag}{_type}_{name}` where `name` falls back from
/// the element name to its DOM id, its placeholder, then `field_{index}`.
pub fn field_identifier<E: FormElement + ?Sized>(element: &E, index: usize) -> String {
    let name = element
        .name()
        .or_else(|| element.dom_id())
        .or_else(|| element.placeholder())
        .unwrap_or_else(|| format!("field_{index}"));
    let tag = element.tag_name().to_ascii_lowercase();
    let type_part = element
        .input_type()
        .filter(|t| !t.is_empty())
        .map(|t| format!("_{t}"))
        .unwrap_or_default();

    unsafe_id_chars()
        .replace_all(&format!("{tag}{type_part}_{name}"), "_")
        .into_owned()
}

/// Collect every trackable, non-blank field of `page`.
///
/// Each collected element gets [`FIELD_ID_ATTRIBUTE`] set to its id. Returns
/// `None` when there is nothing to scan.
pub fn collect_form_data<P: Page>(page: &P) -> Option<FormData> {
    let filename = format!(
        "{FORM_DATA_PREFIX}_{}.{DOCUMENT_EXTENSION}",
        chrono::Utc::now().timestamp_millis()
    );
    collect_form_data_as(page, filename)
}

/// [`collect_form_data`] with an explicit document filename.
pub fn collect_form_data_as<P: Page>(page: &P, filename: String) -> Option<FormData> {
    let mut records: Vec<FieldRecord> = Vec::new();
    let mut field_ids: Vec<String> = Vec::new();
    let mut span_map = SpanMap::new();
    let mut line_count = 0usize;

    for (index, element) in page.candidate_elements().iter().enumerate() {
        if !is_trackable(element) {
            continue;
        }

        let value = editable_value(element);
        if value.trim().is_empty() {
            continue;
        }

        let id = field_identifier(element, index);
        element.set_attribute(FIELD_ID_ATTRIBUTE, &id);

        let record = FieldRecord::new(id.clone(), value);
        let value_lines = record.value_lines();
        span_map.insert(id.clone(), FieldSpan::after(line_count, value_lines));
        line_count += value_lines + RECORD_OVERHEAD_LINES;

        if !field_ids.contains(&id) {
            field_ids.push(id);
        }
        records.push(record);
    }

    if records.is_empty() {
        debug!("no non-empty trackable fields");
        return None;
    }

    let document: String = records.iter().map(FieldRecord::render).collect();
    debug!(fields = records.len(), lines = line_count, "collected form data");

    Some(FormData {
        document,
        filename,
        field_ids,
        records,
        span_map,
    })
}
