//! Serialized document format shared by the collector and the chunker.
//!
//! Each field becomes one YAML-like record:
//!
//! ```text
//! - field_id: input_text_username
//!   value: |
//!     first line of the value
//!     second line of the value
//! ```
//!
//! Value lines are always indented, so a line starting with
//! [`FIELD_MARKER`] can only be the start of a record. That is what makes the
//! document splittable back into records without a real YAML parser.

use serde::{Deserialize, Serialize};

/// Prefix of the first line of every record.
pub const FIELD_MARKER: &str = "- field_id: ";

/// Second line of every record, opening the value block.
pub const VALUE_MARKER: &str = "  value: |";

/// Indent applied to every value line.
pub const VALUE_INDENT: &str = "    ";

/// Extension used for document and chunk filenames.
pub const DOCUMENT_EXTENSION: &str = "yaml";

/// Lines a record adds on top of its value lines (marker + value-block line).
pub const RECORD_OVERHEAD_LINES: usize = 2;

/// One collected field: its identifier and the raw value read from the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub id: String,
    pub raw_value: String,
}

impl FieldRecord {
    pub fn new(id: impl Into<String>, raw_value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            raw_value: raw_value.into(),
        }
    }

    /// Number of value lines this record occupies (`split('\n')` semantics).
    pub fn value_lines(&self) -> usize {
        value_line_count(&self.raw_value)
    }

    /// Render this record in the serialized document format.
    pub fn render(&self) -> String {
        render_record(&self.id, &self.raw_value)
    }
}

/// Number of lines `value` spans once split on `\n`. An empty value is one line.
pub fn value_line_count(value: &str) -> usize {
    value.split('\n').count()
}

/// Render one record: marker line, value-block line, then each value line indented.
pub fn render_record(id: &str, value: &str) -> String {
    let mut out = String::with_capacity(
        FIELD_MARKER.len() + id.len() + VALUE_MARKER.len() + value.len() + 16,
    );
    out.push_str(FIELD_MARKER);
    out.push_str(id);
    out.push('\n');
    out.push_str(VALUE_MARKER);
    out.push('\n');
    for line in value.split('\n') {
        out.push_str(VALUE_INDENT);
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Render a whole document from records, in order.
pub fn render_document<'a, I>(records: I) -> String
where
    I: IntoIterator<Item = &'a FieldRecord>,
{
    records.into_iter().map(FieldRecord::render).collect()
}

/// A record as found in a serialized document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub field_id: String,
    /// Exact text of the record, including its trailing newline when present.
    pub text: String,
}

impl DocumentRecord {
    /// UTF-8 size of the record text.
    pub fn byte_size(&self) -> usize {
        self.text.len()
    }

    /// Recover the raw field value from the indented value block.
    pub fn value(&self) -> String {
        let body = self.text.strip_suffix('\n').unwrap_or(&self.text);
        body.split('\n')
            .skip(RECORD_OVERHEAD_LINES)
            .map(|line| line.strip_prefix(VALUE_INDENT).unwrap_or(line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn marker_id(line: &str) -> Option<&str> {
    line.strip_prefix(FIELD_MARKER).map(str::trim)
}

/// Split a document into its records.
///
/// A record starts at a marker line and runs until the next marker line or
/// the end of the document. Text before the first marker belongs to no
/// record and is ignored. Concatenating the `text` of every record gives back
/// the document from its first marker on.
pub fn split_records(document: &str) -> Vec<DocumentRecord> {
    let mut records = Vec::new();
    let mut current: Option<DocumentRecord> = None;

    for line in document.split_inclusive('\n') {
        if let Some(id) = marker_id(line) {
            if let Some(done) = current.take() {
                records.push(done);
            }
            current = Some(DocumentRecord {
                field_id: id.to_string(),
                text: line.to_string(),
            });
        } else if let Some(record) = current.as_mut() {
            record.text.push_str(line);
        }
    }

    if let Some(done) = current {
        records.push(done);
    }
    records
}

/// Field ids of every record in the document, in document order.
pub fn extract_field_ids(document: &str) -> Vec<String> {
    document
        .split('\n')
        .filter_map(marker_id)
        .map(str::to_string)
        .collect()
}

/// Line range a field occupies in the un-chunked document (1-based, inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpan {
    /// Line of the `- field_id:` marker.
    pub start_line: usize,
    /// Last value line.
    pub end_line: usize,
    /// First value line.
    pub value_start_line: usize,
}

impl FieldSpan {
    /// Span of a field appended after `preceding_lines` lines of document.
    pub fn after(preceding_lines: usize, value_lines: usize) -> Self {
        let start_line = preceding_lines + 1;
        Self {
            start_line,
            end_line: start_line + value_lines + 1,
            value_start_line: start_line + RECORD_OVERHEAD_LINES,
        }
    }

    /// Whether `[line_start, line_end]` lies within the value lines of this field.
    pub fn contains_value_range(&self, line_start: usize, line_end: usize) -> bool {
        line_start >= self.value_start_line && line_end <= self.end_line
    }
}

/// Ordered `field id -> FieldSpan` map, valid only for the un-chunked document.
///
/// Inserting an id that is already present replaces its span in place and
/// keeps the original position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanMap {
    entries: Vec<(String, FieldSpan)>,
}

impl SpanMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, span: FieldSpan) {
        let id = id.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == id) {
            Some(entry) => entry.1 = span,
            None => self.entries.push((id, span)),
        }
    }

    pub fn get(&self, id: &str) -> Option<&FieldSpan> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, span)| span)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSpan)> {
        self.entries.iter().map(|(id, span)| (id.as_str(), span))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_record_layout() {
        let text = render_record("input_text_user", "line1\nline2");
        assert_eq!(
            text,
            "- field_id: input_text_user\n  value: |\n    line1\n    line2\n"
        );
    }

    #[test]
    fn test_split_records_reconstructs_document() {
        let records = vec![
            FieldRecord::new("a", "hello"),
            FieldRecord::new("b", "multi\nline\n"),
            FieldRecord::new("c", "- field_id: fake"),
        ];
        let doc = render_document(&records);
        let split = split_records(&doc);

        assert_eq!(split.len(), 3);
        let joined: String = split.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(joined, doc);

        for (original, parsed) in records.iter().zip(&split) {
            assert_eq!(parsed.field_id, original.id);
            assert_eq!(parsed.value(), original.raw_value);
        }
    }

    #[test]
    fn test_split_records_ignores_preamble() {
        let doc = format!("garbage\n{}", render_record("x", "v"));
        let split = split_records(&doc);
        assert_eq!(split.len(), 1);
        assert_eq!(split[0].field_id, "x");
    }

    #[test]
    fn test_extract_field_ids_in_order() {
        let doc = render_document(&[FieldRecord::new("one", "1"), FieldRecord::new("two", "2")]);
        assert_eq!(extract_field_ids(&doc), vec!["one", "two"]);
        assert!(extract_field_ids("").is_empty());
    }

    #[test]
    fn test_field_span_after() {
        let first = FieldSpan::after(0, 1);
        assert_eq!(first.start_line, 1);
        assert_eq!(first.value_start_line, 3);
        assert_eq!(first.end_line, 3);

        // first record took 1 + 2 lines
        let second = FieldSpan::after(3, 2);
        assert_eq!(second.start_line, 4);
        assert_eq!(second.value_start_line, 6);
        assert_eq!(second.end_line, 7);
    }

    #[test]
    fn test_span_map_overwrites_in_place() {
        let mut map = SpanMap::new();
        map.insert("a", FieldSpan::after(0, 1));
        map.insert("b", FieldSpan::after(3, 1));
        map.insert("a", FieldSpan::after(6, 1));

        let ids: Vec<&str> = map.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(map.get("a").map(|s| s.start_line), Some(7));
    }
}
