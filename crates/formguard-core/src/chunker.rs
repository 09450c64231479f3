//! Splits serialized documents into chunks that fit the scan API payload limit.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::document::{extract_field_ids, split_records, DocumentRecord, DOCUMENT_EXTENSION};
use crate::metrics::METRICS;
use crate::obs::emit_record_dropped;

/// Maximum UTF-8 size of one scanned document (1 MiB).
pub const MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// A size-bounded sub-document plus the ids of the fields it contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub document: String,
    pub filename: String,
    pub field_ids: Vec<String>,
}

impl Chunk {
    pub fn byte_size(&self) -> usize {
        self.document.len()
    }

    fn from_records(records: &[DocumentRecord], base_name: &str, index: usize) -> Self {
        Chunk {
            document: records.iter().map(|r| r.text.as_str()).collect(),
            filename: format!("{base_name}_chunk_{index}.{DOCUMENT_EXTENSION}"),
            field_ids: records.iter().map(|r| r.field_id.clone()).collect(),
        }
    }
}

/// Chunk `document` against [`MAX_CHUNK_SIZE`].
pub fn chunk_document(document: &str, base_name: &str) -> Vec<Chunk> {
    chunk_document_with_limit(document, base_name, MAX_CHUNK_SIZE)
}

/// Chunk `document` so that no chunk exceeds `max_bytes`.
///
/// A document within budget (including the empty document) comes back as a
/// single chunk named `{base_name}.yaml`. Otherwise records are packed
/// greedily, in order, into `{base_name}_chunk_{i}.yaml`. A record larger than
/// `max_bytes` on its own is dropped with a warning.
pub fn chunk_document_with_limit(document: &str, base_name: &str, max_bytes: usize) -> Vec<Chunk> {
    if document.len() <= max_bytes {
        return vec![Chunk {
            document: document.to_string(),
            filename: format!("{base_name}.{DOCUMENT_EXTENSION}"),
            field_ids: extract_field_ids(document),
        }];
    }

    let records = split_records(document);
    let mut chunks = Vec::new();
    let mut current: Vec<DocumentRecord> = Vec::new();
    let mut current_size = 0usize;

    for record in records {
        let size = record.byte_size();

        if size > max_bytes {
            warn!(
                field_id = %record.field_id,
                size,
                max_bytes,
                "field exceeds maximum chunk size, skipping"
            );
            emit_record_dropped(&record.field_id, size);
            METRICS.inc_records_dropped();
            continue;
        }

        if current_size + size > max_bytes && !current.is_empty() {
            chunks.push(Chunk::from_records(&current, base_name, chunks.len()));
            current.clear();
            current_size = 0;
        }

        current_size += size;
        current.push(record);
    }

    if !current.is_empty() {
        chunks.push(Chunk::from_records(&current, base_name, chunks.len()));
    }

    debug!(chunks = chunks.len(), bytes = document.len(), "document chunked");
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{render_document, FieldRecord};

    fn doc_of(values: &[(&str, String)]) -> String {
        let records: Vec<FieldRecord> = values
            .iter()
            .map(|(id, v)| FieldRecord::new(*id, v.clone()))
            .collect();
        render_document(&records)
    }

    #[test]
    fn test_small_document_is_single_chunk() {
        let doc = doc_of(&[("a", "x".into()), ("b", "y".into())]);
        let chunks = chunk_document(&doc, "form_data");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].filename, "form_data.yaml");
        assert_eq!(chunks[0].document, doc);
        assert_eq!(chunks[0].field_ids, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_document_is_one_empty_chunk() {
        let chunks = chunk_document("", "form_data");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].document.is_empty());
        assert!(chunks[0].field_ids.is_empty());
    }

    #[test]
    fn test_large_document_packs_greedily() {
        let doc = doc_of(&[
            ("a", "1".repeat(40)),
            ("b", "2".repeat(40)),
            ("c", "3".repeat(40)),
        ]);
        // each record is 14 + 11 + 45 = 70 bytes
        let chunks = chunk_document_with_limit(&doc, "form_data", 150);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].field_ids, vec!["a", "b"]);
        assert_eq!(chunks[1].field_ids, vec!["c"]);
        assert_eq!(chunks[0].filename, "form_data_chunk_0.yaml");
        assert_eq!(chunks[1].filename, "form_data_chunk_1.yaml");
        assert!(chunks.iter().all(|c| c.byte_size() <= 150));

        let joined: String = chunks.iter().map(|c| c.document.as_str()).collect();
        assert_eq!(joined, doc);
    }

    #[test]
    fn test_oversized_record_is_dropped() {
        let doc = doc_of(&[
            ("small", "s".into()),
            ("huge", "h".repeat(500)),
            ("tail", "t".into()),
        ]);
        let chunks = chunk_document_with_limit(&doc, "form_data", 100);

        let ids: Vec<&str> = chunks
            .iter()
            .flat_map(|c| c.field_ids.iter().map(String::as_str))
            .collect();
        assert_eq!(ids, vec!["small", "tail"]);
        assert!(chunks.iter().all(|c| !c.document.contains("hhhh")));
    }

    #[test]
    fn test_budget_counts_utf8_bytes() {
        // 30 chars, 90 bytes of value
        let doc = doc_of(&[("a", "€".repeat(30)), ("b", "€".repeat(30))]);
        assert!(doc.chars().count() < 150);
        assert!(doc.len() > 150);

        let chunks = chunk_document_with_limit(&doc, "form_data", 150);
        assert_eq!(chunks.len(), 2);
    }
}
