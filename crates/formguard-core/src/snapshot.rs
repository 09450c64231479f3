//! In-memory page backed by a serializable snapshot.
//!
//! `MemoryPage` implements [`Page`] without a browser. It loads from and saves
//! to JSON, which is how the CLI feeds pages to the scanner and how tests
//! build fixtures.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::dom::{FormElement, Page};
use crate::error::Result;

/// Serializable state of one element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub tag: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(rename = "readonly", default)]
    pub read_only: bool,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub classes: Vec<String>,
}

impl ElementSnapshot {
    /// `<input type=.. name=..>` with a value.
    pub fn input(input_type: &str, name: &str, value: &str) -> Self {
        Self {
            tag: "input".to_string(),
            input_type: Some(input_type.to_string()),
            name: Some(name.to_string()),
            value: value.to_string(),
            ..Self::default()
        }
    }

    /// `<textarea name=..>` with a value.
    pub fn textarea(name: &str, value: &str) -> Self {
        Self {
            tag: "textarea".to_string(),
            name: Some(name.to_string()),
            value: value.to_string(),
            ..Self::default()
        }
    }

    /// Any tag with `contenteditable="true"` and text content.
    pub fn editable(tag: &str, text: &str) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert("contenteditable".to_string(), "true".to_string());
        Self {
            tag: tag.to_string(),
            text: text.to_string(),
            attributes,
            ..Self::default()
        }
    }

    pub fn with_dom_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// Shared handle onto one element of a [`MemoryPage`].
#[derive(Debug, Clone)]
pub struct MemoryElement {
    state: Arc<Mutex<ElementSnapshot>>,
}

impl MemoryElement {
    pub fn new(snapshot: ElementSnapshot) -> Self {
        Self {
            state: Arc::new(Mutex::new(snapshot)),
        }
    }

    fn state(&self) -> MutexGuard<'_, ElementSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> ElementSnapshot {
        self.state().clone()
    }

    /// Whether two handles point at the same element.
    pub fn same_element(&self, other: &MemoryElement) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.is_empty())
}

impl FormElement for MemoryElement {
    fn tag_name(&self) -> String {
        self.state().tag.clone()
    }

    fn input_type(&self) -> Option<String> {
        let state = self.state();
        match state.tag.to_ascii_lowercase().as_str() {
            "input" => Some(non_empty(&state.input_type).unwrap_or_else(|| "text".to_string())),
            "textarea" => Some("textarea".to_string()),
            _ => non_empty(&state.input_type),
        }
    }

    fn name(&self) -> Option<String> {
        non_empty(&self.state().name)
    }

    fn dom_id(&self) -> Option<String> {
        non_empty(&self.state().id)
    }

    fn placeholder(&self) -> Option<String> {
        non_empty(&self.state().placeholder)
    }

    fn is_disabled(&self) -> bool {
        self.state().disabled
    }

    fn is_read_only(&self) -> bool {
        self.state().read_only
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.state().attributes.get(name).cloned()
    }

    fn set_attribute(&self, name: &str, value: &str) {
        self.state()
            .attributes
            .insert(name.to_string(), value.to_string());
    }

    fn value(&self) -> String {
        self.state().value.clone()
    }

    fn set_value(&self, value: &str) {
        self.state().value = value.to_string();
    }

    fn text_content(&self) -> String {
        self.state().text.clone()
    }

    fn set_text_content(&self, text: &str) {
        self.state().text = text.to_string();
    }

    fn add_class(&self, class: &str) {
        let mut state = self.state();
        if !state.classes.iter().any(|c| c == class) {
            state.classes.push(class.to_string());
        }
    }

    fn remove_class(&self, class: &str) {
        self.state().classes.retain(|c| c != class);
    }

    fn has_class(&self, class: &str) -> bool {
        self.state().classes.iter().any(|c| c == class)
    }
}

/// Serializable page: its elements in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    #[serde(default)]
    pub elements: Vec<ElementSnapshot>,
}

/// A page living in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryPage {
    elements: Vec<MemoryElement>,
}

impl MemoryPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: PageSnapshot) -> Self {
        Self {
            elements: snapshot.elements.into_iter().map(MemoryElement::new).collect(),
        }
    }

    /// Append an element and return a handle to it.
    pub fn push(&mut self, element: ElementSnapshot) -> MemoryElement {
        let handle = MemoryElement::new(element);
        self.elements.push(handle.clone());
        handle
    }

    /// Detach an element, as if it were removed from the page.
    pub fn remove(&mut self, element: &MemoryElement) {
        self.elements.retain(|e| !e.same_element(element));
    }

    pub fn elements(&self) -> &[MemoryElement] {
        &self.elements
    }

    pub fn snapshot(&self) -> PageSnapshot {
        PageSnapshot {
            elements: self.elements.iter().map(MemoryElement::snapshot).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: PageSnapshot = serde_json::from_str(&content)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Page for MemoryPage {
    type Element = MemoryElement;

    fn candidate_elements(&self) -> Vec<MemoryElement> {
        self.elements.clone()
    }

    fn find_by_attribute(&self, name: &str, value: &str) -> Option<MemoryElement> {
        self.elements
            .iter()
            .rev()
            .find(|e| e.attribute(name).as_deref() == Some(value))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::FIELD_ID_ATTRIBUTE;
    use tempfile::tempdir;

    #[test]
    fn test_input_type_defaults() {
        let mut bare = ElementSnapshot::input("", "q", "");
        bare.input_type = None;
        assert_eq!(MemoryElement::new(bare).input_type().as_deref(), Some("text"));

        let area = MemoryElement::new(ElementSnapshot::textarea("notes", ""));
        assert_eq!(area.input_type().as_deref(), Some("textarea"));

        let div = MemoryElement::new(ElementSnapshot::editable("div", ""));
        assert_eq!(div.input_type(), None);
    }

    #[test]
    fn test_find_by_field_id() {
        let mut page = MemoryPage::new();
        page.push(ElementSnapshot::input("text", "a", "1"));
        let b = page.push(ElementSnapshot::input("text", "b", "2"));
        b.set_attribute(FIELD_ID_ATTRIBUTE, "input_text_b");

        let found = page.find_by_field_id("input_text_b").unwrap();
        assert!(found.same_element(&b));
        assert!(page.find_by_field_id("missing").is_none());

        page.remove(&b);
        assert!(page.find_by_field_id("input_text_b").is_none());
    }

    #[test]
    fn test_find_by_field_id_prefers_later_duplicate() {
        let mut page = MemoryPage::new();
        let first = page.push(ElementSnapshot::input("text", "q", "1"));
        let second = page.push(ElementSnapshot::input("text", "q", "2"));
        first.set_attribute(FIELD_ID_ATTRIBUTE, "input_text_q");
        second.set_attribute(FIELD_ID_ATTRIBUTE, "input_text_q");

        assert!(page.find_by_field_id("input_text_q").unwrap().same_element(&second));

        page.remove(&second);
        assert!(page.find_by_field_id("input_text_q").unwrap().same_element(&first));
    }

    #[test]
    fn test_snapshot_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("page.json");

        let mut page = MemoryPage::new();
        page.push(ElementSnapshot::textarea("notes", "hello").with_dom_id("n1"));
        page.save(&path).unwrap();

        let loaded = MemoryPage::load(&path).unwrap();
        assert_eq!(loaded.snapshot(), page.snapshot());
    }

    #[test]
    fn test_snapshot_json_field_names() {
        let json = r#"{"elements":[{"tag":"input","type":"password","name":"pw","readonly":true,"value":"x"}]}"#;
        let snapshot: PageSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.elements[0].input_type.as_deref(), Some("password"));
        assert!(snapshot.elements[0].read_only);
    }
}
