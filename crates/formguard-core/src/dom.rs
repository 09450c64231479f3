//! Element seam between the scanning pipeline and a page.
//!
//! Setters take `&self`: elements are handles onto a shared page, the same
//! way DOM nodes are.

/// Attribute persisted on every collected element so it can be found again by id.
pub const FIELD_ID_ATTRIBUTE: &str = "data-formguard-id";

/// Class applied to fields with at least one attributed secret.
pub const SECRET_FOUND_CLASS: &str = "formguard-secret-found";

/// Class applied to scanned fields without secrets.
pub const NO_SECRET_CLASS: &str = "formguard-no-secret";

/// A form-like element on a page.
pub trait FormElement {
    /// Tag name, in any case.
    fn tag_name(&self) -> String;

    /// The `type` property (`"text"` for an input without a type attribute,
    /// `"textarea"` for text areas, `None` for elements without one).
    fn input_type(&self) -> Option<String>;

    fn name(&self) -> Option<String>;

    /// The element's DOM `id`.
    fn dom_id(&self) -> Option<String>;

    fn placeholder(&self) -> Option<String>;

    fn is_disabled(&self) -> bool;

    fn is_read_only(&self) -> bool;

    fn attribute(&self, name: &str) -> Option<String>;

    fn set_attribute(&self, name: &str, value: &str);

    /// The `value` property.
    fn value(&self) -> String;

    fn set_value(&self, value: &str);

    fn text_content(&self) -> String;

    fn set_text_content(&self, text: &str);

    fn add_class(&self, class: &str);

    fn remove_class(&self, class: &str);

    fn has_class(&self, class: &str) -> bool;

    /// `contenteditable="true"`.
    fn is_content_editable(&self) -> bool {
        self.attribute("contenteditable").as_deref() == Some("true")
    }
}

/// A page holding form elements.
pub trait Page {
    type Element: FormElement;

    /// Every element that could be a form field, in document order.
    fn candidate_elements(&self) -> Vec<Self::Element>;

    /// Last element, in document order, whose attribute `name` equals `value`.
    fn find_by_attribute(&self, name: &str, value: &str) -> Option<Self::Element>;

    /// Re-locate a collected field through [`FIELD_ID_ATTRIBUTE`].
    ///
    /// Colliding ids resolve to the later element, the one whose span the
    /// collector kept.
    fn find_by_field_id(&self, field_id: &str) -> Option<Self::Element> {
        self.find_by_attribute(FIELD_ID_ATTRIBUTE, field_id)
    }
}

/// Current editable text of an element: text content for content-editable
/// elements, the value property otherwise.
pub fn editable_value<E: FormElement + ?Sized>(element: &E) -> String {
    if element.is_content_editable() {
        element.text_content()
    } else {
        element.value()
    }
}

/// Write through the same path [`editable_value`] reads from.
pub fn set_editable_value<E: FormElement + ?Sized>(element: &E, value: &str) {
    if element.is_content_editable() {
        element.set_text_content(value);
    } else {
        element.set_value(value);
    }
}

/// Mark a field as containing (or not containing) a secret.
pub fn mark_field<E: FormElement + ?Sized>(element: &E, has_secret: bool) {
    if has_secret {
        element.add_class(SECRET_FOUND_CLASS);
        element.remove_class(NO_SECRET_CLASS);
    } else {
        element.add_class(NO_SECRET_CLASS);
        element.remove_class(SECRET_FOUND_CLASS);
    }
}
