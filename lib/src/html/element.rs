use html5ever::{local_name, LocalName};
use kuchikiki::ElementData;

/// Lower-case tag name of an element.
pub fn tag_name(data: &ElementData) -> String {
    data.name.local.to_string()
}

pub fn get_attr(data: &ElementData, name: impl Into<LocalName>) -> Option<String> {
    data.attributes.borrow().get(name.into()).map(str::to_owned)
}

/// CSS classes of an element, in document order.
pub fn classes(data: &ElementData) -> Vec<String> {
    if let Some(class_attr) = data.attributes.borrow().get(local_name!("class")) {
        class_attr.split_ascii_whitespace().map(str::to_owned).collect()
    } else {
        Vec::new()
    }
}

pub fn has_class(data: &ElementData, class_name: &str) -> bool {
    if let Some(class_attr) = data.attributes.borrow().get(local_name!("class")) {
        class_attr.split_ascii_whitespace().any(|c| c == class_name)
    } else {
        false
    }
}
