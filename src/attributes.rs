// src/attributes.rs
//! Named attribute storage shared by requests, sessions and contexts.
use crate::sync;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::RwLock;

/// Object-safe key/value attribute area.
pub trait AttributeStore: Send + Sync {
    /// Retrieves the value stored under `name`, or `None` if not found.
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Sets `name` to `value`, overwriting any existing value.
    fn set_attribute(&self, name: &str, value: Value);

    /// Removes `name` and returns its value.
    fn remove_attribute(&self, name: &str) -> Option<Value>;

    /// Removes every attribute.
    fn clear_attributes(&self);

    /// Returns all attribute names, in the order they were first set.
    fn attribute_names(&self) -> Vec<String>;

    /// Returns the number of attributes.
    fn attribute_count(&self) -> usize {
        self.attribute_names().len()
    }
}

/// In-memory attribute area.
#[derive(Debug, Default)]
pub struct Attributes {
    map: RwLock<IndexMap<String, Value>>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every attribute.
    pub fn snapshot(&self) -> IndexMap<String, Value> {
        sync::read(&self.map).clone()
    }

    /// Replaces every attribute with `values`.
    pub fn replace(&self, values: IndexMap<String, Value>) {
        *sync::write(&self.map) = values;
    }
}

impl Clone for Attributes {
    fn clone(&self) -> Self {
        Self {
            map: RwLock::new(self.snapshot()),
        }
    }
}

impl AttributeStore for Attributes {
    fn attribute(&self, name: &str) -> Option<Value> {
        sync::read(&self.map).get(name).cloned()
    }

    fn set_attribute(&self, name: &str, value: Value) {
        sync::write(&self.map).insert(name.to_string(), value);
    }

    fn remove_attribute(&self, name: &str) -> Option<Value> {
        sync::write(&self.map).shift_remove(name)
    }

    fn clear_attributes(&self) {
        sync::write(&self.map).clear();
    }

    fn attribute_names(&self) -> Vec<String> {
        sync::read(&self.map).keys().cloned().collect()
    }

    fn attribute_count(&self) -> usize {
        sync::read(&self.map).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn attribute_store_basic_contract() {
        let area: Arc<dyn AttributeStore> = Arc::new(Attributes::new());

        // starts empty
        assert_eq!(area.attribute_count(), 0);
        assert!(area.attribute("missing").is_none());

        // set + get
        area.set_attribute("a", json!(1));
        area.set_attribute("b", json!({"nested": true}));
        assert_eq!(area.attribute_count(), 2);
        assert_eq!(area.attribute("a"), Some(json!(1)));
        assert_eq!(area.attribute("b"), Some(json!({"nested": true})));

        // overwrite keeps count and position
        area.set_attribute("a", json!("one"));
        assert_eq!(area.attribute_names(), vec!["a", "b"]);

        // remove
        assert_eq!(area.remove_attribute("b"), Some(json!({"nested": true})));
        assert_eq!(area.attribute_count(), 1);

        // clear
        area.clear_attributes();
        assert_eq!(area.attribute_count(), 0);
    }

    #[test]
    fn snapshot_and_replace() {
        let attrs = Attributes::new();
        attrs.set_attribute("x", json!(1));
        let saved = attrs.snapshot();

        attrs.set_attribute("y", json!(2));
        attrs.replace(saved);
        assert_eq!(attrs.attribute_names(), vec!["x"]);
    }
}
