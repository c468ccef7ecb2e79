// src/context.rs
//! Application context shared by the requests of an exchange.
//!
//! Tests that run several steps against one context use save points to wipe
//! scratch attributes between steps while keeping fixtures set up front.
use crate::attributes::{AttributeStore, Attributes};
use crate::sync;
use indexmap::IndexMap;
use log::debug;
use serde_json::Value;
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct ContextInner {
    context_path: RwLock<String>,
    attributes: Attributes,
}

/// Handle to a mock application context. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockContext {
    inner: Arc<ContextInner>,
}

/// Attributes of a context captured by [`MockContext::save`].
#[derive(Debug, Clone, PartialEq)]
pub struct SavePoint {
    attributes: IndexMap<String, Value>,
}

impl SavePoint {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }
}

impl MockContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context path, empty for the root context.
    pub fn context_path(&self) -> String {
        sync::read(&self.inner.context_path).clone()
    }

    pub fn set_context_path(&self, path: impl Into<String>) {
        *sync::write(&self.inner.context_path) = path.into();
    }

    pub fn save(&self) -> SavePoint {
        SavePoint {
            attributes: self.inner.attributes.snapshot(),
        }
    }

    /// Rolls the attributes back to `save`.
    ///
    /// Names listed in `keep` are left as they are now. Every other saved name
    /// gets its saved value back and names added since the save are removed.
    pub fn restore(&self, save: &SavePoint, keep: &[&str]) {
        let current = self.inner.attributes.snapshot();
        let mut restored = IndexMap::with_capacity(save.attributes.len());

        for (name, value) in &save.attributes {
            if !keep.contains(&name.as_str()) {
                restored.insert(name.clone(), value.clone());
            }
        }
        for (name, value) in current {
            if keep.contains(&name.as_str()) {
                restored.insert(name, value);
            }
        }

        debug!(
            "restored context to {} saved attributes, kept {:?}",
            save.attributes.len(),
            keep
        );
        self.inner.attributes.replace(restored);
    }

    pub fn ptr_eq(&self, other: &MockContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl AttributeStore for MockContext {
    fn attribute(&self, name: &str) -> Option<Value> {
        self.inner.attributes.attribute(name)
    }

    fn set_attribute(&self, name: &str, value: Value) {
        self.inner.attributes.set_attribute(name, value)
    }

    fn remove_attribute(&self, name: &str) -> Option<Value> {
        self.inner.attributes.remove_attribute(name)
    }

    fn clear_attributes(&self) {
        self.inner.attributes.clear_attributes()
    }

    fn attribute_names(&self) -> Vec<String> {
        self.inner.attributes.attribute_names()
    }

    fn attribute_count(&self) -> usize {
        self.inner.attributes.attribute_count()
    }
}
