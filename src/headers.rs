//! Header store shared by mock requests and responses.
//!
//! Names keep the case they were first added with and are looked up
//! case-insensitively. Every operation takes `&self`; the map sits behind an
//! `RwLock` so several threads driving one request never observe a torn update.

use crate::errors::{MockError, Result};
use crate::sync;
use http::{HeaderMap, HeaderName, HeaderValue};
use indexmap::IndexMap;
use log::debug;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct HeaderStore {
    entries: RwLock<IndexMap<String, Vec<String>>>,
}

fn position(map: &IndexMap<String, Vec<String>>, name: &str) -> Option<usize> {
    map.keys().position(|k| k.eq_ignore_ascii_case(name))
}

impl HeaderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` to the values of `name`.
    pub fn add(&self, name: &str, value: impl Into<String>) {
        let mut map = sync::write(&self.entries);
        match position(&map, name) {
            Some(idx) => {
                if let Some((_, values)) = map.get_index_mut(idx) {
                    values.push(value.into());
                }
            }
            None => {
                map.insert(name.to_string(), vec![value.into()]);
            }
        }
    }

    /// Replaces all values of `name` with `value`.
    pub fn set(&self, name: &str, value: impl Into<String>) {
        let mut map = sync::write(&self.entries);
        match position(&map, name) {
            Some(idx) => {
                if let Some((_, values)) = map.get_index_mut(idx) {
                    *values = vec![value.into()];
                }
            }
            None => {
                map.insert(name.to_string(), vec![value.into()]);
            }
        }
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<String> {
        let map = sync::read(&self.entries);
        let idx = position(&map, name)?;
        map.get_index(idx)?.1.first().cloned()
    }

    /// All values of `name`, empty when absent.
    pub fn get_all(&self, name: &str) -> Vec<String> {
        let map = sync::read(&self.entries);
        position(&map, name)
            .and_then(|idx| map.get_index(idx))
            .map(|(_, values)| values.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        position(&sync::read(&self.entries), name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        sync::read(&self.entries).keys().cloned().collect()
    }

    pub fn remove(&self, name: &str) -> Option<Vec<String>> {
        let mut map = sync::write(&self.entries);
        let idx = position(&map, name)?;
        map.shift_remove_index(idx).map(|(_, values)| values)
    }

    pub fn clear(&self) {
        sync::write(&self.entries).clear();
    }

    /// First value of `name` parsed as an integer.
    pub fn int(&self, name: &str) -> Option<i64> {
        let value = self.get(name)?;
        match value.trim().parse() {
            Ok(n) => Some(n),
            Err(_) => {
                debug!("header {name} value {value:?} is not an integer");
                None
            }
        }
    }

    /// Consistent copy of every header, in insertion order.
    pub fn snapshot(&self) -> Vec<(String, Vec<String>)> {
        sync::read(&self.entries)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Exports the headers as an [`http::HeaderMap`].
    pub fn to_header_map(&self) -> Result<HeaderMap> {
        let mut out = HeaderMap::new();
        for (name, values) in self.snapshot() {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| MockError::InvalidHeader(name.clone()))?;
            for value in values {
                let header_value = HeaderValue::from_str(&value)
                    .map_err(|_| MockError::InvalidHeader(format!("{name}: {value}")))?;
                out.append(header_name.clone(), header_value);
            }
        }
        Ok(out)
    }
}

impl Clone for HeaderStore {
    fn clone(&self) -> Self {
        Self {
            entries: RwLock::new(sync::read(&self.entries).clone()),
        }
    }
}
