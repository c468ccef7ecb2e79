// src/session.rs
//! Mock sessions: [`MockSession`] and [`SessionId`].
//!
//! A session is created lazily, the first time a request asks for one with
//! `create = true`, and is then shared by every request of the exchange until
//! it is reset.
use crate::attributes::{AttributeStore, Attributes};
use crate::sync;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use uuid::Uuid;

/// A unique identifier for a session, represented as a UUID.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct SessionInner {
    id: SessionId,
    created: SystemTime,
    attributes: Attributes,
}

/// Handle to a session. Clones share the same attributes.
#[derive(Debug, Clone)]
pub struct MockSession {
    inner: Arc<SessionInner>,
}

impl MockSession {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id: SessionId::new(),
                created: SystemTime::now(),
                attributes: Attributes::new(),
            }),
        }
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn created_at(&self) -> SystemTime {
        self.inner.created
    }

    /// Drops every attribute. The handle stays usable.
    pub fn invalidate(&self) {
        debug!("invalidating session {}", self.inner.id);
        self.inner.attributes.clear_attributes();
    }

    /// Whether both handles point at the same session.
    pub fn ptr_eq(&self, other: &MockSession) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeStore for MockSession {
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

/// Slot holding the lazily created session of an exchange.
pub(crate) type SessionSlot = Arc<Mutex<Option<MockSession>>>;

pub(crate) fn new_slot() -> SessionSlot {
    Arc::new(Mutex::new(None))
}

/// Returns the session in `slot`, creating it when `create` is set.
pub(crate) fn session_in(slot: &SessionSlot, create: bool) -> Option<MockSession> {
    let mut guard = sync::lock(slot);
    if guard.is_none() && create {
        let session = MockSession::new();
        debug!("created session {}", session.id());
        *guard = Some(session);
    }
    guard.clone()
}
