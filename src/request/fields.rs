//! Scalar form fields and file attachments of a request.
//!
//! The two live in separate ordered maps. Fields keep every value in the order
//! it was added; attachments hold at most one file per name. Nothing orders a
//! field relative to an attachment, the multipart synthesizer always writes
//! fields first.

use crate::errors::{MockError, Result};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Ordered multimap of form field name to values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldStore {
    fields: IndexMap<String, Vec<String>>,
}

impl FieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` after any existing values of `name`.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.entry(name.into()).or_default().push(value.into());
    }

    /// Replaces all values of `name`.
    pub fn set<I, S>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.fields.insert(name.into(), values);
    }

    /// Removes `name` and returns its values, keeping the order of the others.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.fields.shift_remove(name)
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// First value of `name`, `None` when the name was never declared or has no values.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name)?.first().map(String::as_str)
    }

    /// All values of `name`, `None` when the name was never declared.
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Every `(name, value)` occurrence in field-then-value order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Renders the fields as `application/x-www-form-urlencoded` text.
    ///
    /// Spaces become `+`, everything outside `[A-Za-z0-9*-._]` is percent-encoded.
    pub fn query_string(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (name, value) in self.pairs() {
            serializer.append_pair(name, value);
        }
        serializer.finish()
    }
}

/// A file declared as a form part of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    name: String,
    path: PathBuf,
    content_type: String,
    file_name: String,
}

impl Attachment {
    /// Declares an attachment for form field `name`.
    ///
    /// Fails with [`MockError::InvalidAttachment`] when `path` is not an existing
    /// file or `content_type` is blank.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        content_type: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let path = path.into();
        let content_type = content_type.into();

        if content_type.trim().is_empty() {
            return Err(MockError::InvalidAttachment(format!(
                "attachment {name:?} has no content type"
            )));
        }
        if !path.is_file() {
            return Err(MockError::InvalidAttachment(format!(
                "attachment {name:?} points at {} which is not a file",
                path.display()
            )));
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                MockError::InvalidAttachment(format!("attachment {name:?} has no file name"))
            })?;

        Ok(Self {
            name,
            path,
            content_type,
            file_name,
        })
    }

    /// Form field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Declared media type.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Last segment of the source path.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Reads the current content of the source file.
    pub fn read(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.path).map_err(|source| MockError::AttachmentRead {
            path: self.path.clone(),
            source,
        })
    }
}

/// Attachments by form field name, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentStore {
    files: IndexMap<String, Attachment>,
}

impl AttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the attachment for its field name. A replaced name keeps
    /// its original position.
    pub fn insert(&mut self, attachment: Attachment) -> Option<Attachment> {
        self.files.insert(attachment.name.clone(), attachment)
    }

    pub fn get(&self, name: &str) -> Option<&Attachment> {
        self.files.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Attachment> {
        self.files.shift_remove(name)
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attachment> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
