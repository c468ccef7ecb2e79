//! Cookie core types.
//!
//! This module defines the **type-erased jar handle** shared by a user agent and
//! every request/response it mediates, and the serializable [`Cookie`] record.
//!
//! # Concurrency model
//! - [`CookieJarHandle`] is `Arc<RwLock<dyn CookieJar + Send + Sync>>`.
//!   - Callers take a **read lock** for lookups and a **write lock** for
//!     store/delete/reset on the underlying jar.
//!
//! # Parsing
//! [`Cookie::parse`] reads a single `Set-Cookie` record. [`Cookie::parse_all`]
//! accepts a header value that may carry several comma-joined records and keeps
//! every record that parses; broken siblings are dropped with a warning.
//!
//! ```rust
//! use mock_exchange::cookies::Cookie;
//!
//! let c = Cookie::parse("preferences=42; Path=/admin; Max-Age=3600; HttpOnly").unwrap();
//! assert_eq!(c.name, "preferences");
//! assert_eq!(c.path.as_deref(), Some("/admin"));
//! assert_eq!(c.max_age, Some(3600));
//! assert!(c.http_only);
//! ```

use crate::cookies::CookieJar;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// A handle to a cookie jar trait.
///
/// This is a reference-counted, read/write-locked pointer to a type-erased
/// [`CookieJar`]. Obtain a **read lock** for lookups and a **write lock** for
/// mutations.
pub type CookieJarHandle = Arc<RwLock<dyn CookieJar + Send + Sync>>;

/// A cookie as set by a response and replayed by later requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name (case-sensitive).
    pub name: String,

    /// Raw cookie value (not URL-decoded).
    pub value: String,

    /// Explicit domain. When `None` the jar files the cookie under the host of
    /// the request that set it.
    pub domain: Option<String>,

    /// Path scoping. `None` matches every path.
    pub path: Option<String>,

    /// Lifetime in seconds. `None` is a session cookie, `Some(0)` deletes.
    pub max_age: Option<i64>,

    /// If `true`, cookie is meant for HTTPS only.
    pub secure: bool,

    /// If `true`, cookie is hidden from client-side scripts.
    pub http_only: bool,

    /// Cookie version (`0` for Netscape-style cookies).
    pub version: u32,

    /// Free-form comment attribute.
    pub comment: Option<String>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            max_age: None,
            secure: false,
            http_only: false,
            version: 0,
            comment: None,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// A `Max-Age` of exactly zero removes the cookie instead of storing it.
    pub fn is_deletion(&self) -> bool {
        self.max_age == Some(0)
    }

    /// Parses a single `Set-Cookie` record.
    ///
    /// Parsing is lenient: unknown attributes are skipped and attributes with
    /// unparsable values are ignored. Returns `None` only when the leading
    /// `name=value` pair is missing or the name is empty.
    pub fn parse(record: &str) -> Option<Cookie> {
        let mut parts = record.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Cookie::new(name, unquote(value.trim()));

        for part in parts {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            if let Some((k, v)) = part.split_once('=') {
                let v = v.trim();
                match k.trim().to_ascii_lowercase().as_str() {
                    "path" => cookie.path = Some(v.to_string()),
                    "domain" => cookie.domain = Some(v.trim_start_matches('.').to_string()),
                    "max-age" => match v.parse::<i64>() {
                        Ok(seconds) => cookie.max_age = Some(seconds),
                        Err(_) => debug!("ignoring Max-Age {v:?} on cookie {}", cookie.name),
                    },
                    "version" => match unquote(v).parse::<u32>() {
                        Ok(version) => cookie.version = version,
                        Err(_) => debug!("ignoring Version {v:?} on cookie {}", cookie.name),
                    },
                    "comment" => cookie.comment = Some(unquote(v).to_string()),
                    _ => {}
                }
            } else if part.eq_ignore_ascii_case("secure") {
                cookie.secure = true;
            } else if part.eq_ignore_ascii_case("httponly") {
                cookie.http_only = true;
            }
        }

        Some(cookie)
    }

    /// Parses a header value that may hold several comma-joined records.
    ///
    /// A comma only starts a new record when the text after it opens with a
    /// `name=value` pair, so `Expires=Wed, 21 Oct 2015 07:28:00 GMT` stays in one
    /// piece. Records that fail to parse are dropped; their siblings are kept.
    pub fn parse_all(header: &str) -> Vec<Cookie> {
        split_records(header)
            .into_iter()
            .filter_map(|record| {
                let parsed = Cookie::parse(record);
                if parsed.is_none() {
                    warn!("dropping malformed Set-Cookie record {record:?}");
                }
                parsed
            })
            .collect()
    }

    /// Renders the cookie back into `Set-Cookie` wire form.
    pub fn to_set_cookie(&self) -> String {
        let mut out = format!("{}={}", self.name, self.value);
        if let Some(domain) = &self.domain {
            out.push_str(&format!("; Domain={domain}"));
        }
        if let Some(path) = &self.path {
            out.push_str(&format!("; Path={path}"));
        }
        if let Some(max_age) = self.max_age {
            out.push_str(&format!("; Max-Age={max_age}"));
        }
        if self.version > 0 {
            out.push_str(&format!("; Version={}", self.version));
        }
        if let Some(comment) = &self.comment {
            out.push_str(&format!("; Comment={comment}"));
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        out
    }
}

fn unquote(v: &str) -> &str {
    v.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(v)
}

fn split_records(header: &str) -> Vec<&str> {
    let mut records = Vec::new();
    let mut start = 0;

    for (idx, _) in header.match_indices(',') {
        let rest = &header[idx + 1..];
        let head = rest.split(';').next().unwrap_or_default();
        if head.contains('=') {
            records.push(&header[start..idx]);
            start = idx + 1;
        }
    }
    records.push(&header[start..]);

    records
        .into_iter()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .collect()
}
