//! Cookie jar abstraction and a simple in-memory implementation.
//!
//! A **cookie jar** holds every cookie a single simulated user agent has been
//! given. Responses push cookies in through [`CookieJar::store`], later requests
//! pull the ones they are entitled to through [`CookieJar::lookup`].
//!
//! ## Matching rules
//! - Cookies are bucketed by **effective domain**: the cookie's explicit domain,
//!   or the host of the URL that set it.
//! - A lookup builds the target string `host[+path]` (the path is left out when
//!   it is `/`) and selects every bucket whose key is a **string prefix** of it.
//!   This is plain prefix matching, not label-aware domain matching: a bucket
//!   `example.com` is also sent to `example.com.evil` and `example.community`.
//!   Fixtures in existing tests rely on this, so it stays.
//! - Within the selected buckets a cookie is kept when its path is unset or is a
//!   prefix of the target path.
//!
//! ## Notes & limitations
//! - `Expires`, `Secure` and `SameSite` are not enforced on lookup.
//! - This module is **not** internally synchronized. Use it via a
//!   `CookieJarHandle = Arc<RwLock<dyn CookieJar + Send + Sync>>`.
use crate::cookies::{Cookie, CookieJarHandle};
use http::header::SET_COOKIE;
use http::HeaderMap;
use indexmap::IndexMap;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use url::Url;

/// A cookie jar keeps the cookies of one simulated user agent.
pub trait CookieJar: Send + Sync {
    /// Stores `cookie` as set by a response to a request for `origin`.
    ///
    /// Any cookie with the same name in the effective domain's bucket is removed
    /// first. A cookie with `Max-Age=0` is not re-inserted, which deletes it.
    fn store(&mut self, cookie: Cookie, origin: &Url);

    /// Returns a detached snapshot of the cookies a request to `target` sends.
    ///
    /// Order is bucket order, then insertion order within a bucket.
    fn lookup(&self, target: &Url) -> Vec<Cookie>;

    /// Removes all cookies from the jar.
    fn reset(&mut self);

    /// Retrieves all buckets with their cookies, for diagnostics.
    fn all_cookies(&self) -> Vec<(String, Vec<Cookie>)>;

    /// Removes the cookie named `cookie_name` from the `domain` bucket.
    fn remove_cookie(&mut self, domain: &str, cookie_name: &str);

    /// Stores every cookie found in the `Set-Cookie` headers of a response to `url`.
    ///
    /// Header values that are not visible ASCII and records that do not parse
    /// are skipped; the remaining records are stored.
    fn store_response_cookies(&mut self, url: &Url, headers: &HeaderMap) {
        for header in headers.get_all(SET_COOKIE) {
            match header.to_str() {
                Ok(value) => {
                    for cookie in Cookie::parse_all(value) {
                        self.store(cookie, url);
                    }
                }
                Err(_) => warn!("skipping non-ASCII Set-Cookie header for {url}"),
            }
        }
    }

    /// Returns the `Cookie` request header value to send for `url`, if any.
    fn request_cookie_header(&self, url: &Url) -> Option<String> {
        let header = self
            .lookup(url)
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");

        if header.is_empty() {
            None
        } else {
            Some(header)
        }
    }
}

/// Computes the lookup key for a request URL: the host, followed by the path
/// unless the path is the root.
pub fn effective_domain(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.path() {
        "" | "/" => host.to_string(),
        path => format!("{host}{path}"),
    }
}

/// Default cookie jar, in memory only.
///
/// Buckets keep the order in which their domain was first seen; cookies keep
/// the order in which they were stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultCookieJar {
    /// Cookies bucketed by effective domain.
    pub entries: IndexMap<String, Vec<Cookie>>,
}

impl DefaultCookieJar {
    /// Creates an empty in-memory cookie jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps the jar into a shareable handle.
    pub fn into_handle(self) -> CookieJarHandle {
        Arc::new(RwLock::new(self))
    }
}

impl CookieJar for DefaultCookieJar {
    fn store(&mut self, cookie: Cookie, origin: &Url) {
        let domain = match &cookie.domain {
            Some(domain) => domain.clone(),
            None => origin.host_str().unwrap_or_default().to_string(),
        };

        let bucket = self.entries.entry(domain.clone()).or_default();
        bucket.retain(|c| c.name != cookie.name);

        if cookie.is_deletion() {
            debug!("deleted cookie {} from {domain}", cookie.name);
        } else {
            trace!("stored cookie {} under {domain}", cookie.name);
            bucket.push(cookie);
        }
    }

    fn lookup(&self, target: &Url) -> Vec<Cookie> {
        let domain = effective_domain(target);
        let path = match target.path() {
            "" => "/",
            path => path,
        };

        self.entries
            .iter()
            .filter(|(key, _)| domain.starts_with(key.as_str()))
            .flat_map(|(_, cookies)| cookies.iter())
            .filter(|cookie| match &cookie.path {
                Some(cookie_path) => path.starts_with(cookie_path.as_str()),
                None => true,
            })
            .cloned()
            .collect()
    }

    fn reset(&mut self) {
        self.entries.clear();
    }

    fn all_cookies(&self) -> Vec<(String, Vec<Cookie>)> {
        self.entries
            .iter()
            .map(|(domain, cookies)| (domain.clone(), cookies.clone()))
            .collect()
    }

    fn remove_cookie(&mut self, domain: &str, cookie_name: &str) {
        if let Some(cookies) = self.entries.get_mut(domain) {
            cookies.retain(|c| c.name != cookie_name);
        }
    }
}
