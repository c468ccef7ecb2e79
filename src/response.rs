// src/response.rs
//! Synthetic responses.
//!
//! A response bound to a request writes the cookies it is given straight into
//! the request's user agent jar, filed under the request's base URL. Code under
//! test that sets `Set-Cookie` by hand goes through the same path.
use crate::cookies::Cookie;
use crate::errors::Result;
use crate::headers::HeaderStore;
use crate::request::{MockRequest, SharedLocation};
use crate::sync;
use crate::user_agent::UserAgent;
use encoding_rs::{Encoding, UTF_8};
use http::header::SET_COOKIE;
use http::{HeaderMap, StatusCode};
use log::{debug, warn};
use std::io::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;

struct ResponseBinding {
    user_agent: UserAgent,
    location: SharedLocation,
}

/// A synthetic HTTP response. Output written through [`Write`] is buffered.
pub struct MockResponse {
    status: StatusCode,
    message: Option<String>,
    headers: HeaderStore,
    cookies: Vec<Cookie>,
    content_type: Option<String>,
    encoding: Option<String>,
    locale: Option<String>,
    content_length: Option<u64>,
    buffer_size: usize,
    redirect: Option<String>,
    committed: bool,
    flushed: bool,
    reset: bool,
    body: Vec<u8>,
    binding: Option<ResponseBinding>,
}

impl MockResponse {
    /// A response bound to nothing: cookies are only recorded, redirects are
    /// kept as given.
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            message: None,
            headers: HeaderStore::new(),
            cookies: Vec::new(),
            content_type: None,
            encoding: None,
            locale: None,
            content_length: None,
            buffer_size: 0,
            redirect: None,
            committed: false,
            flushed: false,
            reset: false,
            body: Vec::new(),
            binding: None,
        }
    }

    /// A response to `request`, sharing its user agent and address.
    pub fn for_request(request: &MockRequest) -> Self {
        let mut response = Self::new();
        response.bind(request);
        response
    }

    /// Points the response at `request`. Cookies stored earlier stay where
    /// they were filed.
    pub fn bind(&mut self, request: &MockRequest) {
        self.binding = Some(ResponseBinding {
            user_agent: request.user_agent().clone(),
            location: request.shared_location(),
        });
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    // Status

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn set_status_with_message(&mut self, status: StatusCode, message: impl Into<String>) {
        self.status = status;
        self.message = Some(message.into());
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn send_error(&mut self, status: StatusCode, message: Option<&str>) {
        debug!("send_error {status} {message:?}");
        self.status = status;
        self.message = message.map(str::to_string);
    }

    /// Redirects with `302 Found`.
    ///
    /// A relative `target` is resolved against the bound request's URL. An
    /// unbound response keeps the target as given.
    pub fn send_redirect(&mut self, target: &str) -> Result<()> {
        let resolved = match &self.binding {
            Some(binding) => {
                let base = Url::parse(&sync::read(&binding.location).request_url())?;
                base.join(target)?.to_string()
            }
            None => target.to_string(),
        };

        debug!("redirecting to {resolved}");
        self.headers.set("Location", resolved.clone());
        self.redirect = Some(resolved);
        self.status = StatusCode::FOUND;
        Ok(())
    }

    pub fn redirect(&self) -> Option<&str> {
        self.redirect.as_deref()
    }

    // Headers

    /// Appends a header value. `Set-Cookie` values are also parsed and routed
    /// through [`MockResponse::add_cookie`]; malformed records are dropped.
    pub fn add_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if name.eq_ignore_ascii_case(SET_COOKIE.as_str()) {
            for cookie in Cookie::parse_all(&value) {
                self.add_cookie(cookie);
            }
        }
        self.headers.add(name, value);
    }

    /// Replaces the values of a header. `Set-Cookie` is routed as in
    /// [`MockResponse::add_header`].
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if name.eq_ignore_ascii_case(SET_COOKIE.as_str()) {
            for cookie in Cookie::parse_all(&value) {
                self.add_cookie(cookie);
            }
        }
        self.headers.set(name, value);
    }

    pub fn add_int_header(&mut self, name: &str, value: i64) {
        self.headers.add(name, value.to_string());
    }

    /// Adds a date header as milliseconds since the Unix epoch, saturating
    /// at the `i64` range.
    pub fn add_date_header(&mut self, name: &str, date: SystemTime) {
        let millis = match date.duration_since(UNIX_EPOCH) {
            Ok(since) => i64::try_from(since.as_millis()).unwrap_or(i64::MAX),
            Err(before) => i64::try_from(before.duration().as_millis())
                .map(|m| -m)
                .unwrap_or(i64::MIN),
        };
        self.headers.add(name, millis.to_string());
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers.get(name)
    }

    pub fn headers(&self, name: &str) -> Vec<String> {
        self.headers.get_all(name)
    }

    pub fn header_names(&self) -> Vec<String> {
        self.headers.names()
    }

    pub fn contains_header(&self, name: &str) -> bool {
        self.headers.contains(name)
    }

    pub fn remove_header(&mut self, name: &str) -> Option<Vec<String>> {
        self.headers.remove(name)
    }

    pub fn header_map(&self) -> Result<HeaderMap> {
        self.headers.to_header_map()
    }

    // Cookies

    /// Records `cookie` and stores it in the bound user agent's jar.
    pub fn add_cookie(&mut self, cookie: Cookie) {
        if let Some(binding) = &self.binding {
            let base = sync::read(&binding.location).base_url();
            match Url::parse(&base) {
                Ok(origin) => binding.user_agent.store_cookie(cookie.clone(), &origin),
                Err(e) => warn!("cookie {} not stored, bad origin {base:?}: {e}", cookie.name),
            }
        }
        self.cookies.push(cookie);
    }

    /// Every cookie set on this response, in order.
    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&Cookie> {
        self.cookies.iter().rev().find(|c| c.name == name)
    }

    // Content metadata

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        let content_type = content_type.into();
        self.headers.set("Content-Type", content_type.clone());
        self.content_type = Some(content_type);
    }

    pub fn character_encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    pub fn set_character_encoding(&mut self, encoding: impl Into<String>) {
        self.encoding = Some(encoding.into());
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    pub fn set_locale(&mut self, locale: impl Into<String>) {
        self.locale = Some(locale.into());
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn set_content_length(&mut self, length: u64) {
        self.content_length = Some(length);
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn set_buffer_size(&mut self, size: usize) {
        self.buffer_size = size;
    }

    // Lifecycle flags

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn set_committed(&mut self, committed: bool) {
        self.committed = committed;
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    pub fn is_reset(&self) -> bool {
        self.reset
    }

    /// Clears status, headers and buffered output.
    pub fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.message = None;
        self.headers.clear();
        self.body.clear();
        self.reset = true;
    }

    /// Clears buffered output only.
    pub fn reset_buffer(&mut self) {
        self.body.clear();
        self.reset = true;
    }

    // Output

    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Output decoded with the charset of the content type, then the character
    /// encoding, then UTF-8. Unknown labels fall back to UTF-8.
    pub fn body_string(&self) -> String {
        let label = self
            .content_type
            .as_deref()
            .and_then(charset_param)
            .or(self.encoding.as_deref());

        let encoding = match label {
            Some(label) => Encoding::for_label(label.as_bytes()).unwrap_or_else(|| {
                warn!("unknown response charset {label:?}, decoding as UTF-8");
                UTF_8
            }),
            None => UTF_8,
        };
        let (text, _, _) = encoding.decode(&self.body);
        text.into_owned()
    }
}

impl Default for MockResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for MockResponse {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushed = true;
        Ok(())
    }
}

impl std::fmt::Debug for MockResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("cookies", &self.cookies)
            .field("redirect", &self.redirect)
            .field("body_len", &self.body.len())
            .field("bound", &self.is_bound())
            .finish()
    }
}

// Permissive parse of `...; charset=<value>` in a content type.
fn charset_param(content_type: &str) -> Option<&str> {
    let idx = content_type.to_ascii_lowercase().find("charset=")?;
    let after = &content_type[idx + "charset=".len()..];
    let end = after.find([';', ' ', '\t']).unwrap_or(after.len());
    let value = after[..end].trim_matches('"');
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::CookieJar;

    #[test]
    fn defaults() {
        let response = MockResponse::new();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.cookies().is_empty());
        assert!(!response.is_bound());
        assert_eq!(response.body_string(), "");
    }

    #[test]
    fn bound_response_stores_cookies_under_request_base_url() {
        let request = MockRequest::new();
        let mut response = MockResponse::for_request(&request);
        response.add_cookie(Cookie::new("token", "secret"));

        assert_eq!(response.cookies().len(), 1);
        let jar = request.user_agent().jar();
        let buckets = jar.read().unwrap().all_cookies();
        assert_eq!(buckets[0].0, "localhost");
        assert_eq!(request.cookies(), vec![Cookie::new("token", "secret")]);
    }

    #[test]
    fn unbound_response_only_records_cookies() {
        let mut response = MockResponse::new();
        response.add_cookie(Cookie::new("a", "1"));
        assert_eq!(response.cookie("a").map(|c| c.value.as_str()), Some("1"));
    }

    #[test]
    fn set_cookie_header_is_parsed_leniently() {
        let request = MockRequest::new();
        let mut response = MockResponse::for_request(&request);
        response.add_header("Set-Cookie", "=broken, sid=42; Path=/; HttpOnly");
        response.add_header("set-cookie", "theme=dark");

        let names: Vec<_> = response.cookies().iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["sid", "theme"]);
        assert!(response.cookie("sid").unwrap().http_only);
        assert_eq!(response.headers("SET-COOKIE").len(), 2);
        assert_eq!(request.cookies().len(), 2);
    }

    #[test]
    fn max_age_zero_cookie_deletes_from_jar() {
        let request = MockRequest::new();
        let mut response = MockResponse::for_request(&request);
        response.add_cookie(Cookie::new("sid", "1"));
        response.add_header("Set-Cookie", "sid=; Max-Age=0");
        assert!(request.cookies().is_empty());
    }

    #[test]
    fn redirect_resolves_relative_targets() {
        let mut request = MockRequest::new();
        request.set_uri("/admin/users/edit");
        let mut response = MockResponse::for_request(&request);

        response.send_redirect("list?page=2").unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.redirect(),
            Some("http://localhost:10000/admin/users/list?page=2")
        );
        assert_eq!(response.header("location").as_deref(), response.redirect());

        response.send_redirect("/login").unwrap();
        assert_eq!(response.redirect(), Some("http://localhost:10000/login"));

        response.send_redirect("https://fusionauth.io/").unwrap();
        assert_eq!(response.redirect(), Some("https://fusionauth.io/"));
    }

    #[test]
    fn unbound_redirect_is_kept_verbatim() {
        let mut response = MockResponse::new();
        response.send_redirect("relative").unwrap();
        assert_eq!(response.redirect(), Some("relative"));
    }

    #[test]
    fn output_is_buffered_and_decoded() {
        let mut response = MockResponse::new();
        response.set_content_type("text/plain; charset=ISO-8859-1");
        response.write_all(&[0x63, 0x61, 0x66, 0xe9]).unwrap();
        response.flush().unwrap();

        assert!(response.is_flushed());
        assert_eq!(response.body_bytes().len(), 4);
        assert_eq!(response.body_string(), "café");

        response.reset_buffer();
        assert!(response.body_bytes().is_empty());
        assert!(response.is_reset());
    }

    #[test]
    fn send_error_and_reset() {
        let mut response = MockResponse::new();
        response.add_int_header("Retry-After", 30);
        response.send_error(StatusCode::SERVICE_UNAVAILABLE, Some("down"));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.message(), Some("down"));
        assert_eq!(response.header("retry-after").as_deref(), Some("30"));

        response.reset();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.contains_header("Retry-After"));
    }

    #[test]
    fn date_header_is_epoch_millis() {
        let mut response = MockResponse::new();
        response.add_date_header("Date", UNIX_EPOCH + std::time::Duration::from_millis(1234));
        assert_eq!(response.header("Date").as_deref(), Some("1234"));
    }

    #[test]
    fn date_header_outside_i64_millis_saturates() {
        let mut response = MockResponse::new();
        let far = UNIX_EPOCH
            .checked_add(std::time::Duration::from_secs(10_000_000_000_000_000))
            .unwrap();
        response.add_date_header("Expires", far);
        response.add_date_header("Expires", UNIX_EPOCH - std::time::Duration::from_millis(1500));
        assert_eq!(
            response.headers("Expires"),
            vec![i64::MAX.to_string(), "-1500".to_string()]
        );
    }

    #[test]
    fn charset_param_parsing() {
        assert_eq!(charset_param("text/html; charset=\"utf-8\""), Some("utf-8"));
        assert_eq!(charset_param("text/html;Charset=latin1; q=1"), Some("latin1"));
        assert_eq!(charset_param("text/html"), None);
    }
}
