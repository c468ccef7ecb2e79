// src/user_agent.rs
//! The simulated client: one cookie jar shared by every request it issues and
//! every response those requests receive.
use crate::config::ExchangeConfig;
use crate::context::MockContext;
use crate::cookies::{Cookie, CookieJar, CookieJarHandle, DefaultCookieJar};
use crate::request::MockRequest;
use crate::session::{self, SessionSlot};
use crate::sync;
use log::warn;
use std::sync::Arc;
use url::Url;

/// Handle to a simulated user agent. Clones share the jar.
#[derive(Clone)]
pub struct UserAgent {
    jar: CookieJarHandle,
    config: Arc<ExchangeConfig>,
}

impl UserAgent {
    /// A user agent with the default configuration and an empty in-memory jar.
    pub fn new() -> Self {
        Self::with_config(ExchangeConfig::default())
    }

    pub fn with_config(config: ExchangeConfig) -> Self {
        Self::with_jar(config, DefaultCookieJar::new().into_handle())
    }

    /// A user agent backed by an existing jar.
    pub fn with_jar(config: ExchangeConfig, jar: CookieJarHandle) -> Self {
        Self {
            jar,
            config: Arc::new(config),
        }
    }

    pub fn jar(&self) -> CookieJarHandle {
        Arc::clone(&self.jar)
    }

    pub fn config(&self) -> Arc<ExchangeConfig> {
        Arc::clone(&self.config)
    }

    /// A GET request for `uri` with its own session and context.
    pub fn new_request(&self, uri: &str) -> MockRequest {
        MockRequest::bound(uri, self.clone(), session::new_slot(), MockContext::new())
    }

    pub(crate) fn new_request_in(
        &self,
        uri: &str,
        session: SessionSlot,
        context: MockContext,
    ) -> MockRequest {
        MockRequest::bound(uri, self.clone(), session, context)
    }

    /// Stores `cookie` as set by a response from `origin`.
    pub fn store_cookie(&self, cookie: Cookie, origin: &Url) {
        sync::write(&self.jar).store(cookie, origin);
    }

    /// Stores `cookie` as set in reply to `request`, filed under its base URL.
    pub fn add_cookie(&self, request: &MockRequest, cookie: Cookie) {
        let base = request.base_url();
        match Url::parse(&base) {
            Ok(origin) => self.store_cookie(cookie, &origin),
            Err(e) => warn!("not storing cookie {}: bad origin {base:?}: {e}", cookie.name),
        }
    }

    /// Cookies `request` is entitled to, looked up by its full request URL.
    pub fn cookies(&self, request: &MockRequest) -> Vec<Cookie> {
        let target = request.request_url();
        match Url::parse(&target) {
            Ok(url) => self.cookies_for(&url),
            Err(e) => {
                warn!("no cookies for unparsable request URL {target:?}: {e}");
                Vec::new()
            }
        }
    }

    pub fn cookies_for(&self, url: &Url) -> Vec<Cookie> {
        sync::read(&self.jar).lookup(url)
    }

    /// `Cookie` header value a request to `url` would carry.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        sync::read(&self.jar).request_cookie_header(url)
    }

    /// Forgets every cookie.
    pub fn reset(&self) {
        sync::write(&self.jar).reset();
    }
}

impl Default for UserAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UserAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserAgent")
            .field("config", &self.config)
            .field("cookies", &sync::read(&self.jar).all_cookies().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cookies: &[Cookie]) -> Vec<&str> {
        cookies.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn cookies_follow_request_address() {
        let agent = UserAgent::new();

        let mut req = agent.new_request("/foo");
        agent.add_cookie(&req, Cookie::new("token", "secret"));
        assert_eq!(names(&req.cookies()), vec!["token"]);

        req.set_server_name("fusionauth.io");
        assert!(req.cookies().is_empty());
    }

    #[test]
    fn requests_from_one_agent_share_the_jar() {
        let agent = UserAgent::new();
        let first = agent.new_request("/login");
        let second = agent.new_request("/other");

        agent.add_cookie(&first, Cookie::new("sid", "1"));
        assert_eq!(names(&second.cookies()), vec!["sid"]);

        agent.reset();
        assert!(second.cookies().is_empty());
    }

    #[test]
    fn separate_agents_do_not_share_cookies() {
        let a = UserAgent::new();
        let b = UserAgent::new();
        a.add_cookie(&a.new_request("/"), Cookie::new("sid", "1"));
        assert!(b.new_request("/").cookies().is_empty());
    }

    #[test]
    fn copy_snapshot_does_not_follow_the_jar() {
        let agent = UserAgent::new();
        let mut req = agent.new_request("/");
        agent.add_cookie(&req, Cookie::new("a", "1"));
        req.copy_cookies_from_user_agent();
        agent.reset();

        assert_eq!(names(req.copied_cookies()), vec!["a"]);
        assert!(req.cookies().is_empty());
    }

    #[test]
    fn cookie_header_joins_pairs() {
        let agent = UserAgent::new();
        let url = Url::parse("http://localhost:10000/").unwrap();
        agent.store_cookie(Cookie::new("a", "1"), &url);
        agent.store_cookie(Cookie::new("b", "2"), &url);
        assert_eq!(agent.cookie_header(&url).as_deref(), Some("a=1; b=2"));
    }
}
