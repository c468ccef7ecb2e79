// src/exchange.rs
//! Exchanges: one current request, one current response, a lazily created
//! session and an application context, all mediated by one [`UserAgent`].
//!
//! A test walks a flow by installing one request after another. Requests made
//! through [`Exchange::new_request`] share the exchange's session, context and
//! cookie jar, so a cookie set by one step is sent by the next:
//!
//! ```rust
//! use mock_exchange::cookies::Cookie;
//! use mock_exchange::exchange::Exchange;
//!
//! let mut exchange = Exchange::new();
//! exchange.run(|_req, resp| {
//!     resp.add_cookie(Cookie::new("token", "secret"));
//!     Ok(())
//! }).unwrap();
//!
//! let req = exchange.next_request("/account");
//! assert_eq!(req.cookies(), vec![Cookie::new("token", "secret")]);
//! ```
use crate::attributes::AttributeStore;
use crate::config::ExchangeConfig;
use crate::context::{MockContext, SavePoint};
use crate::request::MockRequest;
use crate::response::MockResponse;
use crate::session::{self, MockSession, SessionSlot};
use crate::sync;
use crate::user_agent::UserAgent;
use log::debug;
use std::mem;

/// Code under test, handed the current request and response.
pub trait Handler {
    fn handle(&self, request: &mut MockRequest, response: &mut MockResponse) -> anyhow::Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&mut MockRequest, &mut MockResponse) -> anyhow::Result<()>,
{
    fn handle(&self, request: &mut MockRequest, response: &mut MockResponse) -> anyhow::Result<()> {
        self(request, response)
    }
}

#[derive(Debug)]
pub struct Exchange {
    user_agent: UserAgent,
    request: MockRequest,
    response: MockResponse,
    session: SessionSlot,
    context: MockContext,
}

impl Exchange {
    /// An exchange with the default configuration, positioned on a GET for `/`.
    pub fn new() -> Self {
        Self::with_user_agent(UserAgent::new())
    }

    pub fn with_config(config: ExchangeConfig) -> Self {
        Self::with_user_agent(UserAgent::with_config(config))
    }

    /// An exchange for an existing user agent, sharing its jar.
    pub fn with_user_agent(user_agent: UserAgent) -> Self {
        let session = session::new_slot();
        let context = MockContext::new();
        let request = user_agent.new_request_in("/", session.clone(), context.clone());
        let response = MockResponse::for_request(&request);
        Self {
            user_agent,
            request,
            response,
            session,
            context,
        }
    }

    pub fn user_agent(&self) -> &UserAgent {
        &self.user_agent
    }

    pub fn request(&self) -> &MockRequest {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut MockRequest {
        &mut self.request
    }

    pub fn response(&self) -> &MockResponse {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut MockResponse {
        &mut self.response
    }

    /// Both halves at once.
    pub fn parts_mut(&mut self) -> (&mut MockRequest, &mut MockResponse) {
        (&mut self.request, &mut self.response)
    }

    /// A request for `uri` sharing this exchange's agent, session and context.
    /// It is not installed.
    pub fn new_request(&self, uri: &str) -> MockRequest {
        self.user_agent
            .new_request_in(uri, self.session.clone(), self.context.clone())
    }

    /// Installs `request` and binds the current response to it. Returns the
    /// previous request.
    pub fn replace_request(&mut self, request: MockRequest) -> MockRequest {
        self.response.bind(&request);
        mem::replace(&mut self.request, request)
    }

    /// Installs a fresh request for `uri` together with a fresh response.
    pub fn next_request(&mut self, uri: &str) -> &mut MockRequest {
        let request = self.new_request(uri);
        self.replace_request(request);
        self.reset_response();
        &mut self.request
    }

    /// Replaces the response with a fresh one bound to the current request.
    pub fn reset_response(&mut self) {
        self.response = MockResponse::for_request(&self.request);
    }

    /// The session, created on first demand when `create` is set.
    pub fn session(&self, create: bool) -> Option<MockSession> {
        session::session_in(&self.session, create)
    }

    /// Forgets the session. The next request for one creates a new session.
    pub fn reset_session(&mut self) {
        if let Some(old) = sync::lock(&self.session).take() {
            debug!("dropped session {}", old.id());
        }
    }

    pub fn context(&self) -> &MockContext {
        &self.context
    }

    /// Replaces the context with an empty one at the same context path.
    pub fn reset_context(&mut self) {
        let context = MockContext::new();
        context.set_context_path(self.context.context_path());
        self.request.rebind_context(context.clone());
        self.context = context;
    }

    pub fn reset_context_attributes(&self) {
        self.context.clear_attributes();
    }

    pub fn save(&self) -> SavePoint {
        self.context.save()
    }

    /// See [`MockContext::restore`].
    pub fn restore(&self, save: &SavePoint, keep: &[&str]) {
        self.context.restore(save, keep);
    }

    /// Runs `handler` against the current request and response.
    pub fn run<F>(&mut self, handler: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut MockRequest, &mut MockResponse) -> anyhow::Result<()>,
    {
        handler(&mut self.request, &mut self.response)
    }

    /// Runs a [`Handler`] against the current request and response.
    pub fn dispatch(&mut self, handler: &dyn Handler) -> anyhow::Result<()> {
        handler.handle(&mut self.request, &mut self.response)
    }
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new()
    }
}
