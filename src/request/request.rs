use crate::attributes::{AttributeStore, Attributes};
use crate::context::MockContext;
use crate::cookies::Cookie;
use crate::errors::{MockError, Result};
use crate::headers::HeaderStore;
use crate::request::body::{BodyChannel, BodyGate, BodyReader, BodySource, BodyStream};
use crate::request::fields::{Attachment, AttachmentStore, FieldStore};
use crate::request::multipart::{MultipartBody, MULTIPART_CONTENT_TYPE};
use crate::session::{self, MockSession, SessionSlot};
use crate::sync;
use crate::user_agent::UserAgent;
use http::{HeaderMap, Method, Version};
use log::{debug, warn};
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use url::Url;

/// Content type POST requests get unless told otherwise.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Where a request points. Shared with the response of the same exchange so
/// redirects and cookies resolve against the request's current address.
#[derive(Debug, Clone)]
pub(crate) struct Location {
    pub(crate) scheme: String,
    pub(crate) server_name: String,
    pub(crate) server_port: u16,
    pub(crate) context_path: String,
    pub(crate) uri: String,
}

impl Location {
    /// `scheme://host[:port]`, the port left out when it is the scheme's default.
    pub(crate) fn base_url(&self) -> String {
        let scheme = self.scheme.to_ascii_lowercase();
        let default_port = match scheme.as_str() {
            "http" => Some(80),
            "https" => Some(443),
            _ => None,
        };
        if default_port == Some(self.server_port) {
            format!("{scheme}://{}", self.server_name)
        } else {
            format!("{scheme}://{}:{}", self.server_name, self.server_port)
        }
    }

    pub(crate) fn request_url(&self) -> String {
        format!("{}{}{}", self.base_url(), self.context_path, self.uri)
    }
}

pub(crate) type SharedLocation = Arc<RwLock<Location>>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ContentType {
    Unset,
    FormDefault,
    Explicit(String),
    Multipart,
}

/// A synthetic HTTP request.
///
/// Created by a [`UserAgent`] or an [`crate::exchange::Exchange`], which bind it
/// to a cookie jar, a session slot and a context. [`MockRequest::new`] gives a
/// request with its own private user agent.
pub struct MockRequest {
    location: SharedLocation,
    method: Method,
    headers: HeaderStore,
    fields: FieldStore,
    attachments: AttachmentStore,
    content_type: ContentType,
    encoding: Option<String>,
    body: BodyGate,
    attributes: Attributes,
    copied_cookies: Vec<Cookie>,
    locales: Vec<String>,
    servlet_path: String,
    path_info: String,
    path_translated: Option<String>,
    remote_addr: String,
    remote_host: Option<String>,
    remote_port: u16,
    remote_user: Option<String>,
    local_name: String,
    dispatched: Option<String>,
    user_agent: UserAgent,
    session: SessionSlot,
    context: MockContext,
}

impl MockRequest {
    /// A GET for `/` with its own user agent, session and context.
    pub fn new() -> Self {
        UserAgent::new().new_request("/")
    }

    pub(crate) fn bound(
        uri: &str,
        user_agent: UserAgent,
        session: SessionSlot,
        context: MockContext,
    ) -> Self {
        let config = user_agent.config();
        let location = Location {
            scheme: config.scheme.clone(),
            server_name: config.server_name.clone(),
            server_port: config.server_port,
            context_path: String::new(),
            uri: uri.to_string(),
        };

        let request = Self {
            location: Arc::new(RwLock::new(location)),
            method: Method::GET,
            headers: HeaderStore::new(),
            fields: FieldStore::new(),
            attachments: AttachmentStore::new(),
            content_type: ContentType::Unset,
            encoding: config.character_encoding.clone(),
            body: BodyGate::default(),
            attributes: Attributes::new(),
            copied_cookies: Vec::new(),
            locales: vec![config.locale.clone()],
            servlet_path: String::new(),
            path_info: String::new(),
            path_translated: None,
            remote_addr: config.remote_addr.clone(),
            remote_host: None,
            remote_port: config.remote_port,
            remote_user: None,
            local_name: "localhost".to_string(),
            dispatched: None,
            user_agent,
            session,
            context,
        };

        request.headers.set("User-Agent", config.user_agent.clone());
        request.update_common_headers();
        request
    }

    pub(crate) fn shared_location(&self) -> SharedLocation {
        Arc::clone(&self.location)
    }

    fn update_common_headers(&self) {
        let base = sync::read(&self.location).base_url();
        self.headers.set("Origin", base.clone());
        self.headers.set("Referer", format!("{base}/referral-path"));
    }

    // Method and addressing

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Sets the method. Switching to POST without a content type selects the
    /// form-encoded default.
    pub fn set_method(&mut self, method: Method) {
        if method == Method::POST && self.content_type == ContentType::Unset {
            self.content_type = ContentType::FormDefault;
        }
        self.method = method;
    }

    pub fn set_post(&mut self, post: bool) {
        self.set_method(if post { Method::POST } else { Method::GET });
    }

    pub fn is_post(&self) -> bool {
        self.method == Method::POST
    }

    pub fn version(&self) -> Version {
        Version::HTTP_10
    }

    pub fn uri(&self) -> String {
        sync::read(&self.location).uri.clone()
    }

    pub fn set_uri(&mut self, uri: impl Into<String>) {
        sync::write(&self.location).uri = uri.into();
    }

    pub fn context_path(&self) -> String {
        sync::read(&self.location).context_path.clone()
    }

    pub fn set_context_path(&mut self, path: impl Into<String>) {
        sync::write(&self.location).context_path = path.into();
    }

    pub fn scheme(&self) -> String {
        sync::read(&self.location).scheme.clone()
    }

    pub fn set_scheme(&mut self, scheme: impl Into<String>) {
        sync::write(&self.location).scheme = scheme.into();
        self.update_common_headers();
    }

    pub fn is_secure(&self) -> bool {
        self.scheme().eq_ignore_ascii_case("https")
    }

    pub fn server_name(&self) -> String {
        sync::read(&self.location).server_name.clone()
    }

    pub fn set_server_name(&mut self, name: impl Into<String>) {
        sync::write(&self.location).server_name = name.into();
        self.update_common_headers();
    }

    pub fn server_port(&self) -> u16 {
        sync::read(&self.location).server_port
    }

    pub fn set_server_port(&mut self, port: u16) {
        sync::write(&self.location).server_port = port;
        self.update_common_headers();
    }

    /// `scheme://host[:port]`. Also the origin cookies set in reply are filed under.
    pub fn base_url(&self) -> String {
        sync::read(&self.location).base_url()
    }

    /// Base URL, context path and URI.
    pub fn request_url(&self) -> String {
        sync::read(&self.location).request_url()
    }

    /// The request URL parsed with the `url` crate.
    pub fn url(&self) -> Result<Url> {
        Ok(Url::parse(&self.request_url())?)
    }

    pub fn servlet_path(&self) -> &str {
        &self.servlet_path
    }

    pub fn set_servlet_path(&mut self, path: impl Into<String>) {
        self.servlet_path = path.into();
    }

    pub fn path_info(&self) -> &str {
        &self.path_info
    }

    pub fn set_path_info(&mut self, path: impl Into<String>) {
        self.path_info = path.into();
    }

    pub fn path_translated(&self) -> Option<&str> {
        self.path_translated.as_deref()
    }

    pub fn set_path_translated(&mut self, path: impl Into<String>) {
        self.path_translated = Some(path.into());
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    pub fn set_remote_addr(&mut self, addr: impl Into<String>) {
        self.remote_addr = addr.into();
    }

    /// Remote host, falling back to the remote address.
    pub fn remote_host(&self) -> &str {
        self.remote_host.as_deref().unwrap_or(&self.remote_addr)
    }

    pub fn set_remote_host(&mut self, host: impl Into<String>) {
        self.remote_host = Some(host.into());
    }

    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    pub fn set_remote_port(&mut self, port: u16) {
        self.remote_port = port;
    }

    pub fn remote_user(&self) -> Option<&str> {
        self.remote_user.as_deref()
    }

    pub fn set_remote_user(&mut self, user: impl Into<String>) {
        self.remote_user = Some(user.into());
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn set_local_name(&mut self, name: impl Into<String>) {
        self.local_name = name.into();
    }

    /// First locale, or the configured default when the list was cleared.
    pub fn locale(&self) -> String {
        self.locales
            .first()
            .cloned()
            .unwrap_or_else(|| self.user_agent.config().locale.clone())
    }

    pub fn locales(&self) -> &[String] {
        &self.locales
    }

    pub fn add_locale(&mut self, locale: impl Into<String>) {
        self.locales.push(locale.into());
    }

    pub fn clear_locales(&mut self) {
        self.locales.clear();
    }

    /// Resolves a dispatch target and remembers it.
    ///
    /// Absolute paths are taken as-is. Relative ones are resolved against the
    /// directory of `servlet_path + path_info`, with leading `../` segments
    /// climbing one directory each. Returns `None` when they climb past the root.
    pub fn dispatch(&mut self, path: &str) -> Option<String> {
        let full = if path.starts_with('/') {
            path.to_string()
        } else {
            let lookup = format!("{}{}", self.servlet_path, self.path_info);
            cat_path(&lookup, path)?
        };
        debug!("dispatching {} to {full}", self.uri());
        self.dispatched = Some(full.clone());
        Some(full)
    }

    /// Target of the last successful [`MockRequest::dispatch`].
    pub fn dispatched_path(&self) -> Option<&str> {
        self.dispatched.as_deref()
    }

    // Headers

    /// Appends a header value. `User-Agent` replaces instead.
    pub fn add_header(&self, name: &str, value: impl Into<String>) {
        if name.eq_ignore_ascii_case(http::header::USER_AGENT.as_str()) {
            self.headers.set(name, value);
        } else {
            self.headers.add(name, value);
        }
    }

    pub fn set_header(&self, name: &str, value: impl Into<String>) {
        self.headers.set(name, value);
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

    pub fn remove_header(&self, name: &str) -> Option<Vec<String>> {
        self.headers.remove(name)
    }

    pub fn int_header(&self, name: &str) -> Option<i64> {
        self.headers.int(name)
    }

    /// Header holding milliseconds since the Unix epoch.
    pub fn date_header(&self, name: &str) -> Option<SystemTime> {
        let millis = self.headers.int(name)?;
        let offset = Duration::from_millis(millis.unsigned_abs());
        if millis >= 0 {
            UNIX_EPOCH.checked_add(offset)
        } else {
            UNIX_EPOCH.checked_sub(offset)
        }
    }

    /// The underlying store, for handing to other threads.
    pub fn header_store(&self) -> &HeaderStore {
        &self.headers
    }

    pub fn header_map(&self) -> Result<HeaderMap> {
        self.headers.to_header_map()
    }

    // Parameters

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.fields.get(name)
    }

    pub fn parameter_values(&self, name: &str) -> Option<&[String]> {
        self.fields.values(name)
    }

    pub fn parameter_names(&self) -> Vec<&str> {
        self.fields.names().collect()
    }

    pub fn parameter_map(&self) -> &FieldStore {
        &self.fields
    }

    pub fn add_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.add(name, value);
    }

    pub fn set_parameter<I, S>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.set(name, values);
    }

    pub fn remove_parameter(&mut self, name: &str) -> Option<Vec<String>> {
        self.fields.remove(name)
    }

    pub fn clear_parameters(&mut self) {
        self.fields.clear();
    }

    /// Parameters rendered as `application/x-www-form-urlencoded` text.
    pub fn query_string(&self) -> String {
        self.fields.query_string()
    }

    // Attachments and content type

    /// Declares a file to upload as form field `name`.
    ///
    /// Commits the request to the multipart content type. Fails once the body
    /// was opened or supplied, or when an explicit content type was set.
    pub fn add_file(
        &mut self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        content_type: impl Into<String>,
    ) -> Result<()> {
        let attachment = Attachment::new(name, path, content_type)?;

        self.body.ensure_untouched()?;
        if self.body.has_explicit() {
            return Err(MockError::BodyAlreadyConsumed);
        }
        if let ContentType::Explicit(current) = &self.content_type {
            return Err(MockError::ContentTypeConflict {
                requested: current.clone(),
            });
        }

        debug!(
            "attaching {} as {} ({})",
            attachment.path().display(),
            attachment.name(),
            attachment.content_type()
        );
        self.attachments.insert(attachment);
        self.content_type = ContentType::Multipart;
        self.headers.set("Content-Type", MULTIPART_CONTENT_TYPE);
        Ok(())
    }

    pub fn attachments(&self) -> &AttachmentStore {
        &self.attachments
    }

    pub fn remove_file(&mut self, name: &str) -> Result<Option<Attachment>> {
        self.body.ensure_untouched()?;
        Ok(self.attachments.remove(name))
    }

    /// Drops every attachment. The request stays multipart, so the body still
    /// carries the closing delimiter.
    pub fn clear_files(&mut self) -> Result<()> {
        self.body.ensure_untouched()?;
        self.attachments.clear();
        Ok(())
    }

    pub fn content_type(&self) -> Option<&str> {
        match &self.content_type {
            ContentType::Unset => None,
            ContentType::FormDefault => Some(FORM_URLENCODED),
            ContentType::Explicit(ct) => Some(ct.as_str()),
            ContentType::Multipart => Some(MULTIPART_CONTENT_TYPE),
        }
    }

    /// Fixes the content type.
    ///
    /// While attachments are pending only a `multipart/form-data` type is
    /// accepted, and the request keeps its synthesized multipart type.
    pub fn set_content_type(&mut self, content_type: impl Into<String>) -> Result<()> {
        let content_type = content_type.into();
        self.body.ensure_untouched()?;

        if !self.attachments.is_empty() {
            let is_multipart = content_type
                .to_ascii_lowercase()
                .starts_with("multipart/form-data");
            if !is_multipart {
                return Err(MockError::ContentTypeConflict {
                    requested: content_type,
                });
            }
            debug!("keeping synthesized multipart type over {content_type:?}");
            return Ok(());
        }

        self.headers.set("Content-Type", content_type.clone());
        self.content_type = ContentType::Explicit(content_type);
        Ok(())
    }

    pub fn character_encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    /// Charset the reader channel decodes with. Checked when the reader opens.
    pub fn set_character_encoding(&mut self, encoding: impl Into<String>) {
        self.encoding = Some(encoding.into());
    }

    /// Body length when known without reading it.
    pub fn content_length(&self) -> Option<u64> {
        self.body.len()
    }

    // Body

    /// Supplies the body bytes, replacing anything the request would derive.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) -> Result<()> {
        self.body.supply(BodySource::Bytes(body.into()))
    }

    /// Supplies the body as a stream of unknown length.
    pub fn set_body_stream(&mut self, stream: impl Read + Send + Sync + 'static) -> Result<()> {
        self.body.supply(BodySource::Stream(Box::new(stream)))
    }

    /// Channel the body was opened through, if any.
    pub fn body_channel(&self) -> Option<BodyChannel> {
        self.body.opened()
    }

    /// Opens the body as raw bytes. Later calls return the same stream.
    pub fn open_stream(&mut self) -> Result<&mut BodyStream> {
        let (method, content_type) = (&self.method, &self.content_type);
        let (fields, attachments) = (&self.fields, &self.attachments);
        self.body
            .open_stream(|| resolve_body(method, content_type, fields, attachments))
    }

    /// Opens the body as text decoded with the request's character encoding.
    /// Later calls return the same reader.
    pub fn open_reader(&mut self) -> Result<&mut BodyReader> {
        let (method, content_type) = (&self.method, &self.content_type);
        let (fields, attachments) = (&self.fields, &self.attachments);
        self.body.open_reader(self.encoding.as_deref(), || {
            resolve_body(method, content_type, fields, attachments)
        })
    }

    // Cookies, session and context

    /// Cookies the user agent sends with this request, read from the jar on
    /// every call.
    pub fn cookies(&self) -> Vec<Cookie> {
        self.user_agent.cookies(self)
    }

    /// Snapshots the user agent's cookies into the request.
    pub fn copy_cookies_from_user_agent(&mut self) {
        self.copied_cookies = self.user_agent.cookies(self);
    }

    /// Cookies captured by the last [`MockRequest::copy_cookies_from_user_agent`].
    pub fn copied_cookies(&self) -> &[Cookie] {
        &self.copied_cookies
    }

    pub fn clear_cookies(&mut self) {
        self.copied_cookies.clear();
    }

    pub fn user_agent(&self) -> &UserAgent {
        &self.user_agent
    }

    /// The exchange's session, created when missing and `create` is set.
    pub fn session(&self, create: bool) -> Option<MockSession> {
        session::session_in(&self.session, create)
    }

    pub fn context(&self) -> &MockContext {
        &self.context
    }

    pub(crate) fn rebind_context(&mut self, context: MockContext) {
        self.context = context;
    }
}

impl Default for MockRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRequest")
            .field("method", &self.method)
            .field("url", &self.request_url())
            .field("content_type", &self.content_type())
            .field("fields", &self.fields)
            .field("attachments", &self.attachments.len())
            .field("body", &self.body)
            .finish()
    }
}

impl AttributeStore for MockRequest {
    fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.attribute(name)
    }

    fn set_attribute(&self, name: &str, value: Value) {
        self.attributes.set_attribute(name, value)
    }

    fn remove_attribute(&self, name: &str) -> Option<Value> {
        self.attributes.remove_attribute(name)
    }

    fn clear_attributes(&self) {
        self.attributes.clear_attributes()
    }

    fn attribute_names(&self) -> Vec<String> {
        self.attributes.attribute_names()
    }

    fn attribute_count(&self) -> usize {
        self.attributes.attribute_count()
    }
}

/// Derives the body of a request that was not given one explicitly.
fn resolve_body(
    method: &Method,
    content_type: &ContentType,
    fields: &FieldStore,
    attachments: &AttachmentStore,
) -> Result<BodySource> {
    match content_type {
        ContentType::Multipart => Ok(BodySource::Multipart(MultipartBody::synthesize(
            fields,
            attachments,
        )?)),
        ContentType::FormDefault if *method == Method::POST => {
            Ok(BodySource::Bytes(fields.query_string().into_bytes()))
        }
        ContentType::Explicit(ct)
            if *method == Method::POST
                && ct.to_ascii_lowercase().starts_with(FORM_URLENCODED) =>
        {
            Ok(BodySource::Bytes(fields.query_string().into_bytes()))
        }
        _ => Ok(BodySource::Bytes(Vec::new())),
    }
}

/// Joins a relative dispatch `path` onto the directory of `lookup`.
fn cat_path(lookup: &str, path: &str) -> Option<String> {
    let Some(idx) = lookup.rfind('/') else {
        return Some(path.to_string());
    };

    let mut dir = &lookup[..idx];
    let mut rest = path;
    while let Some(stripped) = rest.strip_prefix("../") {
        if dir.is_empty() {
            warn!("dispatch path {path:?} climbs above {lookup:?}");
            return None;
        }
        dir = &dir[..dir.rfind('/').unwrap_or(0)];
        rest = stripped;
    }

    Some(format!("{dir}/{rest}"))
}
