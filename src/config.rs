//! Exchange configuration.
//!
//! `ExchangeConfig` holds the defaults every new [`MockRequest`](crate::request::MockRequest)
//! starts from: where the synthetic server lives, what the synthetic client claims to be,
//! and which locale/encoding it sends.
//!
//! `ExchangeConfig` provides defaults via [`Default`] and a fluent
//! [`ExchangeConfig::builder()`] with validation.
//!
//! # Examples
//!
//! ## Use defaults
//! ```rust
//! use mock_exchange::config::ExchangeConfig;
//! let cfg = ExchangeConfig::default();
//! assert_eq!(cfg.server_port, 10_000);
//! ```
//!
//! ## Customize with the builder
//! ```rust
//! use mock_exchange::config::ExchangeConfig;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = ExchangeConfig::builder()
//!     .scheme("https")
//!     .server_name("fusionauth.io")
//!     .server_port(443)
//!     .user_agent("Netscape Navigator")
//!     .build()?; // returns Result<ExchangeConfig, ExchangeConfigError>
//! assert_eq!(cfg.server_name, "fusionauth.io");
//! # Ok(()) }
//! ```
//!
//! # Fields (summary)
//! - `scheme`: `http` or `https` (default: `http`).
//! - `server_name`: Host the request claims to target (default: `localhost`).
//! - `server_port`: Port the request claims to target (default: `10000`).
//! - `user_agent`: Initial `User-Agent` header (default: `Prime-Mock`).
//! - `locale`: Default request locale as a language tag (default: `en-US`).
//! - `character_encoding`: Encoding label used by the reader channel (default: none, UTF-8).
//! - `remote_addr` / `remote_port`: Simulated client address.

use std::fmt;

pub const DEFAULT_USER_AGENT: &str = "Prime-Mock";

#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub scheme: String,
    pub server_name: String,
    pub server_port: u16,
    pub user_agent: String,
    pub locale: String,
    pub character_encoding: Option<String>,
    pub remote_addr: String,
    pub remote_port: u16,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            server_name: "localhost".to_string(),
            server_port: 10_000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            locale: "en-US".to_string(),
            character_encoding: None,
            remote_addr: "127.0.0.1".to_string(),
            remote_port: 10_000,
        }
    }
}

impl ExchangeConfig {
    pub fn builder() -> ExchangeConfigBuilder {
        ExchangeConfigBuilder::default()
    }
}

/// Builder for [`ExchangeConfig`].
#[derive(Debug, Clone, Default)]
pub struct ExchangeConfigBuilder {
    inner: ExchangeConfig,
}

impl ExchangeConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut ExchangeConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn scheme<S: Into<String>>(self, scheme: S) -> Self { self.map(|c| c.scheme = scheme.into()) }
    pub fn server_name<S: Into<String>>(self, name: S) -> Self { self.map(|c| c.server_name = name.into()) }
    pub fn server_port(self, port: u16) -> Self { self.map(|c| c.server_port = port) }
    pub fn user_agent<S: Into<String>>(self, ua: S) -> Self { self.map(|c| c.user_agent = ua.into()) }
    pub fn locale<S: Into<String>>(self, locale: S) -> Self { self.map(|c| c.locale = locale.into()) }
    pub fn character_encoding<S: Into<String>>(self, enc: S) -> Self { self.map(|c| c.character_encoding = Some(enc.into())) }
    pub fn remote_addr<S: Into<String>>(self, addr: S) -> Self { self.map(|c| c.remote_addr = addr.into()) }
    pub fn remote_port(self, port: u16) -> Self { self.map(|c| c.remote_port = port) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut ExchangeConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<ExchangeConfig, ExchangeConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

// ---------- Validation ----------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeConfigError {
    UnsupportedScheme(String),
    EmptyServerName,
    ZeroPort,
}

impl fmt::Display for ExchangeConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeConfigError::UnsupportedScheme(s) =>
                write!(f, "scheme {s:?} is not supported (expected http or https)"),
            ExchangeConfigError::EmptyServerName =>
                write!(f, "server_name must not be empty"),
            ExchangeConfigError::ZeroPort =>
                write!(f, "server_port must be at least 1"),
        }
    }
}
impl std::error::Error for ExchangeConfigError {}

fn validate(c: &ExchangeConfig) -> Result<(), ExchangeConfigError> {
    if !c.scheme.eq_ignore_ascii_case("http") && !c.scheme.eq_ignore_ascii_case("https") {
        return Err(ExchangeConfigError::UnsupportedScheme(c.scheme.clone()));
    }
    if c.server_name.trim().is_empty() {
        return Err(ExchangeConfigError::EmptyServerName);
    }
    if c.server_port == 0 {
        return Err(ExchangeConfigError::ZeroPort);
    }
    Ok(())
}
