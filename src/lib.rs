pub mod attributes;
pub mod config;
pub mod context;
pub mod cookies;
pub mod errors;
pub mod exchange;
pub mod headers;
pub mod request;
pub mod response;
pub mod session;
pub mod user_agent;

mod sync;

pub use attributes::AttributeStore;
pub use config::{ExchangeConfig, ExchangeConfigBuilder, ExchangeConfigError};
pub use context::{MockContext, SavePoint};
pub use cookies::{Cookie, CookieJar, CookieJarHandle, DefaultCookieJar};
pub use errors::{MockError, Result};
pub use exchange::{Exchange, Handler};
pub use request::{BodyChannel, MockRequest, MULTIPART_BOUNDARY, MULTIPART_CONTENT_TYPE};
pub use response::MockResponse;
pub use session::{MockSession, SessionId};
pub use user_agent::UserAgent;
