// src/cookies.rs
//! Cookies: [`Cookie`], the [`CookieJar`] trait and the in-memory [`DefaultCookieJar`].

mod cookies;
mod cookie_jar;

pub use cookies::Cookie;
pub use cookies::CookieJarHandle;

pub use cookie_jar::effective_domain;
pub use cookie_jar::CookieJar;
pub use cookie_jar::DefaultCookieJar;
