//! Origin caching — tag rendered HTML so an edge cache (CDN) can store it.
//!
//! The pieces fit together like this:
//!
//! - [`OriginCache`] is the interface views look up per request through
//!   [`Request::find_service`](crate::http::Request::find_service). It may
//!   be absent, in which case nothing is cached.
//! - [`HtmlCacheDeriver`] wraps every view rendered with an `.html`
//!   renderer. After the view runs it schedules a cache-store callback with
//!   the keys `["all-html", <renderer name>]` and a callback that adds
//!   `PyPI-Locale` to the response's `Vary` header.
//! - [`SurrogateKeyCache`] is an [`OriginCache`] that tags responses with
//!   `Surrogate-Key`/`Surrogate-Control` headers for a Fastly-style edge.
//! - [`add_vary_callback`] builds response callbacks that extend `Vary`.

use crate::http::{Request, Response};

pub mod derivers;
pub mod http;
pub mod surrogate;

pub use derivers::{HtmlCacheDeriver, VaryCallbackFactory, html_cache_deriver};
pub use http::{add_vary, add_vary_callback};
pub use surrogate::{CachePolicy, SurrogateKeyCache};

/// Cache key attached to every cached HTML page, so all of them can be purged at once.
pub const ALL_HTML_KEY: &str = "all-html";

/// Request dimension HTML responses vary by.
pub const LOCALE_VARY: &str = "PyPI-Locale";

/// An origin caching service.
///
/// Implementations mark `response` as cacheable under `keys`. They run as
/// response callbacks, after the view has produced the response and before
/// it is serialized.
pub trait OriginCache: Send + Sync {
    fn cache(&self, keys: &[String], request: &Request, response: &mut Response);
}
