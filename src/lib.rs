//! # origin-cache
//!
//! Origin (edge/CDN) cache tagging for HTML views, on top of a small
//! HTTP/1.1 view framework.
//!
//! Views registered with an `.html` renderer are wrapped by
//! [`HtmlCacheDeriver`](cache::HtmlCacheDeriver). When the deployment has an
//! [`OriginCache`](cache::OriginCache) registered, every such response is
//! tagged with the cache keys `["all-html", <renderer name>]` and marked as
//! varying by `PyPI-Locale`. Without one, responses pass through untouched.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use origin_cache::cache::{HtmlCacheDeriver, OriginCache, SurrogateKeyCache};
//! use origin_cache::context::Context;
//! use origin_cache::http::{Method, Request, Response, StatusCode};
//! use origin_cache::router::Router;
//! use origin_cache::services::ServiceRegistry;
//! use origin_cache::view::ViewOptions;
//!
//! let mut services = ServiceRegistry::new();
//! services.register::<dyn OriginCache>(Arc::new(SurrogateKeyCache::default()));
//!
//! let mut router = Router::new()
//!     .with_deriver(HtmlCacheDeriver::new())
//!     .with_services(services);
//! router.get("/", "index", ViewOptions::new().renderer("index.html"), |_ctx: &Context, _req: &mut Request| {
//!     Ok(Response::new(StatusCode::Ok).body("<h1>Hello</h1>"))
//! });
//!
//! let response = router.dispatch(Request::new(Method::Get, "/"));
//! assert_eq!(response.headers().get("Surrogate-Key"), Some("all-html index.html"));
//! assert_eq!(response.headers().get("Vary"), Some("PyPI-Locale"));
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod http;
pub mod router;
pub mod server;
pub mod services;
pub mod view;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{HtmlCacheDeriver, OriginCache, SurrogateKeyCache};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
pub use view::{View, ViewDeriver, ViewError, ViewInfo, ViewOptions};
