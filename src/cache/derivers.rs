//! View deriver that marks HTML responses for origin caching.

use std::fmt;
use std::sync::Arc;

use super::{ALL_HTML_KEY, LOCALE_VARY, OriginCache, add_vary_callback};
use crate::context::Context;
use crate::http::{Request, ResponseCallback};
use crate::view::{View, ViewDeriver, ViewError, ViewInfo, view_fn};

/// Renderer names ending with this suffix produce cacheable HTML.
const HTML_SUFFIX: &str = ".html";

/// Builds the response callback that adds header names to `Vary`.
pub type VaryCallbackFactory = Arc<dyn Fn(&[&str]) -> ResponseCallback + Send + Sync + 'static>;

/// Wraps views rendered with an `.html` renderer so their responses are
/// handed to the request's [`OriginCache`], if one is available.
///
/// # Decoration
///
/// Views without a renderer, or whose renderer name does not end in
/// `.html`, are returned unchanged (the same [`Arc`]).
///
/// # Per request
///
/// The wrapper calls the inner view first; its error, if any, is returned
/// as-is. It then looks up `dyn OriginCache` on the request. When none is
/// registered the response is returned without further work. Otherwise two
/// response callbacks are appended, in this order:
///
/// 1. `cache.cache(["all-html", <renderer name>], request, response)`
/// 2. the callback the vary factory builds for `["PyPI-Locale"]`; the
///    factory is called while registering, once per request
///
/// The response itself is returned unmodified; the callbacks decorate it later.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use origin_cache::cache::{HtmlCacheDeriver, OriginCache, SurrogateKeyCache};
/// use origin_cache::context::Context;
/// use origin_cache::http::{Method, Request, Response, StatusCode};
/// use origin_cache::services::ServiceRegistry;
/// use origin_cache::view::{ViewDeriver, ViewInfo, ViewOptions, view_fn};
/// # fn route_context() -> Context {
/// #     Context::for_route("index", origin_cache::context::PathParams::new())
/// # }
///
/// let view = view_fn(|_ctx: &Context, _req: &mut Request| Ok(Response::new(StatusCode::Ok)));
/// let info = ViewInfo::new("index", ViewOptions::new().renderer("index.html"));
/// let derived = HtmlCacheDeriver::new().derive(view, &info);
///
/// let mut services = ServiceRegistry::new();
/// services.register::<dyn OriginCache>(Arc::new(SurrogateKeyCache::default()));
/// let mut request = Request::new(Method::Get, "/");
/// request.set_services(Arc::new(services));
///
/// let mut response = derived(&route_context(), &mut request).unwrap();
/// request.process_response_callbacks(&mut response);
///
/// assert_eq!(response.headers().get("surrogate-key"), Some("all-html index.html"));
/// assert_eq!(response.vary(), vec!["PyPI-Locale"]);
/// ```
#[derive(Clone)]
pub struct HtmlCacheDeriver {
    vary: VaryCallbackFactory,
}

impl HtmlCacheDeriver {
    /// Creates a deriver that uses [`add_vary_callback`] for the vary signal.
    pub fn new() -> Self {
        Self::with_vary_factory(Arc::new(add_vary_callback))
    }

    /// Creates a deriver with a custom vary-callback factory.
    pub fn with_vary_factory(vary: VaryCallbackFactory) -> Self {
        Self { vary }
    }
}

impl Default for HtmlCacheDeriver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HtmlCacheDeriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlCacheDeriver").finish_non_exhaustive()
    }
}

impl ViewDeriver for HtmlCacheDeriver {
    fn derive(&self, view: View, info: &ViewInfo) -> View {
        let Some(renderer) = info.options().get_renderer() else {
            return view;
        };
        if !renderer.name().ends_with(HTML_SUFFIX) {
            return view;
        }

        let renderer_name = renderer.name().to_owned();
        let vary = Arc::clone(&self.vary);

        view_fn(
            move |context: &Context, request: &mut Request| -> Result<_, ViewError> {
                let response = view(context, request)?;

                let cacher = match request.find_service::<dyn OriginCache>() {
                    Ok(cacher) => cacher,
                    Err(err) => {
                        tracing::trace!(error = %err, "origin cache unavailable, not caching");
                        return Ok(response);
                    }
                };

                let keys = vec![ALL_HTML_KEY.to_owned(), renderer_name.clone()];
                request.add_response_callback(move |request, response| {
                    cacher.cache(&keys, request, response);
                });

                request.add_response_callback(vary(&[LOCALE_VARY]));

                Ok(response)
            },
        )
    }
}

/// Applies a default [`HtmlCacheDeriver`] to `view`.
pub fn html_cache_deriver(view: View, info: &ViewInfo) -> View {
    HtmlCacheDeriver::new().derive(view, info)
}
