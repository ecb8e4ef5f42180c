//! Request routing — map URL patterns and HTTP methods to views.
//!
//! [`Router`] owns the application's routes, the [`ViewDeriver`]s applied to
//! every view, and the shared [`ServiceRegistry`]. Three pattern styles are
//! supported:
//!
//! | Pattern              | Example match              | Captured params                 |
//! |----------------------|----------------------------|---------------------------------|
//! | `/simple`            | `/simple`                  | *(none)*                        |
//! | `/project/:name`     | `/project/requests`        | `name → "requests"`             |
//! | `/static/*`          | `/static/css/site.css`     | `wildcard → "/css/site.css"`    |
//!
//! Trailing slashes are normalized on both patterns and incoming paths.
//! Routes are matched in registration order; the first match wins.
//!
//! # Request lifecycle
//!
//! 1. The service registry is attached to the request.
//! 2. The matched route's (derived) view runs with a fresh [`Context`].
//! 3. On success, the request's response callbacks run in insertion order
//!    against the response, which is then returned.
//! 4. On failure, callbacks are dropped unrun and the [`ViewError`] becomes
//!    an error response.

use std::sync::Arc;

use crate::context::{Context, PathParams};
use crate::http::{Method, Request, Response, StatusCode};
use crate::services::ServiceRegistry;
use crate::view::{View, ViewDeriver, ViewError, ViewInfo, ViewOptions, view_fn};

// A single path segment, either a literal string or a named capture (`:name`).
#[derive(Debug, Clone)]
enum Segment {
    Static(String),
    Parameter(String),
}

// Compiled representation of a route pattern string.
#[derive(Debug, Clone)]
enum Pattern {
    Exact(String),
    Parameterized { segments: Vec<Segment> },
    Wildcard(String),
}

// Strips one trailing slash, leaving the root path alone.
fn normalize(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => path,
    }
}

impl Pattern {
    // Ends with `/*` → wildcard; contains `:` → parameterized; otherwise exact.
    fn parse(pattern: &str) -> Self {
        let pattern = normalize(pattern);

        if let Some(prefix) = pattern.strip_suffix("/*") {
            return Pattern::Wildcard(prefix.to_owned());
        }

        if pattern.contains(':') {
            let segments = pattern
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| match s.strip_prefix(':') {
                    Some(name) => Segment::Parameter(name.to_owned()),
                    None => Segment::Static(s.to_owned()),
                })
                .collect();
            return Pattern::Parameterized { segments };
        }

        Pattern::Exact(pattern.to_owned())
    }

    fn matches(&self, path: &str) -> Option<PathParams> {
        let path = normalize(path);

        match self {
            Pattern::Exact(p) => (p == path).then(PathParams::new),
            Pattern::Parameterized { segments } => {
                let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
                if parts.len() != segments.len() {
                    return None;
                }

                let mut params = PathParams::new();
                for (segment, part) in segments.iter().zip(parts) {
                    match segment {
                        Segment::Static(s) if s != part => return None,
                        Segment::Static(_) => {}
                        Segment::Parameter(name) => params.insert(name.clone(), part.to_owned()),
                    }
                }
                Some(params)
            }
            // The prefix must end on a segment boundary.
            Pattern::Wildcard(prefix) => path
                .strip_prefix(prefix.as_str())
                .filter(|suffix| suffix.is_empty() || suffix.starts_with('/'))
                .map(|suffix| {
                    let mut params = PathParams::new();
                    params.insert("wildcard".to_owned(), suffix.to_owned());
                    params
                }),
        }
    }
}

// A registered route: method + pattern bound to an already-derived view.
struct Route {
    method: Method,
    pattern: Pattern,
    info: ViewInfo,
    view: View,
}

impl Route {
    fn matches(&self, method: &Method, path: &str) -> Option<PathParams> {
        if &self.method == method {
            self.pattern.matches(path)
        } else {
            None
        }
    }
}

/// HTTP request router that dispatches requests to derived views.
///
/// Derivers are applied when a view is added, so configure them (with
/// [`with_deriver`](Self::with_deriver)) before registering routes.
///
/// # Examples
///
/// ```
/// use origin_cache::cache::HtmlCacheDeriver;
/// use origin_cache::context::Context;
/// use origin_cache::http::{Method, Request, Response, StatusCode};
/// use origin_cache::router::Router;
/// use origin_cache::view::ViewOptions;
///
/// let mut router = Router::new().with_deriver(HtmlCacheDeriver::new());
/// router.get(
///     "/project/:name",
///     "packaging.project",
///     ViewOptions::new().renderer("packaging/detail.html"),
///     |ctx: &Context, _req: &mut Request| {
///         let name = ctx.params().get("name").unwrap_or_default().to_owned();
///         Ok(Response::new(StatusCode::Ok).body(name))
///     },
/// );
///
/// let response = router.dispatch(Request::new(Method::Get, "/project/requests/"));
/// assert_eq!(response.status(), StatusCode::Ok);
/// assert_eq!(response.body_ref(), b"requests");
/// ```
pub struct Router {
    routes: Vec<Route>,
    derivers: Vec<Arc<dyn ViewDeriver>>,
    services: Arc<ServiceRegistry>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create a router with no routes, no derivers, and an empty service registry.
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            derivers: Vec::new(),
            services: Arc::new(ServiceRegistry::new()),
        }
    }

    /// Appends a deriver. Derivers run in the order they were added.
    #[must_use]
    pub fn with_deriver(mut self, deriver: impl ViewDeriver + 'static) -> Self {
        self.derivers.push(Arc::new(deriver));
        self
    }

    /// Sets the service registry attached to every dispatched request.
    #[must_use]
    pub fn with_services(mut self, services: ServiceRegistry) -> Self {
        self.services = Arc::new(services);
        self
    }

    /// Register a view for `GET` requests matching `pattern`.
    pub fn get<F>(&mut self, pattern: &str, name: &str, options: ViewOptions, view: F)
    where
        F: Fn(&Context, &mut Request) -> Result<Response, ViewError> + Send + Sync + 'static,
    {
        self.add_view(Method::Get, pattern, name, options, view_fn(view));
    }

    /// Register a view for `POST` requests matching `pattern`.
    pub fn post<F>(&mut self, pattern: &str, name: &str, options: ViewOptions, view: F)
    where
        F: Fn(&Context, &mut Request) -> Result<Response, ViewError> + Send + Sync + 'static,
    {
        self.add_view(Method::Post, pattern, name, options, view_fn(view));
    }

    /// Register `view` for `method` requests matching `pattern`.
    ///
    /// This is the decoration phase: every deriver sees the view exactly once, here.
    pub fn add_view(
        &mut self,
        method: Method,
        pattern: &str,
        name: &str,
        options: ViewOptions,
        view: View,
    ) {
        let info = ViewInfo::new(name, options);
        let view = self
            .derivers
            .iter()
            .fold(view, |view, deriver| deriver.derive(view, &info));

        tracing::debug!(%method, pattern, route = name, "route registered");
        self.routes.push(Route {
            method,
            pattern: Pattern::parse(pattern),
            info,
            view,
        });
    }

    /// Return the number of routes registered in this router.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Return `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatch `request` to the first matching route and return the finalized response.
    ///
    /// Unmatched requests get `404 Not Found`; view errors are mapped via
    /// [`ViewError::status`].
    pub fn dispatch(&self, mut request: Request) -> Response {
        request.set_services(Arc::clone(&self.services));

        let Some((route, params)) = self
            .routes
            .iter()
            .find_map(|route| Some((route, route.matches(request.method(), request.path())?)))
        else {
            tracing::debug!(method = %request.method(), path = request.path(), "no route matched");
            return Response::new(StatusCode::NotFound).body("Not Found");
        };

        let ctx = Context::for_route(route.info.route_name(), params);
        match (route.view)(&ctx, &mut request) {
            Ok(mut response) => {
                request.process_response_callbacks(&mut response);
                response
            }
            Err(err) => {
                let status = err.status();
                if status == StatusCode::NotFound {
                    tracing::warn!(route = route.info.route_name(), error = %err, "view raised not found");
                } else {
                    tracing::error!(route = route.info.route_name(), error = %err, "view failed");
                }
                Response::new(status).body(status.canonical_reason())
            }
        }
    }
}
