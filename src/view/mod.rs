//! Views, their route metadata, and the derivers that decorate them.
//!
//! A [`View`] turns a [`Context`] and a [`Request`] into a [`Response`].
//! When a route is registered, the router runs every configured
//! [`ViewDeriver`] over the view exactly once (the decoration phase). A
//! deriver either hands the view back untouched or returns a wrapper that
//! adds behavior around every call.
//!
//! ```
//! use origin_cache::context::Context;
//! use origin_cache::http::{Method, Request, Response, StatusCode};
//! use origin_cache::view::{ViewError, view_fn};
//!
//! let view = view_fn(|_ctx: &Context, _req: &mut Request| -> Result<Response, ViewError> {
//!     Ok(Response::new(StatusCode::Ok).body("<h1>hi</h1>"))
//! });
//!
//! let mut request = Request::new(Method::Get, "/");
//! let response = view(&Context::new(), &mut request).unwrap();
//! assert_eq!(response.status(), StatusCode::Ok);
//! ```

use std::sync::Arc;

use thiserror::Error;

use crate::context::Context;
use crate::http::{Request, Response, StatusCode};

/// Type-erased, reference-counted view function.
///
/// Views are shared across Tokio tasks by the router, so they must be
/// `Send + Sync`. Cloning a `View` clones the [`Arc`], which lets derivers
/// return the very same view when they decide not to wrap it.
pub type View =
    Arc<dyn Fn(&Context, &mut Request) -> Result<Response, ViewError> + Send + Sync + 'static>;

/// Wraps a closure or function as a [`View`].
pub fn view_fn<F>(view: F) -> View
where
    F: Fn(&Context, &mut Request) -> Result<Response, ViewError> + Send + Sync + 'static,
{
    Arc::new(view)
}

/// Errors a view can fail with.
///
/// Derivers never catch these; they travel unchanged to the router, which
/// turns them into error responses.
#[derive(Debug, Error)]
pub enum ViewError {
    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The view could not produce its output.
    #[error("rendering failed: {0}")]
    Render(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ViewError {
    /// The status code the router answers with for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NotFound,
            Self::Render(_) | Self::Other(_) => StatusCode::InternalServerError,
        }
    }
}

/// The renderer configured for a view, identified by its template or format name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Renderer {
    name: String,
}

impl Renderer {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The renderer name, e.g. `"packaging/detail.html"` or `"json"`.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Static options a view was registered with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewOptions {
    renderer: Option<Renderer>,
}

impl ViewOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the renderer the view's output is produced with.
    #[must_use]
    pub fn renderer(mut self, name: impl Into<String>) -> Self {
        self.renderer = Some(Renderer::new(name));
        self
    }

    pub fn get_renderer(&self) -> Option<&Renderer> {
        self.renderer.as_ref()
    }
}

/// Route metadata handed to derivers at registration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewInfo {
    route_name: String,
    options: ViewOptions,
}

impl ViewInfo {
    pub fn new(route_name: impl Into<String>, options: ViewOptions) -> Self {
        Self {
            route_name: route_name.into(),
            options,
        }
    }

    pub fn route_name(&self) -> &str {
        &self.route_name
    }

    pub fn options(&self) -> &ViewOptions {
        &self.options
    }
}

/// A hook that decorates views once, when their route is registered.
///
/// # Contract
///
/// - `derive` runs at configuration time only and must be free of side effects.
/// - Returning `view` itself (not a clone of its behavior) signals that no
///   wrapping was needed.
/// - A returned wrapper must not hold state shared between requests.
pub trait ViewDeriver: Send + Sync {
    fn derive(&self, view: View, info: &ViewInfo) -> View;
}
