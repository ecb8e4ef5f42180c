//! Per-route view context — what the router knows about the matched route.
//!
//! Views receive a [`Context`] alongside the [`Request`](crate::http::Request).
//! The context is built fresh for every dispatched request and carries the
//! matched route's name and the path parameters captured by its pattern.

use std::collections::HashMap;

/// Path parameters extracted from the matched route pattern.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PathParams {
    map: HashMap<String, String>,
}

impl PathParams {
    /// Create a new empty parameters map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a captured value
    pub fn insert(&mut self, key: String, value: String) {
        self.map.insert(key, value);
    }

    /// Get a captured value by name
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// The context a view runs in.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Context {
    route_name: Option<String>,
    params: PathParams,
}

impl Context {
    /// Create an empty context, as used for views invoked outside routing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the context for a matched route.
    pub fn for_route(route_name: impl Into<String>, params: PathParams) -> Self {
        Self {
            route_name: Some(route_name.into()),
            params,
        }
    }

    /// Name of the matched route, if the view was reached through the router.
    pub fn route_name(&self) -> Option<&str> {
        self.route_name.as_deref()
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }
}
