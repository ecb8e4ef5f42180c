//! `Vary` header helpers for cacheable responses.

use crate::http::{Request, Response, ResponseCallback};

/// Builds a response callback that adds `varies` to the response's `Vary` header.
///
/// # Examples
///
/// ```
/// use origin_cache::cache::add_vary_callback;
/// use origin_cache::http::{Method, Request, Response, StatusCode};
///
/// let mut request = Request::new(Method::Get, "/");
/// request.add_response_callback(add_vary_callback(&["PyPI-Locale"]));
///
/// let mut response = Response::new(StatusCode::Ok).header("Vary", "Cookie");
/// request.process_response_callbacks(&mut response);
/// assert_eq!(response.vary(), vec!["Cookie", "PyPI-Locale"]);
/// ```
pub fn add_vary_callback(varies: &[&str]) -> ResponseCallback {
    let varies: Vec<String> = varies.iter().map(|name| (*name).to_owned()).collect();
    Box::new(move |_request: &Request, response: &mut Response| {
        add_vary(response, varies.as_slice());
    })
}

/// Merges `varies` into the response's `Vary` header.
///
/// Header names compare case-insensitively. Names already present keep
/// their position and spelling; new ones are appended in the given order.
pub fn add_vary<S: AsRef<str>>(response: &mut Response, varies: &[S]) {
    let mut merged: Vec<String> = Vec::new();
    let existing = response.vary().into_iter().map(str::to_owned);
    let added = varies.iter().map(|name| name.as_ref().trim().to_owned());

    for name in existing.chain(added) {
        if !name.is_empty() && !merged.iter().any(|m| m.eq_ignore_ascii_case(&name)) {
            merged.push(name);
        }
    }

    response.set_vary(merged);
}
