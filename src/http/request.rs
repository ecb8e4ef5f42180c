//! HTTP/1.1 request parsing using the [`httparse`] crate, plus the
//! request-scoped hooks views use: service lookup and response callbacks.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method, Response};
use crate::services::{LookupError, ServiceRegistry};

/// A deferred action run after the view has produced its response and
/// before the response is serialized.
///
/// Callbacks receive the finalized request and a mutable handle to the
/// response, so they can observe or decorate it (e.g. add cache headers).
pub type ResponseCallback = Box<dyn FnOnce(&Request, &mut Response) + Send + 'static>;

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete — more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

/// An HTTP/1.1 request together with its per-request framework state.
///
/// Usually created by [`Request::parse`] from a raw byte buffer. The body is
/// stored as a [`Bytes`] buffer.
///
/// # Examples
///
/// ```
/// use origin_cache::http::request::Request;
///
/// let raw = b"GET /hello?name=world HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.path(), "/hello");
/// assert_eq!(request.query_param("name"), Some("world"));
/// assert_eq!(request.headers().get("host"), Some("localhost"));
/// ```
pub struct Request {
    method: Method,
    path: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    query: Option<String>,
    body: Bytes,
    params: HashMap<String, String>,
    services: Option<Arc<ServiceRegistry>>,
    response_callbacks: Vec<ResponseCallback>,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Creates an HTTP/1.1 request with no headers, query, or body.
    ///
    /// # Examples
    ///
    /// ```
    /// use origin_cache::http::{Method, Request};
    ///
    /// let request = Request::new(Method::Get, "/simple/");
    /// assert_eq!(request.path(), "/simple/");
    /// assert_eq!(request.response_callback_count(), 0);
    /// ```
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            version: 1,
            headers: Headers::new(),
            query: None,
            body: Bytes::new(),
            params: HashMap::new(),
            services: None,
            response_callbacks: Vec::new(),
        }
    }

    /// Parse a raw HTTP/1.1 request from a byte slice.
    ///
    /// Returns the parsed `Request` and the byte offset at which the body begins
    /// in `buf` (i.e. immediately after the `\r\n\r\n` header terminator).
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`] — more data is needed to complete the request headers.
    /// - [`RequestError::Parse`] — the data is malformed and cannot be parsed.
    /// - [`RequestError::MissingField`] — a required field (method, path, version) is absent.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method = match raw_req.method {
            Some(m) => m.parse::<Method>().unwrap_or_else(|never| match never {}),
            None => return Err(RequestError::MissingField { field: "method" }),
        };

        let raw_path = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;

        let (path, query) = match raw_path.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (raw_path.to_owned(), None),
        };

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        let params = query.as_deref().map(parse_query_string).unwrap_or_default();
        let body = Bytes::copy_from_slice(&buf[body_offset..]);

        Ok((
            Self {
                method,
                path,
                version,
                headers: header_map,
                query,
                body,
                params,
                services: None,
                response_callbacks: Vec::new(),
            },
            body_offset,
        ))
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path (without the query string).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the request headers for in-place modification.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns a parsed query parameter value by key.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns the request body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns `true` if the connection should be kept alive after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive. HTTP/1.0 defaults to close unless
    /// `Connection: keep-alive` is explicitly set.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1, // HTTP/1.1 default: keep-alive
        }
    }

    /// Returns the value of the `Content-Length` header parsed as a `usize`, if present.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.parse().ok()
    }

    // Drops body bytes past `len`, e.g. a pipelined request that arrived in
    // the same read.
    pub(crate) fn truncate_body(&mut self, len: usize) {
        self.body.truncate(len);
    }

    /// Attaches the application's service registry to this request.
    pub fn set_services(&mut self, services: Arc<ServiceRegistry>) {
        self.services = Some(services);
    }

    /// Looks up the service registered for interface `T`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::NotFound`] when no registry is attached or the
    /// registry holds nothing for `T`.
    pub fn find_service<T>(&self) -> Result<Arc<T>, LookupError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        match &self.services {
            Some(services) => services.find::<T>(),
            None => Err(LookupError::NotFound {
                interface: std::any::type_name::<T>(),
            }),
        }
    }

    /// Appends a callback to run once the response has been produced.
    ///
    /// Callbacks run in insertion order. Existing entries are never replaced.
    pub fn add_response_callback<F>(&mut self, callback: F)
    where
        F: FnOnce(&Request, &mut Response) + Send + 'static,
    {
        self.response_callbacks.push(Box::new(callback));
    }

    /// Number of response callbacks registered so far.
    pub fn response_callback_count(&self) -> usize {
        self.response_callbacks.len()
    }

    /// Removes and returns the registered callbacks, in insertion order.
    pub fn take_response_callbacks(&mut self) -> Vec<ResponseCallback> {
        std::mem::take(&mut self.response_callbacks)
    }

    /// Runs every registered response callback against `response`, in order.
    ///
    /// The callback list is drained, so calling this twice runs each callback once.
    pub fn process_response_callbacks(&mut self, response: &mut Response) {
        for callback in self.take_response_callbacks() {
            callback(&*self, &mut *response);
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("version", &self.version)
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("body_len", &self.body.len())
            .field("services", &self.services)
            .field("response_callbacks", &self.response_callbacks.len())
            .finish()
    }
}

/// Parses a URL query string (`key=value&key2=value2`) into a `HashMap`.
///
/// Keys and values have `+` decoded as a space; percent-decoding is not performed.
fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key.replace('+', " "), value.replace('+', " "))
        })
        .collect()
}
