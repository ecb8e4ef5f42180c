//! Tokio TCP front end for a [`Router`].
//!
//! Each connection is read into a buffer and cut into request frames by
//! [`next_frame`]. Frames are dispatched in order, so pipelined requests on a
//! keep-alive connection are answered one after another. Oversized or
//! malformed input is answered with 413 or 400 and the connection is closed.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::http::{Request, RequestError, Response, StatusCode};
use crate::router::Router;

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Largest request (head plus body) accepted on a connection (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

const INITIAL_BUF_SIZE: usize = 4096;

/// The outcome of trying to cut one request out of a connection buffer.
#[derive(Debug)]
enum Frame {
    /// A complete request occupying the first `consumed` bytes.
    Request { request: Request, consumed: usize },
    /// More bytes are needed.
    Incomplete,
    /// The input can never form an acceptable request.
    Reject(Response),
}

fn too_large() -> Response {
    Response::new(StatusCode::PayloadTooLarge)
        .body("Request entity too large")
        .keep_alive(false)
}

// Frames the first request in `buf`. The declared body length is checked
// against MAX_REQUEST_SIZE before waiting for it, so a huge Content-Length
// is refused up front instead of being buffered.
fn next_frame(buf: &[u8]) -> Frame {
    let (mut request, body_offset) = match Request::parse(buf) {
        Ok(pair) => pair,
        Err(RequestError::Incomplete) if buf.len() > MAX_REQUEST_SIZE => return Frame::Reject(too_large()),
        Err(RequestError::Incomplete) => return Frame::Incomplete,
        Err(e) => {
            return Frame::Reject(
                Response::new(StatusCode::BadRequest)
                    .body(format!("Bad Request: {e}"))
                    .keep_alive(false),
            );
        }
    };

    let content_length = request.content_length().unwrap_or(0);
    let consumed = match body_offset.checked_add(content_length) {
        Some(total) if total <= MAX_REQUEST_SIZE => total,
        _ => return Frame::Reject(too_large()),
    };
    if buf.len() < consumed {
        return Frame::Incomplete;
    }

    request.truncate_body(content_length);
    Frame::Request { request, consumed }
}

/// The HTTP server.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use origin_cache::cache::HtmlCacheDeriver;
/// use origin_cache::config::OriginCacheConfig;
/// use origin_cache::context::Context;
/// use origin_cache::http::{Request, Response, StatusCode};
/// use origin_cache::router::Router;
/// use origin_cache::server::Server;
/// use origin_cache::services::ServiceRegistry;
/// use origin_cache::view::ViewOptions;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut services = ServiceRegistry::new();
///     OriginCacheConfig::from_path("origin-cache.json")?.register(&mut services);
///
///     let mut router = Router::new()
///         .with_deriver(HtmlCacheDeriver::new())
///         .with_services(services);
///     router.get("/", "index", ViewOptions::new().renderer("index.html"), |_ctx: &Context, _req: &mut Request| {
///         Ok(Response::new(StatusCode::Ok).body("<h1>Hello!</h1>"))
///     });
///
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server
///         .serve_with_shutdown(Arc::new(router), async {
///             let _ = tokio::signal::ctrl_c().await;
///         })
///         .await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections forever, dispatching requests to `router`.
    pub async fn serve(self, router: Arc<Router>) -> Result<(), ServerError> {
        self.serve_with_shutdown(router, std::future::pending()).await
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// Connections already accepted keep running on their own tasks; only
    /// the listener stops.
    pub async fn serve_with_shutdown<F>(self, router: Arc<Router>, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!(address = %self.local_addr, routes = router.len(), "listening");
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => {
                    info!(address = %self.local_addr, "shutting down listener");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer_addr) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let router = Arc::clone(&router);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, router).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    router: Arc<Router>,
) -> Result<(), std::io::Error> {
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        // Answer everything already buffered before reading again.
        loop {
            match next_frame(&buf) {
                Frame::Incomplete => break,
                Frame::Reject(response) => {
                    warn!(peer = %peer_addr, status = %response.status(), "rejecting request");
                    stream.write_all(&response.into_bytes()).await?;
                    return Ok(());
                }
                Frame::Request { request, consumed } => {
                    let _ = buf.split_to(consumed);
                    let keep_alive = request.is_keep_alive();
                    debug!(
                        peer = %peer_addr,
                        method = %request.method(),
                        path = %request.path(),
                        "dispatching request"
                    );

                    let response = router.dispatch(request).keep_alive(keep_alive);
                    stream.write_all(&response.into_bytes()).await?;
                    stream.flush().await?;

                    if !keep_alive {
                        return Ok(());
                    }
                }
            }
        }

        if stream.read_buf(&mut buf).await? == 0 {
            debug!(peer = %peer_addr, "connection closed by peer");
            return Ok(());
        }
    }
}
