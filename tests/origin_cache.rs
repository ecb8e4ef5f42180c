use std::sync::Arc;

use origin_cache::config::OriginCacheConfig;
use origin_cache::context::Context;
use origin_cache::services::ServiceRegistry;
use origin_cache::{HtmlCacheDeriver, Request, Response, Router, Server, StatusCode, ViewError, ViewOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn detail(ctx: &Context, _req: &mut Request) -> Result<Response, ViewError> {
    match ctx.params().get("name") {
        Some("missing") => Err(ViewError::NotFound("missing".to_owned())),
        Some(name) => Ok(Response::new(StatusCode::Ok)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(format!("<h1>{name}</h1>"))),
        None => Err(ViewError::Render("no project name".to_owned())),
    }
}

fn json(_ctx: &Context, _req: &mut Request) -> Result<Response, ViewError> {
    Ok(Response::new(StatusCode::Ok)
        .header("Content-Type", "application/json")
        .body("{}"))
}

fn build_router(config: &str) -> Router {
    let mut services = ServiceRegistry::new();
    OriginCacheConfig::from_json(config)
        .unwrap()
        .register(&mut services);

    let mut router = Router::new()
        .with_deriver(HtmlCacheDeriver::new())
        .with_services(services);
    router.get(
        "/project/:name",
        "packaging.project",
        ViewOptions::new().renderer("packaging/detail.html"),
        detail,
    );
    router.get(
        "/pypi/:name/json",
        "legacy.api.json.project",
        ViewOptions::new().renderer("json"),
        json,
    );
    router
}

async fn fetch(addr: std::net::SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    String::from_utf8(raw).unwrap()
}

async fn spawn(router: Router) -> std::net::SocketAddr {
    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();
    tokio::spawn(server.serve(Arc::new(router)));
    addr
}

#[test]
fn enabled_config_tags_html_only() {
    init_tracing();
    let router = build_router(r#"{"enabled": true, "seconds": 86400, "stale_if_error": 300}"#);

    let html = router.dispatch(Request::new(origin_cache::Method::Get, "/project/flask/"));
    assert_eq!(html.status(), StatusCode::Ok);
    assert_eq!(
        html.headers().get("surrogate-key"),
        Some("all-html packaging/detail.html")
    );
    assert_eq!(
        html.headers().get("surrogate-control"),
        Some("max-age=86400, stale-if-error=300")
    );
    assert_eq!(html.vary(), vec!["PyPI-Locale"]);

    let api = router.dispatch(Request::new(origin_cache::Method::Get, "/pypi/flask/json"));
    assert_eq!(api.status(), StatusCode::Ok);
    assert!(!api.headers().contains("surrogate-key"));
    assert!(!api.headers().contains("vary"));
}

#[test]
fn disabled_config_leaves_html_untouched() {
    init_tracing();
    let router = build_router("{}");

    let html = router.dispatch(Request::new(origin_cache::Method::Get, "/project/flask/"));
    assert_eq!(html.status(), StatusCode::Ok);
    assert_eq!(html.body_ref(), b"<h1>flask</h1>");
    assert!(!html.headers().contains("surrogate-key"));
    assert!(!html.headers().contains("vary"));
}

#[test]
fn view_errors_are_not_cached() {
    init_tracing();
    let router = build_router(r#"{"enabled": true}"#);

    let res = router.dispatch(Request::new(origin_cache::Method::Get, "/project/missing"));
    assert_eq!(res.status(), StatusCode::NotFound);
    assert!(!res.headers().contains("surrogate-key"));
}

#[tokio::test]
async fn served_html_carries_cache_headers() {
    init_tracing();
    let addr = spawn(build_router(r#"{"enabled": true, "seconds": 60}"#)).await;

    let text = fetch(addr, "/project/requests").await;
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.contains("Surrogate-Key: all-html packaging/detail.html\r\n"));
    assert!(text.contains("Surrogate-Control: max-age=60\r\n"));
    assert!(text.contains("Vary: PyPI-Locale\r\n"));
    assert!(text.contains("Connection: close\r\n"));
    assert!(text.ends_with("<h1>requests</h1>"));
}

#[tokio::test]
async fn served_unknown_path_is_404() {
    init_tracing();
    let addr = spawn(build_router("{}")).await;

    let text = fetch(addr, "/nope").await;
    assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(!text.contains("Surrogate-Key"));
}

#[tokio::test]
async fn served_overflowing_content_length_is_413() {
    init_tracing();
    let addr = spawn(build_router("{}")).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("POST /project/flask HTTP/1.1\r\nContent-Length: {}\r\n\r\n", usize::MAX);
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8(raw).unwrap();
    assert!(text.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
}

#[tokio::test]
async fn shutdown_stops_the_listener() {
    init_tracing();
    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(server.serve_with_shutdown(Arc::new(build_router("{}")), async {
        let _ = rx.await;
    }));

    tx.send(()).unwrap();
    let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}
