//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header::CONTENT_TYPE, header::SET_COOKIE, HeaderMap, Method, Request, StatusCode},
    response::Response,
    Router,
};
use jsonwebtoken::Algorithm;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use edge_gateway::config::{GatewayConfig, UpstreamConfig};
use edge_gateway::security::token::{Claims, TokenSigner};
use edge_gateway::{HttpServer, Shutdown};

pub const TEST_SECRET: &str = "integration-test-secret";

/// One request as the origin received it.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone)]
struct OriginState {
    name: &'static str,
    requests: Arc<Mutex<Vec<Captured>>>,
}

/// A recording echo origin.
///
/// Responds with the request body verbatim, the status named in an
/// `x-mock-status` request header (default 200), two `Set-Cookie` values,
/// and its own `x-request-id` that the gateway is expected to overwrite.
pub struct MockOrigin {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Captured>>>,
}

impl MockOrigin {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last(&self) -> Captured {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("origin received no requests")
    }
}

async fn echo(State(state): State<OriginState>, req: Request<Body>) -> Response {
    let (parts, body) = req.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();

    let status = parts
        .headers
        .get("x-mock-status")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u16>().ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK);
    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| "application/octet-stream".parse().unwrap());

    state.requests.lock().unwrap().push(Captured {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body: body.clone(),
    });

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .header("x-origin", state.name)
        .header("x-request-id", "origin-generated")
        .header(SET_COOKIE, "session=abc; Path=/")
        .header(SET_COOKIE, "theme=dark; Path=/")
        .body(Body::from(body))
        .unwrap()
}

/// Start a recording echo origin on an ephemeral port.
pub async fn start_mock_origin(name: &'static str) -> MockOrigin {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));

    let app = Router::new().fallback(echo).with_state(OriginState {
        name,
        requests: requests.clone(),
    });
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockOrigin { addr, requests }
}

/// An origin that accepts connections and never answers.
pub async fn start_silent_origin() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// An origin that sends a response head promising 100 bytes, delivers
/// three of them, and then goes silent.
pub async fn start_stalling_origin() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\nabc")
                    .await;
                tokio::time::sleep(Duration::from_secs(60)).await;
            });
        }
    });
    addr
}

/// An address with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Defaults pointed at the given origins, with a generous rate limit.
pub fn test_config(users_url: &str, orders_url: &str) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstreams = vec![
        UpstreamConfig {
            name: "users".into(),
            url: users_url.into(),
        },
        UpstreamConfig {
            name: "orders".into(),
            url: orders_url.into(),
        },
    ];
    config.auth.jwt_secret = TEST_SECRET.into();
    config.rate_limit.capacity = 1_000;
    config.timeouts.connect_ms = 500;
    config.timeouts.request_ms = 2_000;
    config
}

/// A running gateway; shuts down when dropped.
pub struct TestGateway {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server = HttpServer::new(config).unwrap();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestGateway { addr, shutdown }
}

pub fn mint_token(user_id: &str, roles: &[&str]) -> String {
    let claims = Claims::new(user_id, roles.iter().copied(), Duration::from_secs(300));
    TokenSigner::new(TEST_SECRET.as_bytes(), Algorithm::HS256)
        .sign(&claims)
        .unwrap()
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}

pub async fn envelope(res: reqwest::Response) -> serde_json::Value {
    res.json().await.unwrap()
}
