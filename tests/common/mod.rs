//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, post},
    Json, Router,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tracing_subscriber::fmt::MakeWriter;

use download_gateway::config::GatewayConfig;
use download_gateway::geo::{CountryLookup, GeoClassifier, GeoLookupError};
use download_gateway::http::HttpServer;
use download_gateway::lifecycle::Shutdown;

pub const TOKEN: &str = "integration-token";

/// Full body served by the mock file host.
pub const FILE_BODY: &str = "hello, partial world";

/// Bind an ephemeral port and serve `router` on it.
async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Mock `/api/fs/link` endpoint answering every call with a fixed envelope.
pub struct LinkService {
    pub addr: SocketAddr,
    calls: Arc<AtomicU32>,
    seen: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

#[derive(Clone)]
struct LinkState {
    reply: Value,
    calls: Arc<AtomicU32>,
    seen: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

impl LinkService {
    pub async fn start(reply: Value) -> Self {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let state = LinkState {
            reply,
            calls: calls.clone(),
            seen: seen.clone(),
        };

        let router = Router::new()
            .route("/api/fs/link", post(link_endpoint))
            .with_state(state);

        Self {
            addr: spawn(router).await,
            calls,
            seen,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Authorization header and JSON body of every call so far.
    pub fn requests(&self) -> Vec<(Option<String>, Value)> {
        self.seen.lock().unwrap().clone()
    }
}

async fn link_endpoint(
    State(state): State<LinkState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.calls.fetch_add(1, Ordering::SeqCst);
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.seen.lock().unwrap().push((auth, body));
    Json(state.reply.clone())
}

/// Envelope for a successful link resolution.
pub fn link_ok(url: &str, header: Value) -> Value {
    serde_json::json!({
        "code": 200,
        "message": "success",
        "data": { "url": url, "header": header }
    })
}

/// Mock file host. Honors `Range: bytes=0-4` with a 206 and misbehaves the way
/// real storage backends do: Set-Cookie, its own CORS headers.
pub struct FileHost {
    pub addr: SocketAddr,
    calls: Arc<AtomicU32>,
}

impl FileHost {
    pub async fn start() -> Self {
        let calls = Arc::new(AtomicU32::new(0));
        let router = Router::new()
            .route("/{*path}", any(file_endpoint))
            .with_state(calls.clone());

        Self {
            addr: spawn(router).await,
            calls,
        }
    }

    /// Protocol-relative link to `path` on this host.
    pub fn link(&self, path: &str) -> String {
        format!("//{}{}", self.addr, path)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

async fn file_endpoint(
    State(calls): State<Arc<AtomicU32>>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    calls.fetch_add(1, Ordering::SeqCst);

    let echo = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    };
    let seen_range = echo("range");
    let seen_hint = echo("x-upstream-hint");
    let seen_host = echo("host");
    let seen_request_id = echo("x-request-id");

    let (status, body) = if seen_range == "bytes=0-4" {
        (StatusCode::PARTIAL_CONTENT, FILE_BODY[..5].to_string())
    } else {
        (StatusCode::OK, FILE_BODY.to_string())
    };

    let mut response = (
        status,
        [
            ("set-cookie", "session=upstream".to_string()),
            ("access-control-allow-origin", "https://storage.example".to_string()),
            ("access-control-allow-methods", "PUT".to_string()),
            ("accept-ranges", "bytes".to_string()),
            ("x-seen-range", seen_range),
            ("x-seen-hint", seen_hint),
            ("x-seen-host", seen_host),
            ("x-seen-request-id", seen_request_id),
            ("x-seen-method", method.to_string()),
        ],
        body,
    )
        .into_response();

    if status == StatusCode::PARTIAL_CONTENT {
        response.headers_mut().insert(
            "content-range",
            format!("bytes 0-4/{}", FILE_BODY.len()).parse().unwrap(),
        );
    }
    response
}

/// Country table standing in for the MaxMind database.
pub struct FakeCountries(HashMap<IpAddr, &'static str>);

impl FakeCountries {
    /// 127.0.0.1 is domestic (CN); 8.8.8.8 is US; 192.0.2.1 errors.
    pub fn standard() -> Self {
        Self(HashMap::from([
            ("127.0.0.1".parse().unwrap(), "CN"),
            ("8.8.8.8".parse().unwrap(), "US"),
        ]))
    }
}

impl CountryLookup for FakeCountries {
    fn country_code(&self, ip: IpAddr) -> Result<Option<String>, GeoLookupError> {
        if ip == "192.0.2.1".parse::<IpAddr>().unwrap() {
            return Err(GeoLookupError("corrupt record".into()));
        }
        Ok(self.0.get(&ip).map(|code| code.to_string()))
    }
}

/// Gateway config pointing at `link_service`.
pub fn gateway_config(link_service: &str) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.address = link_service.to_string();
    config.upstream.token = TOKEN.into();
    config.upstream.link_timeout_secs = 5;
    config.upstream.fetch_timeout_secs = 5;
    config.upstream.connect_timeout_secs = 2;
    config
}

/// A running gateway. Shuts down when dropped.
pub struct Gateway {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl Gateway {
    pub async fn start(config: GatewayConfig) -> Self {
        let geo = GeoClassifier::new(Arc::new(FakeCountries::standard()), "CN");
        let server = HttpServer::new(&config, geo).unwrap();

        let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = server.run(listener, rx).await;
        });

        Self { addr, shutdown }
    }

    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

/// In-memory sink for log output, for asserting on what the gateway reported.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Install a DEBUG-level subscriber writing here for the current thread.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(self.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
