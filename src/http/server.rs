//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router for the download endpoint family
//! - Wire up middleware (request ID, tracing, CORS)
//! - Serve plain HTTP or TLS until shutdown is signalled

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{rejection::PathRejection, ConnectInfo, Path, State},
    http::{HeaderValue, Request},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::geo::GeoClassifier;
use crate::http::handler::GatewayHandler;
use crate::http::request::{AccessRequest, UuidRequestId};
use crate::lifecycle::shutdown;
use crate::security::headers::CORS_HEADERS;

/// How long TLS connections may keep draining after shutdown starts.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<GatewayHandler>,
}

/// HTTP server for the download gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Build the gateway and its router. Fails only if an HTTP client cannot be created.
    pub fn new(config: &GatewayConfig, geo: GeoClassifier) -> Result<Self, reqwest::Error> {
        let state = AppState {
            gateway: Arc::new(GatewayHandler::new(config, geo)?),
        };

        Ok(Self {
            router: Self::build_router(state),
        })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers run outermost first: request ID, trace, propagate ID, CORS.
    fn build_router(state: AppState) -> Router {
        let router = Router::new()
            .route("/", any(root_handler))
            .route("/{*path}", any(path_handler))
            .with_state(state);

        CORS_HEADERS
            .into_iter()
            .fold(router, |router, (name, value)| {
                router.layer(SetResponseHeaderLayer::overriding(
                    name,
                    HeaderValue::from_static(value),
                ))
            })
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                // The query carries the signature; keep it out of the logs.
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown"),
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// The router, for embedding or driving in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve plain HTTP on `listener` until `shutdown_rx` fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown_rx))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown_rx` fires, then drain.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            shutdown::wait(shutdown_rx).await;
            drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

async fn root_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    serve(state, "/".to_string(), request).await
}

/// `path` arrives percent-decoded and without its leading slash.
async fn path_handler(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    request: Request<Body>,
) -> Response {
    match path {
        Ok(Path(path)) => serve(state, format!("/{}", path), request).await,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected undecodable path");
            GatewayError::InvalidPath(rejection.body_text()).into_response()
        }
    }
}

async fn serve(state: AppState, path: String, request: Request<Body>) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let access = AccessRequest::from_request(path, &request, peer);
    state.gateway.handle(access).await
}
