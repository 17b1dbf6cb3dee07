//! Per-request gateway logic.
//!
//! # Responsibilities
//! - Run one request through preflight, method, signature, identity,
//!   link resolution and routing, in that order
//! - Turn every failure into a JSON error envelope
//!
//! # Data Flow
//! ```text
//! AccessRequest
//!     → OPTIONS?            → 204
//!     → GET/HEAD?           → 405 otherwise
//!     → verify sign         → 401
//!     → client ip / ua / geo
//!     → LinkResolver        → upstream code or 502
//!     → RoutingPolicy
//!         Direct → 302 Location
//!         Proxy  → StreamForwarder
//! ```
//!
//! # Design Decisions
//! - Shared state is immutable after construction; no locks on the request path
//! - CORS headers are added by the router layer, so every exit carries them

use std::time::Instant;

use axum::http::{header::LOCATION, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::geo::GeoClassifier;
use crate::http::request::AccessRequest;
use crate::observability::metrics;
use crate::routing::{RoutingDecision, RoutingPolicy};
use crate::security::SignatureVerifier;
use crate::upstream::{LinkError, LinkResolver, StreamForwarder};

/// Decision label used in metrics for requests that ended before routing.
const NO_DECISION: &str = "none";

/// Everything a request needs, built once at startup.
#[derive(Clone)]
pub struct GatewayHandler {
    /// `None` when signature checks are disabled.
    verifier: Option<SignatureVerifier>,
    geo: GeoClassifier,
    policy: RoutingPolicy,
    resolver: LinkResolver,
    forwarder: StreamForwarder,
}

impl GatewayHandler {
    pub fn new(config: &GatewayConfig, geo: GeoClassifier) -> Result<Self, reqwest::Error> {
        let verifier = if config.security.disable_sign {
            tracing::warn!("Signature verification is disabled");
            None
        } else {
            Some(SignatureVerifier::new(config.upstream.token.as_bytes()))
        };

        Ok(Self {
            verifier,
            geo,
            policy: RoutingPolicy::new(&config.routing.direct_user_agents),
            resolver: LinkResolver::new(&config.upstream)?,
            forwarder: StreamForwarder::new(&config.upstream)?,
        })
    }

    /// Serve one request to completion (or to the start of its streamed body).
    pub async fn handle(&self, request: AccessRequest) -> Response {
        let start = Instant::now();
        let method = request.method.to_string();

        let (decision, response) = match self.process(&request).await {
            Ok(outcome) => outcome,
            Err(err) => {
                if err.status().is_server_error() {
                    tracing::error!(
                        request_id = %request.request_id,
                        path = %request.path,
                        error = %err,
                        "Request failed"
                    );
                } else {
                    tracing::debug!(
                        request_id = %request.request_id,
                        path = %request.path,
                        status = %err.status(),
                        error = %err,
                        "Request rejected"
                    );
                }
                (NO_DECISION, err.into_response())
            }
        };

        metrics::record_request(&method, response.status().as_u16(), decision, start);
        response
    }

    async fn process(
        &self,
        request: &AccessRequest,
    ) -> Result<(&'static str, Response), GatewayError> {
        if request.method == Method::OPTIONS {
            return Ok((NO_DECISION, StatusCode::NO_CONTENT.into_response()));
        }
        if request.method != Method::GET && request.method != Method::HEAD {
            return Err(GatewayError::MethodNotAllowed);
        }

        if let Some(verifier) = &self.verifier {
            let sign = request.signature().unwrap_or_default();
            verifier.verify(&request.path, &sign)?;
        }

        let is_domestic = self.geo.is_domestic(request.client_ip);
        if !is_domestic {
            tracing::info!(
                request_id = %request.request_id,
                client_ip = ?request.client_ip,
                "Foreign caller, forcing direct link"
            );
        }

        let link = match self.resolver.resolve(&request.path).await {
            Ok(link) => {
                metrics::record_link_resolution("ok");
                link
            }
            Err(err) => {
                metrics::record_link_resolution(match err {
                    LinkError::Upstream { .. } => "upstream_error",
                    LinkError::Transport(_) => "transport_error",
                });
                return Err(err.into());
            }
        };

        let user_agent = request.user_agent.as_deref();
        let decision = self.policy.decide(user_agent, is_domestic);
        tracing::debug!(
            request_id = %request.request_id,
            user_agent = user_agent.unwrap_or(""),
            decision = %decision,
            "Routing decided"
        );

        let response = match decision {
            RoutingDecision::Direct => redirect(&link.url)?,
            RoutingDecision::Proxy => {
                tracing::info!(
                    request_id = %request.request_id,
                    target = %link.url,
                    "Proxying download"
                );
                self.forwarder
                    .forward(&request.method, &request.headers, link)
                    .await?
            }
        };

        Ok((decision.as_str(), response))
    }
}

/// 302 to `url`.
fn redirect(url: &str) -> Result<Response, GatewayError> {
    let location = HeaderValue::from_str(url).map_err(|e| {
        GatewayError::InternalRequestBuild(format!("invalid redirect target {}: {}", url, e))
    })?;
    Ok((StatusCode::FOUND, [(LOCATION, location)]).into_response())
}
