//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for correlation
//! - Capture everything the gateway needs from an inbound request
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The inbound request is captured once and never mutated

use std::net::{IpAddr, SocketAddr};

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::routing::identity::{client_ip, client_user_agent};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Query parameter carrying the path signature.
pub const SIGN_PARAM: &str = "sign";

/// Generates `x-request-id` values for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Immutable view of an inbound download request.
#[derive(Debug, Clone)]
pub struct AccessRequest {
    /// Percent-decoded path, always starting with `/`.
    pub path: String,
    pub query: Option<String>,
    pub method: Method,
    pub headers: HeaderMap,
    pub client_ip: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub request_id: String,
}

impl AccessRequest {
    /// Capture `request`, resolving the client identity from its headers and `peer`.
    pub fn from_request<B>(path: String, request: &Request<B>, peer: Option<SocketAddr>) -> Self {
        let headers = request.headers().clone();
        let client_ip = client_ip(&headers, peer);
        let user_agent = client_user_agent(&headers).map(str::to_string);
        let request_id = headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        Self {
            path,
            query: request.uri().query().map(str::to_string),
            method: request.method().clone(),
            headers,
            client_ip,
            user_agent,
            request_id,
        }
    }

    /// First `sign` query value, form-decoded.
    pub fn signature(&self) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == SIGN_PARAM)
            .map(|(_, value)| value.into_owned())
    }
}
