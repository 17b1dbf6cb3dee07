//! Request-scoped gateway errors.
//!
//! Every variant ends the request with a JSON envelope `{"code", "msg"}`.
//! None of them is fatal to the process.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::security::SignatureError;
use crate::upstream::LinkError;

/// Errors that terminate a single request.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Signature missing, malformed, expired or not matching.
    #[error("{0}")]
    InvalidSignature(#[from] SignatureError),

    /// Request path that does not percent-decode to UTF-8.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Method other than GET, HEAD or OPTIONS.
    #[error("Only GET/HEAD/OPTIONS are allowed")]
    MethodNotAllowed,

    /// Business error reported by the listing service, forwarded as-is.
    #[error("{message}")]
    UpstreamBusiness { code: i64, message: String },

    /// The listing service or the file host could not be reached or understood.
    #[error("{0}")]
    UpstreamTransport(String),

    /// The outbound request could not be constructed.
    #[error("{0}")]
    InternalRequestBuild(String),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub code: i64,
    pub msg: String,
}

impl GatewayError {
    /// HTTP status for the response.
    ///
    /// Upstream business codes outside the valid status range are sent as 502.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
            GatewayError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::UpstreamBusiness { code, .. } => u16::try_from(*code)
                .ok()
                .and_then(|c| StatusCode::from_u16(c).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            GatewayError::UpstreamTransport(_) => StatusCode::BAD_GATEWAY,
            GatewayError::InternalRequestBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Numeric code placed in the envelope.
    pub fn code(&self) -> i64 {
        match self {
            GatewayError::UpstreamBusiness { code, .. } => *code,
            other => i64::from(other.status().as_u16()),
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            code: self.code(),
            msg: self.to_string(),
        }
    }
}

impl From<LinkError> for GatewayError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::Upstream { code, message } => GatewayError::UpstreamBusiness { code, message },
            LinkError::Transport(message) => GatewayError::UpstreamTransport(message),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::to_vec(&self.envelope()).unwrap_or_default();

        let mut response = (status, body).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        response
    }
}
