//! Link resolution against the file-listing service.
//!
//! # Responsibilities
//! - POST the requested path to `/api/fs/link`
//! - Decode the `{code, message, data: {url, header}}` envelope
//! - Normalize protocol-relative URLs
//!
//! # Design Decisions
//! - Business errors keep the service's own code and message
//! - Anything that prevents reading the envelope is a transport error
//! - One call per request, never cached, never retried

use std::collections::HashMap;
use std::time::Duration;

use axum::http::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::UpstreamConfig;

/// Envelope code the listing service uses for success.
pub const SUCCESS_CODE: i64 = 200;

/// Why a link could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The service answered with a non-success envelope.
    #[error("upstream error {code}: {message}")]
    Upstream { code: i64, message: String },

    /// The service could not be reached, timed out, or sent an unreadable body.
    #[error("{0}")]
    Transport(String),
}

/// A time-limited download URL plus the headers the service wants sent with it.
#[derive(Debug, Clone)]
pub struct ResolvedLink {
    pub url: String,
    pub headers: HeaderMap,
}

#[derive(Debug, Deserialize)]
struct LinkEnvelope {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<LinkData>,
}

#[derive(Debug, Default, Deserialize)]
struct LinkData {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    header: Option<HashMap<String, Vec<String>>>,
}

/// Client for the listing service's link endpoint.
#[derive(Debug, Clone)]
pub struct LinkResolver {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl LinkResolver {
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.link_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/fs/link", config.address.trim_end_matches('/')),
            token: config.token.clone(),
        })
    }

    /// The full URL of the link endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Resolve `path` to a download link.
    pub async fn resolve(&self, path: &str) -> Result<ResolvedLink, LinkError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, self.token.as_str())
            .json(&json!({ "path": path }))
            .send()
            .await
            .map_err(|e| LinkError::Transport(e.to_string()))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| LinkError::Transport(e.to_string()))?;

        interpret_envelope(&body)
    }
}

/// Turn a raw response body into a link or an error.
pub fn interpret_envelope(body: &[u8]) -> Result<ResolvedLink, LinkError> {
    let envelope: LinkEnvelope = serde_json::from_slice(body)
        .map_err(|e| LinkError::Transport(format!("invalid link response: {}", e)))?;

    if envelope.code != SUCCESS_CODE {
        return Err(LinkError::Upstream {
            code: envelope.code,
            message: envelope.message.unwrap_or_default(),
        });
    }

    let data = envelope.data.unwrap_or_default();
    let url = data.url.unwrap_or_default();
    if url.is_empty() {
        return Err(LinkError::Upstream {
            code: 502,
            message: "upstream returned an empty link".to_string(),
        });
    }

    Ok(ResolvedLink {
        url: normalize_link_url(&url),
        headers: header_map(data.header.unwrap_or_default()),
    })
}

/// Prefix `http:` onto URLs that carry no scheme (protocol-relative links).
pub fn normalize_link_url(url: &str) -> String {
    if url.starts_with("http") {
        url.to_string()
    } else {
        format!("http:{}", url)
    }
}

fn header_map(raw: HashMap<String, Vec<String>>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, values) in raw {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            tracing::debug!(header = %name, "Dropping invalid upstream header name");
            continue;
        };
        for value in values {
            match HeaderValue::from_str(&value) {
                Ok(value) => {
                    headers.append(name.clone(), value);
                }
                Err(_) => tracing::debug!(header = %name, "Dropping invalid upstream header value"),
            }
        }
    }
    headers
}
