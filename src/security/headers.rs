//! Header manipulation for the forwarding path.
//!
//! # Responsibilities
//! - Merge upstream-suggested request headers under client headers
//! - Strip hop-by-hop headers (fixed list plus `Connection`-named ones)
//! - Filter upstream response headers before they reach the caller
//! - Own the gateway's fixed CORS header values (applied by the router)
//!
//! # Design Decisions
//! - Client-supplied values always win over upstream suggestions
//! - `Set-Cookie` is never relayed from upstream
//! - CORS headers are always the gateway's, never upstream's

use axum::http::header::{
    HeaderMap, HeaderName, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
    CONNECTION, SET_COOKIE,
};

/// Headers meaningful only for a single transport hop.
pub const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// The CORS headers the gateway sets on every response.
pub const CORS_HEADERS: [(HeaderName, &str); 4] = [
    (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (ACCESS_CONTROL_ALLOW_METHODS, "GET,HEAD,OPTIONS"),
    (ACCESS_CONTROL_ALLOW_HEADERS, "Range,Content-Type,Authorization"),
    (ACCESS_CONTROL_EXPOSE_HEADERS, "Content-Length,Content-Range,Accept-Ranges"),
];

/// Add every upstream-suggested header whose name the outbound request
/// does not already carry with a non-empty value.
pub fn merge_upstream_headers(outbound: &mut HeaderMap, suggested: &HeaderMap) {
    for name in suggested.keys() {
        let present = outbound
            .get(name)
            .map(|v| !v.as_bytes().is_empty())
            .unwrap_or(false);
        if present {
            continue;
        }
        for value in suggested.get_all(name) {
            outbound.append(name.clone(), value.clone());
        }
    }
}

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
    for name in listed {
        headers.remove(name);
    }
}

/// Returns true for upstream response headers the caller must not see.
pub fn is_withheld_response_header(name: &HeaderName) -> bool {
    *name == SET_COOKIE
        || CORS_HEADERS.iter().any(|(cors, _)| cors == name)
        || HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

/// Copy upstream response headers to the caller's response, skipping withheld ones.
pub fn copy_response_headers(upstream: &HeaderMap, response: &mut HeaderMap) {
    for (name, value) in upstream {
        if is_withheld_response_header(name) {
            continue;
        }
        response.append(name.clone(), value.clone());
    }
}
