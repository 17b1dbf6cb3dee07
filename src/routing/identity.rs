//! Caller identification.
//!
//! # Responsibilities
//! - Find the caller's real IP behind reverse proxies
//! - Find the end client's user agent
//!
//! # Design Decisions
//! - `X-Forwarded-For`, `X-Real-IP` and `X-Client-UA` are trusted as sent;
//!   only safe when a controlled reverse proxy sets them
//! - Unparseable header values fall through to the next source

use std::net::{IpAddr, SocketAddr};

use axum::http::header::{HeaderMap, HeaderName, USER_AGENT};

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");
pub const X_CLIENT_UA: HeaderName = HeaderName::from_static("x-client-ua");

/// Resolve the caller's IP.
///
/// Priority: first `X-Forwarded-For` entry, then `X-Real-IP`, then the
/// transport peer. `None` when nothing usable is available.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    let forwarded = header_str(headers, &X_FORWARDED_FOR)
        .and_then(|xff| xff.split(',').next())
        .and_then(|first| first.trim().parse().ok());
    if forwarded.is_some() {
        return forwarded;
    }

    let real_ip = header_str(headers, &X_REAL_IP).and_then(|v| v.trim().parse().ok());
    if real_ip.is_some() {
        return real_ip;
    }

    peer.map(|addr| addr.ip())
}

/// The end client's user agent: `X-Client-UA` when non-empty, else `User-Agent`.
pub fn client_user_agent(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, &X_CLIENT_UA)
        .filter(|ua| !ua.is_empty())
        .or_else(|| header_str(headers, &USER_AGENT))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
