//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the download gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Upstream file-listing service settings.
    pub upstream: UpstreamConfig,

    /// Request signing settings.
    pub security: SecurityConfig,

    /// Geographic classification settings.
    pub geo: GeoConfig,

    /// Direct-vs-proxy routing settings.
    pub routing: RoutingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5243").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5243".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: "server.crt".to_string(),
            key_path: "server.key".to_string(),
        }
    }
}

/// Upstream file-listing service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base address of the listing service (e.g., "http://127.0.0.1:5244").
    pub address: String,

    /// Shared token. Sent as the `Authorization` value to the listing
    /// service and used as the key for request signatures.
    pub token: String,

    /// Overall timeout for a link resolution call, in seconds.
    pub link_timeout_secs: u64,

    /// Time allowed for a proxied fetch to produce response headers, in seconds.
    pub fetch_timeout_secs: u64,

    /// Connection establishment timeout for proxied fetches, in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            token: String::new(),
            link_timeout_secs: 120,
            fetch_timeout_secs: 120,
            connect_timeout_secs: 10,
        }
    }
}

/// Request signing configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Skip signature verification entirely.
    ///
    /// Operational escape hatch; every request is treated as authenticated.
    pub disable_sign: bool,
}

/// Geographic classification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeoConfig {
    /// Path to a GeoLite2-Country (MaxMind DB) file.
    pub database_path: String,

    /// ISO 3166-1 alpha-2 code of the country treated as domestic.
    pub domestic_country: String,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            database_path: "GeoLite2-Country.mmdb".to_string(),
            domestic_country: "CN".to_string(),
        }
    }
}

/// Direct-vs-proxy routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// User-agent keywords (case-insensitive substrings) that always get a redirect.
    pub direct_user_agents: Vec<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            direct_user_agents: crate::routing::policy::DEFAULT_DIRECT_AGENTS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
