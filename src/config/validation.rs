//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check the upstream settings the gateway cannot run without
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// Human-readable description.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("not a socket address: {}", config.listener.bind_address),
        ));
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() || tls.key_path.is_empty() {
            errors.push(ValidationError::new(
                "listener.tls",
                "cert_path and key_path must both be set",
            ));
        }
    }

    let address = config.upstream.address.trim();
    if address.is_empty() {
        errors.push(ValidationError::new("upstream.address", "must be set"));
    } else if !(address.starts_with("http://") || address.starts_with("https://")) {
        errors.push(ValidationError::new(
            "upstream.address",
            format!("must start with http:// or https://: {}", address),
        ));
    }

    if config.upstream.token.is_empty() {
        errors.push(ValidationError::new("upstream.token", "must be set"));
    }

    for (field, value) in [
        ("upstream.link_timeout_secs", config.upstream.link_timeout_secs),
        ("upstream.fetch_timeout_secs", config.upstream.fetch_timeout_secs),
        ("upstream.connect_timeout_secs", config.upstream.connect_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    let code = &config.geo.domestic_country;
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        errors.push(ValidationError::new(
            "geo.domestic_country",
            format!("expected a two-letter country code, got {:?}", code),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("not a socket address: {}", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
