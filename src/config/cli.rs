//! Command-line flags.
//!
//! Flags override whatever the optional config file sets.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::config::loader::{read_config, ConfigError};
use crate::config::schema::GatewayConfig;
use crate::config::validation::validate_config;

#[derive(Debug, Parser)]
#[command(name = "download-gateway", version)]
#[command(about = "Signed download gateway for a file-listing service", long_about = None)]
pub struct CliArgs {
    /// Optional TOML config file; flags below take precedence.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// The listening port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Serve over HTTPS.
    #[arg(long)]
    pub https: bool,

    /// Certificate file (PEM), used with --https.
    #[arg(long)]
    pub cert: Option<String>,

    /// Private key file (PEM), used with --https.
    #[arg(long)]
    pub key: Option<String>,

    /// Address of the file-listing service.
    #[arg(long)]
    pub address: Option<String>,

    /// Token for the file-listing service; also the signing key.
    #[arg(long)]
    pub token: Option<String>,

    /// Disable signature verification.
    #[arg(long)]
    pub disable_sign: bool,

    /// Path to the GeoLite2-Country database.
    #[arg(long)]
    pub geo_db: Option<String>,

    /// Country code treated as domestic.
    #[arg(long)]
    pub domestic_country: Option<String>,
}

impl CliArgs {
    /// Apply flag values on top of `config`.
    pub fn apply(&self, config: &mut GatewayConfig) {
        if let Some(port) = self.port {
            config.listener.bind_address = match config.listener.bind_address.parse::<SocketAddr>() {
                Ok(mut addr) => {
                    addr.set_port(port);
                    addr.to_string()
                }
                Err(_) => format!("0.0.0.0:{}", port),
            };
        }

        if self.https || self.cert.is_some() || self.key.is_some() {
            let mut tls = config.listener.tls.clone().unwrap_or_default();
            if let Some(cert) = &self.cert {
                tls.cert_path = cert.clone();
            }
            if let Some(key) = &self.key {
                tls.key_path = key.clone();
            }
            if self.https || config.listener.tls.is_some() {
                config.listener.tls = Some(tls);
            }
        }

        if let Some(address) = &self.address {
            config.upstream.address = address.clone();
        }
        if let Some(token) = &self.token {
            config.upstream.token = token.clone();
        }
        if self.disable_sign {
            config.security.disable_sign = true;
        }
        if let Some(path) = &self.geo_db {
            config.geo.database_path = path.clone();
        }
        if let Some(code) = &self.domestic_country {
            config.geo.domestic_country = code.clone();
        }
    }

    /// Build the effective configuration: file (if any), then flags, then validation.
    pub fn into_config(self) -> Result<GatewayConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => GatewayConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}
