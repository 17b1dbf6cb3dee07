//! Signed download gateway for a file-listing service.

pub mod config;
pub mod error;
pub mod geo;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod security;
pub mod upstream;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
