//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → tls.rs (optional TLS handshake, rustls via axum-server)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - TLS is optional and handled transparently
//! - Certificates are loaded once at startup; a missing file is fatal

pub mod tls;

pub use tls::load_tls_config;
