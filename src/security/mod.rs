//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → signature.rs (verify the `sign` query parameter for the path)
//!     → [link resolution, routing]
//!     → headers.rs (sanitize outbound and returned headers)
//! ```
//!
//! # Design Decisions
//! - One process-wide key, built once at startup and shared read-only
//! - Signature verification can be disabled by configuration, never bypassed per request
//! - Forwarded-IP headers are trusted as-is; deploy behind a controlled reverse proxy

pub mod headers;
pub mod signature;

pub use signature::{SignatureError, SignatureVerifier};
