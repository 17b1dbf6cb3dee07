//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (headers, peer address)
//!     → identity.rs (client IP, client user agent)
//!     → [geo classification]
//!     → policy.rs (Direct or Proxy)
//! ```
//!
//! # Design Decisions
//! - Keyword list compiled at startup, immutable at runtime
//! - Deterministic: same input always yields the same decision
//! - Evaluated once per request

pub mod identity;
pub mod policy;

pub use identity::{client_ip, client_user_agent};
pub use policy::{RoutingDecision, RoutingPolicy};
