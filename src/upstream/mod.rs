//! Upstream communication subsystem.
//!
//! # Data Flow
//! ```text
//! Requested path
//!     → link.rs (POST /api/fs/link → ResolvedLink | LinkError)
//!     → [routing decision]
//!     → forward.rs (proxied fetch, streamed back to the caller)
//! ```
//!
//! # Design Decisions
//! - Two independent HTTP clients: link calls have an overall deadline,
//!   proxied fetches only a time-to-headers deadline
//! - Connection pooling is left to reqwest defaults
//! - No retries anywhere; failures surface immediately

pub mod forward;
pub mod link;

pub use forward::{StreamForwarder, COPY_BUFFER_SIZE};
pub use link::{LinkError, LinkResolver, ResolvedLink};
