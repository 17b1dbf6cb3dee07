//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, trace, CORS layers)
//!     → request.rs (capture path, query, headers, client identity)
//!     → handler.rs (signature → link resolution → redirect or stream)
//!     → Send to client
//! ```

pub mod handler;
pub mod request;
pub mod server;

pub use handler::GatewayHandler;
pub use request::{AccessRequest, UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
