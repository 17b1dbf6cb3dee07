//! Geographic classification subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     geo.database_path → classifier.rs (load once) → Arc shared by all requests
//!
//! Per request:
//!     client IP → GeoClassifier::is_domestic → routing policy
//! ```

pub mod classifier;

pub use classifier::{CountryLookup, GeoClassifier, GeoLookupError, MaxMindLookup};
