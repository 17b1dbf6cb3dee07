//! Domestic/foreign classification of client addresses.
//!
//! # Responsibilities
//! - Load the country database once at startup
//! - Answer "is this caller domestic?" for the routing policy
//!
//! # Design Decisions
//! - Fail closed: anything unknown counts as domestic
//! - Lookups are read-only against an immutable reader, so no locking
//! - The database sits behind `CountryLookup` so tests can swap it out

use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use maxminddb::{geoip2, MaxMindDBError, Reader};
use thiserror::Error;

/// Failure of a single country lookup.
#[derive(Debug, Error)]
#[error("geo lookup failed: {0}")]
pub struct GeoLookupError(pub String);

/// Source of ISO country codes for IP addresses.
pub trait CountryLookup: Send + Sync {
    /// ISO 3166-1 alpha-2 code for `ip`, or `None` when the database has no answer.
    fn country_code(&self, ip: IpAddr) -> Result<Option<String>, GeoLookupError>;
}

/// `CountryLookup` over a MaxMind GeoLite2/GeoIP2 Country database.
pub struct MaxMindLookup {
    reader: Reader<Vec<u8>>,
}

impl MaxMindLookup {
    /// Read the database file into memory.
    pub fn open(path: &Path) -> Result<Self, MaxMindDBError> {
        let reader = Reader::open_readfile(path)?;
        Ok(Self { reader })
    }
}

impl CountryLookup for MaxMindLookup {
    fn country_code(&self, ip: IpAddr) -> Result<Option<String>, GeoLookupError> {
        match self.reader.lookup::<geoip2::Country>(ip) {
            Ok(record) => Ok(record
                .country
                .and_then(|c| c.iso_code)
                .map(|code| code.to_string())),
            Err(MaxMindDBError::AddressNotFoundError(_)) => Ok(None),
            Err(e) => Err(GeoLookupError(e.to_string())),
        }
    }
}

/// Classifies callers as domestic or foreign.
#[derive(Clone)]
pub struct GeoClassifier {
    lookup: Option<Arc<dyn CountryLookup>>,
    domestic_code: String,
}

impl GeoClassifier {
    /// Classifier backed by `lookup`.
    pub fn new(lookup: Arc<dyn CountryLookup>, domestic_code: impl Into<String>) -> Self {
        Self {
            lookup: Some(lookup),
            domestic_code: domestic_code.into(),
        }
    }

    /// Classifier with no database; every caller is domestic.
    pub fn without_database(domestic_code: impl Into<String>) -> Self {
        Self {
            lookup: None,
            domestic_code: domestic_code.into(),
        }
    }

    /// Load the database at `path`. A load failure is logged and yields a
    /// classifier without a database.
    pub fn open(path: &Path, domestic_code: impl Into<String>) -> Self {
        match MaxMindLookup::open(path) {
            Ok(lookup) => {
                tracing::info!(path = %path.display(), "GeoIP database loaded");
                Self::new(Arc::new(lookup), domestic_code)
            }
            Err(e) => {
                tracing::error!(
                    path = %path.display(),
                    error = %e,
                    "Failed to load GeoIP database; all callers will be treated as domestic"
                );
                Self::without_database(domestic_code)
            }
        }
    }

    /// Whether a database is available.
    pub fn has_database(&self) -> bool {
        self.lookup.is_some()
    }

    /// True unless `ip` is known to belong to a country other than the domestic one.
    pub fn is_domestic(&self, ip: Option<IpAddr>) -> bool {
        let (Some(ip), Some(lookup)) = (ip, self.lookup.as_ref()) else {
            return true;
        };

        match lookup.country_code(ip) {
            Ok(Some(code)) => code.eq_ignore_ascii_case(&self.domestic_code),
            Ok(None) => true,
            Err(e) => {
                tracing::debug!(ip = %ip, error = %e, "Geo lookup failed, treating as domestic");
                true
            }
        }
    }
}

impl std::fmt::Debug for GeoClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoClassifier")
            .field("has_database", &self.has_database())
            .field("domestic_code", &self.domestic_code)
            .finish()
    }
}
