//! Source discovery: where the pipeline's work list comes from.
//!
//! Discovery runs once, before processing, and its order is the processing
//! order. Two implementations ship:
//! - [`ManifestDiscovery`] reads a local JSON list of sources
//! - [`ScreenerDiscovery`] logs into the concall listing site and scrapes it

mod manifest;
mod screener;

pub use manifest::{ManifestDiscovery, ManifestEntry};
pub use screener::{
    DEFAULT_LISTING_BASE_URL, DateFilter, ListingCredentials, ListingRow, ScreenerDiscovery,
    parse_listing,
};

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::source::SourceDescriptor;

/// Errors producing the work list. These abort the run before any item starts.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A local manifest could not be read.
    #[error("cannot read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A local manifest is not a JSON array of entries.
    #[error("manifest {path} is malformed: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The listing site could not be reached or answered with an error.
    #[error("listing request to {url} failed: {reason}")]
    Http {
        url: String,
        reason: String,
        status: Option<u16>,
    },

    /// The listing site refused the credentials or no login form was found.
    #[error("listing login failed: {reason}")]
    Login { reason: String },

    /// Required configuration is missing.
    #[error("discovery is not configured: {reason}")]
    Config { reason: String },
}

impl DiscoveryError {
    /// Creates an HTTP error without status.
    pub fn http(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Http {
            url: url.into(),
            reason: reason.into(),
            status: None,
        }
    }

    /// Creates an HTTP error for a non-2xx answer.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::Http {
            url: url.into(),
            reason: format!("HTTP {status}"),
            status: Some(status),
        }
    }

    /// Creates a login error.
    pub fn login(reason: impl Into<String>) -> Self {
        Self::Login {
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

/// Produces the ordered list of sources for one run.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Lists the sources to process.
    ///
    /// # Errors
    ///
    /// Any [`DiscoveryError`]; nothing is processed when discovery fails.
    async fn discover(&self) -> Result<Vec<SourceDescriptor>, DiscoveryError>;
}
