//! Local JSON manifest of sources.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use url::Url;

use super::{Discovery, DiscoveryError};
use crate::source::{SourceDescriptor, SourceKind};

/// One manifest entry.
///
/// ```json
/// [{"company": "Acme Ltd", "link": "https://example.com/q3.pdf", "kind": "document", "published": "05 March 2025"}]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestEntry {
    pub company: String,
    pub link: String,
    #[serde(default)]
    pub kind: Option<SourceKind>,
    #[serde(default)]
    pub published: Option<String>,
}

impl ManifestEntry {
    fn into_descriptor(self) -> Result<SourceDescriptor, String> {
        let locator = Url::parse(self.link.trim()).map_err(|e| format!("{}: {e}", self.link))?;
        if !matches!(locator.scheme(), "http" | "https") {
            return Err(format!("{}: unsupported scheme", self.link));
        }
        let descriptor = match self.kind {
            Some(kind) => SourceDescriptor::with_kind(self.company, locator, kind),
            None => SourceDescriptor::new(self.company, locator),
        };
        Ok(match self.published {
            Some(published) => descriptor.published_on(published),
            None => descriptor,
        })
    }
}

/// Reads sources from a JSON array on disk.
///
/// Entries whose link is not an absolute http(s) URL are skipped with a
/// warning; the rest keep manifest order.
#[derive(Debug, Clone)]
pub struct ManifestDiscovery {
    path: PathBuf,
}

impl ManifestDiscovery {
    /// Creates a discovery over the manifest at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Manifest location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Discovery for ManifestDiscovery {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn discover(&self) -> Result<Vec<SourceDescriptor>, DiscoveryError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| DiscoveryError::Io {
                path: self.path.clone(),
                source,
            })?;
        let entries: Vec<ManifestEntry> =
            serde_json::from_str(&raw).map_err(|source| DiscoveryError::Manifest {
                path: self.path.clone(),
                source,
            })?;

        let total = entries.len();
        let mut sources = Vec::with_capacity(total);
        for (index, entry) in entries.into_iter().enumerate() {
            match entry.into_descriptor() {
                Ok(source) => sources.push(source),
                Err(reason) => warn!(index, %reason, "skipping manifest entry"),
            }
        }

        info!(entries = total, sources = sources.len(), "manifest loaded");
        Ok(sources)
    }
}
