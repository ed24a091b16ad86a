//! Source descriptors handed to the pipeline by discovery.
//!
//! A [`SourceDescriptor`] names one disclosure (a concall PDF or a recorded
//! call on a video platform). Its `identity` is the deduplication key and
//! must stay stable across runs, so it is derived from the company label
//! rather than from the URL, which listing sites tend to rotate.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Maximum length of a sanitized identity.
pub const MAX_IDENTITY_LEN: usize = 50;

/// Hosts whose links are treated as transcript sources.
const TRANSCRIPT_HOSTS: [&str; 4] = [
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "youtu.be",
];

/// Which extraction strategy a source needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A binary document (PDF) fetched over HTTP.
    Document,
    /// A video whose timed transcript is fetched from the provider.
    Transcript,
}

impl SourceKind {
    /// Infers the kind from the locator host.
    #[must_use]
    pub fn infer(locator: &Url) -> Self {
        match locator.host_str() {
            Some(host) if TRANSCRIPT_HOSTS.contains(&host.to_ascii_lowercase().as_str()) => {
                Self::Transcript
            }
            _ => Self::Document,
        }
    }

    /// Stable lowercase label used in logs and manifests.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Transcript => "transcript",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One candidate disclosure to process.
///
/// Fields are private so a descriptor cannot change after discovery built it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    identity: String,
    company: String,
    locator: Url,
    kind: SourceKind,
    discovered_at: DateTime<Utc>,
    published: Option<String>,
}

impl SourceDescriptor {
    /// Builds a descriptor, inferring the kind from the locator.
    #[must_use]
    pub fn new(company: impl Into<String>, locator: Url) -> Self {
        let kind = SourceKind::infer(&locator);
        Self::with_kind(company, locator, kind)
    }

    /// Builds a descriptor with an explicit kind.
    #[must_use]
    pub fn with_kind(company: impl Into<String>, locator: Url, kind: SourceKind) -> Self {
        let company = company.into().trim().to_string();
        let mut identity = sanitize_identity(&company);
        if identity.is_empty() {
            // Labels without ASCII alphanumerics still need a stable key.
            let without_scheme = &locator.as_str()[locator.scheme().len()..];
            identity = sanitize_identity(without_scheme);
        }
        Self {
            identity,
            company,
            locator,
            kind,
            discovered_at: Utc::now(),
            published: None,
        }
    }

    /// Attaches the publication date label shown by the listing.
    #[must_use]
    pub fn published_on(mut self, published: impl Into<String>) -> Self {
        self.published = Some(published.into());
        self
    }

    /// Stable deduplication key.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Human-readable company label as discovered.
    #[must_use]
    pub fn company(&self) -> &str {
        &self.company
    }

    /// Where the content lives.
    #[must_use]
    pub fn locator(&self) -> &Url {
        &self.locator
    }

    /// Extraction strategy selector.
    #[must_use]
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// When discovery produced this descriptor.
    #[must_use]
    pub fn discovered_at(&self) -> DateTime<Utc> {
        self.discovered_at
    }

    /// Publication date label, when the listing provides one.
    #[must_use]
    pub fn published(&self) -> Option<&str> {
        self.published.as_deref()
    }
}

/// Normalizes a label into an identity: ASCII lowercase, alphanumerics only,
/// at most [`MAX_IDENTITY_LEN`] characters.
///
/// The same function names output artifacts, so two sources with the same
/// identity also share one artifact.
#[must_use]
pub fn sanitize_identity(label: &str) -> String {
    label
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .take(MAX_IDENTITY_LEN)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_sanitize_identity_strips_and_lowercases() {
        assert_eq!(sanitize_identity("Tata Motors Ltd."), "tatamotorsltd");
        assert_eq!(sanitize_identity("  A&B (India) "), "abindia");
    }

    #[test]
    fn test_sanitize_identity_caps_length() {
        let long = "x".repeat(80);
        assert_eq!(sanitize_identity(&long).len(), MAX_IDENTITY_LEN);
    }

    #[test]
    fn test_sanitize_identity_drops_non_ascii() {
        assert_eq!(sanitize_identity("Café Coffee Day"), "cafcoffeeday");
    }

    #[test]
    fn test_kind_inferred_from_host() {
        assert_eq!(
            SourceKind::infer(&url("https://www.youtube.com/watch?v=dQw4w9WgXcQ")),
            SourceKind::Transcript
        );
        assert_eq!(
            SourceKind::infer(&url("https://youtu.be/dQw4w9WgXcQ")),
            SourceKind::Transcript
        );
        assert_eq!(
            SourceKind::infer(&url("https://www.bseindia.com/xml-data/corpfiling/a.pdf")),
            SourceKind::Document
        );
    }

    #[test]
    fn test_descriptor_identity_is_stable_across_urls() {
        let a = SourceDescriptor::new("Infosys Ltd", url("https://example.com/q1.pdf"));
        let b = SourceDescriptor::new("Infosys Ltd", url("https://example.com/q2.pdf"));
        assert_eq!(a.identity(), b.identity());
        assert_eq!(a.identity(), "infosysltd");
        assert_eq!(a.kind(), SourceKind::Document);
    }

    #[test]
    fn test_descriptor_falls_back_to_locator_for_empty_label() {
        let d = SourceDescriptor::new("—", url("https://example.com/Call.pdf"));
        assert_eq!(d.identity(), "examplecomcallpdf");
        assert_eq!(d.company(), "—");
    }

    #[test]
    fn test_descriptor_published_label() {
        let d = SourceDescriptor::new("Acme", url("https://example.com/a.pdf"))
            .published_on("14 May 2025");
        assert_eq!(d.published(), Some("14 May 2025"));
    }
}
