//! Error types for content extraction.
//!
//! Every variant maps to one extraction-layer failure kind. The orchestrator
//! downgrades all of them to a per-item failure; none is retried within a run.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while turning a source into raw text.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Network failure, timeout, non-2xx status or non-document content type.
    #[error("fetch failed for {url}: {reason}")]
    Fetch {
        /// The locator that failed.
        url: String,
        /// What went wrong.
        reason: String,
        /// HTTP status when the server answered.
        status: Option<u16>,
    },

    /// Bytes were fetched but did not decode as the expected document type.
    #[error("could not decode document from {url}: {reason}")]
    Format {
        /// The locator whose bytes failed to decode.
        url: String,
        /// Decoder message.
        reason: String,
    },

    /// Decoding succeeded but produced no text.
    #[error("no text extracted from {url}")]
    EmptyContent {
        /// The locator that yielded nothing.
        url: String,
    },

    /// The locator carries no recognizable video identifier.
    #[error("no video identifier in {url}")]
    Identifier {
        /// The locator that was searched.
        url: String,
    },

    /// The video has no caption track, or the track has no segments.
    #[error("no transcript available for video {video_id}")]
    TranscriptUnavailable {
        /// The video whose transcript is missing.
        video_id: String,
    },

    /// Scratch file handling failed.
    #[error("IO error on scratch file {path}: {source}")]
    Io {
        /// Scratch path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    /// Creates a fetch error without an HTTP status.
    pub fn fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.into(),
            status: None,
        }
    }

    /// Creates a fetch error for a non-2xx response.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: format!("HTTP {status}"),
            status: Some(status),
        }
    }

    /// Creates a fetch error from a reqwest error, naming timeouts explicitly.
    pub fn from_reqwest(url: impl Into<String>, error: &reqwest::Error) -> Self {
        let reason = if error.is_timeout() {
            "request timed out".to_string()
        } else {
            error.to_string()
        };
        Self::Fetch {
            url: url.into(),
            reason,
            status: error.status().map(|s| s.as_u16()),
        }
    }

    /// Creates a decode error.
    pub fn format(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Format {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an empty-content error.
    pub fn empty(url: impl Into<String>) -> Self {
        Self::EmptyContent { url: url.into() }
    }

    /// Creates an identifier error.
    pub fn identifier(url: impl Into<String>) -> Self {
        Self::Identifier { url: url.into() }
    }

    /// Creates a transcript-unavailable error.
    pub fn transcript_unavailable(video_id: impl Into<String>) -> Self {
        Self::TranscriptUnavailable {
            video_id: video_id.into(),
        }
    }

    /// Creates a scratch-file IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-readable label for logs and summaries.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch { .. } | Self::Io { .. } => "fetch_failure",
            Self::Format { .. } => "format_failure",
            Self::EmptyContent { .. } => "empty_content",
            Self::Identifier { .. } => "identifier_failure",
            Self::TranscriptUnavailable { .. } => "transcript_unavailable",
        }
    }
}
