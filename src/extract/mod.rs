//! Content extraction: turn a [`SourceDescriptor`] into raw text.
//!
//! Two strategies share one result shape:
//! - [`DocumentExtractor`] fetches a PDF, stages it in a scratch file and
//!   decodes it with an external text-extraction capability
//! - [`TranscriptExtractor`] resolves a video id and joins its timed captions
//!
//! [`SourceExtractor`] dispatches on [`SourceKind`]; the pipeline only sees the
//! [`ContentExtractor`] trait.
//!
//! # Example
//!
//! ```no_run
//! use concall_core::extract::{ContentExtractor, SourceExtractor};
//! use concall_core::SourceDescriptor;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let extractor = SourceExtractor::with_defaults()?;
//! let source = SourceDescriptor::new("Acme Ltd", Url::parse("https://example.com/q3.pdf")?);
//! let content = extractor.extract(&source).await?;
//! println!("{} characters", content.length);
//! # Ok(())
//! # }
//! ```

mod document;
mod error;
mod transcript;

pub use document::{DocumentDecoder, DocumentExtractor, PdfDecoder};
pub use error::ExtractError;
pub use transcript::{
    DEFAULT_TRANSCRIPT_BASE_URL, DEFAULT_TRANSCRIPT_LANGUAGE, TranscriptExtractor,
    TranscriptProvider, TranscriptSegment, YoutubeTranscripts, join_segments, parse_video_id,
};

use std::sync::Arc;

use async_trait::async_trait;

use crate::source::{SourceDescriptor, SourceKind};

/// Text extracted from one source, held only for one processing cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawContent {
    /// Identity of the source the text came from.
    pub source_identity: String,
    /// Extracted text.
    pub text: String,
    /// Character count of `text`.
    pub length: usize,
}

impl RawContent {
    /// Wraps extracted text, computing its character length.
    #[must_use]
    pub fn new(source_identity: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            source_identity: source_identity.into(),
            length: text.chars().count(),
            text,
        }
    }

    /// True when no characters were extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Resolves a source into raw text.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Extracts the text behind `source`.
    ///
    /// # Errors
    ///
    /// Any [`ExtractError`]; the pipeline records it as the item's failure.
    async fn extract(&self, source: &SourceDescriptor) -> Result<RawContent, ExtractError>;
}

/// Default extractor dispatching on the source kind.
#[derive(Debug, Clone)]
pub struct SourceExtractor {
    document: DocumentExtractor,
    transcript: TranscriptExtractor,
}

impl SourceExtractor {
    /// Builds an extractor from both strategies.
    #[must_use]
    pub fn new(document: DocumentExtractor, transcript: TranscriptExtractor) -> Self {
        Self {
            document,
            transcript,
        }
    }

    /// Builds the PDF + YouTube extractor with default settings.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if an HTTP client cannot be built.
    pub fn with_defaults() -> Result<Self, reqwest::Error> {
        Ok(Self::new(
            DocumentExtractor::new()?,
            TranscriptExtractor::new(Arc::new(YoutubeTranscripts::new()?)),
        ))
    }
}

#[async_trait]
impl ContentExtractor for SourceExtractor {
    async fn extract(&self, source: &SourceDescriptor) -> Result<RawContent, ExtractError> {
        let text = match source.kind() {
            SourceKind::Document => self.document.extract_text(source.locator().as_str()).await?,
            SourceKind::Transcript => self.transcript.extract_text(source.locator()).await?,
        };
        let content = RawContent::new(source.identity(), text);
        if content.is_empty() {
            return Err(ExtractError::empty(source.locator().as_str()));
        }
        Ok(content)
    }
}
