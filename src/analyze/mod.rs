//! Structured analysis: raw text in, validated [`StructuredRecord`] out.
//!
//! One attempt is one LLM call. Retrying is the pipeline's job, so
//! [`StructuredAnalyzer::try_analyze`] reports exactly why an attempt failed
//! and [`StructuredAnalyzer::analyze`] collapses that into "no record".

mod client;
mod error;
mod prompt;
mod schema;

pub use client::{API_KEY_ENV_VARS, LlmAnalyzer, LlmConfig};
pub use error::AnalyzeError;
pub use prompt::{DEFAULT_MAX_CONTENT_CHARS, build_prompt, truncate_chars};
pub use schema::{
    EventTag, MetricKey, Outlook, StructuredRecord, ValidatedAnalysis, validate_response,
};

use async_trait::async_trait;
use tracing::warn;

use crate::extract::RawContent;
use crate::source::SourceDescriptor;

/// Turns raw text into a validated record.
#[async_trait]
pub trait StructuredAnalyzer: Send + Sync {
    /// Runs one analysis attempt.
    ///
    /// # Errors
    ///
    /// [`AnalyzeError::Transport`] when the model could not be reached,
    /// [`AnalyzeError::Schema`] when its answer does not validate.
    async fn try_analyze(
        &self,
        source: &SourceDescriptor,
        content: &RawContent,
    ) -> Result<StructuredRecord, AnalyzeError>;

    /// Runs one attempt, logging and discarding the failure reason.
    async fn analyze(
        &self,
        source: &SourceDescriptor,
        content: &RawContent,
    ) -> Option<StructuredRecord> {
        match self.try_analyze(source, content).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(identity = %source.identity(), kind = e.kind(), error = %e, "analysis failed");
                None
            }
        }
    }
}
