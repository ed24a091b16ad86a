//! Concall Core Library
//!
//! This library turns published earnings-call disclosures (concall PDFs and
//! recorded-call transcripts) into structured financial event records.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`discovery`] - Where sources come from (manifest file, listing site)
//! - [`extract`] - Document and transcript text extraction
//! - [`analyze`] - LLM-backed structured analysis and response validation
//! - [`dedup`] - Persistent set of processed identities
//! - [`sink`] - Record persistence (JSON per record, CSV, remote API)
//! - [`pipeline`] - The sequential orchestrator with retry and pacing

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod analyze;
pub mod dedup;
pub mod discovery;
pub mod extract;
pub mod http;
pub mod pipeline;
pub mod sink;
pub mod source;

mod atomic;
mod user_agent;

// Re-export commonly used types
pub use analyze::{
    AnalyzeError, EventTag, LlmAnalyzer, LlmConfig, MetricKey, Outlook, StructuredAnalyzer,
    StructuredRecord,
};
pub use dedup::{DedupError, DedupStore};
pub use discovery::{
    DateFilter, Discovery, DiscoveryError, ListingCredentials, ManifestDiscovery,
    ScreenerDiscovery,
};
pub use extract::{ContentExtractor, ExtractError, RawContent, SourceExtractor};
pub use pipeline::{
    DEFAULT_ITEM_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY, FailureReason, ItemOutcome,
    ItemStatus, Pipeline, PipelineConfig, ProcessExit, RetryPolicy, RunSummary,
};
pub use sink::{
    ApiSink, CompositeSink, CsvSink, JsonDirSink, PersistError, PersistTarget, ResultSink,
};
pub use source::{SourceDescriptor, SourceKind, sanitize_identity};
