//! The orchestrator: sources in, records persisted, identities marked.
//!
//! Items run one at a time in discovery order. For each source:
//!
//! 1. skip it if its identity is already processed
//! 2. extract its text
//! 3. analyze with bounded retry
//! 4. persist through the sink, then mark the identity
//!
//! A failure at any stage ends that item only. The identity is marked only
//! after the sink accepted the record, so a crash between the two redoes the
//! item on the next run instead of losing it.

mod pacer;
mod retry;
mod summary;

pub use pacer::Pacer;
pub use retry::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY, RetryDecision, RetryPolicy};
pub use summary::{
    FailureReason, ItemOutcome, ItemStatus, ProcessExit, RunSummary, SkipReason, Stage,
    determine_exit_outcome,
};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{Instrument, debug, info, info_span, warn};

use crate::analyze::{AnalyzeError, StructuredAnalyzer, StructuredRecord};
use crate::dedup::DedupStore;
use crate::extract::{ContentExtractor, RawContent};
use crate::sink::ResultSink;
use crate::source::SourceDescriptor;

/// Default pause between processed items.
pub const DEFAULT_ITEM_DELAY: Duration = Duration::from_millis(2500);

/// Orchestration knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Analysis retry bound and delay.
    pub retry: RetryPolicy,
    /// Pause between items that leave `Pending`.
    pub item_delay: Duration,
    /// Stop after this many items were done or failed.
    pub max_items: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            item_delay: DEFAULT_ITEM_DELAY,
            max_items: None,
        }
    }
}

/// Sequential extraction → analysis → persistence over discovered sources.
pub struct Pipeline {
    extractor: Arc<dyn ContentExtractor>,
    analyzer: Arc<dyn StructuredAnalyzer>,
    sink: Box<dyn ResultSink>,
    dedup: DedupStore,
    config: PipelineConfig,
    interrupt: Arc<AtomicBool>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("dedup_entries", &self.dedup.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Wires the pipeline's collaborators together.
    #[must_use]
    pub fn new(
        extractor: Arc<dyn ContentExtractor>,
        analyzer: Arc<dyn StructuredAnalyzer>,
        sink: Box<dyn ResultSink>,
        dedup: DedupStore,
        config: PipelineConfig,
    ) -> Self {
        Self {
            extractor,
            analyzer,
            sink,
            dedup,
            config,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Uses `flag` as the interrupt signal, checked before each item.
    #[must_use]
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    /// Handle that stops the run before its next item when set.
    #[must_use]
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    /// The processed set, including marks made by this pipeline.
    #[must_use]
    pub fn dedup(&self) -> &DedupStore {
        &self.dedup
    }

    /// Processes `sources` in order and summarizes the run.
    ///
    /// Never fails as a whole: every problem is recorded on its item.
    pub async fn run(&mut self, sources: Vec<SourceDescriptor>) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut pacer = Pacer::new(self.config.item_delay);
        let total = sources.len();

        info!(
            sources = total,
            max_items = ?self.config.max_items,
            max_attempts = self.config.retry.max_attempts(),
            item_delay_ms = pacer.delay().as_millis(),
            "starting run"
        );

        for source in sources {
            if self.interrupted() {
                summary.interrupted = true;
                break;
            }
            if let Some(limit) = self.config.max_items
                && summary.processed() >= limit
            {
                info!(limit, "max items reached, stopping");
                break;
            }

            if self.dedup.contains(source.identity()) {
                debug!(identity = %source.identity(), "already processed, skipping");
                summary.record(ItemOutcome {
                    identity: source.identity().to_string(),
                    company: source.company().to_string(),
                    status: ItemStatus::Skipped(SkipReason::AlreadyProcessed),
                });
                continue;
            }

            pacer.wait().await;
            if self.interrupted() {
                summary.interrupted = true;
                break;
            }

            let span = info_span!(
                "item",
                identity = %source.identity(),
                kind = %source.kind(),
            );
            let status = self.process_item(&source).instrument(span).await;
            pacer.finished();

            match &status {
                ItemStatus::Done { target, attempts } => {
                    info!(identity = %source.identity(), %target, attempts, "item done");
                }
                ItemStatus::Failed(reason) => {
                    warn!(
                        identity = %source.identity(),
                        stage = reason.stage().as_str(),
                        reason = %reason,
                        "item failed"
                    );
                }
                ItemStatus::Skipped(_) => {}
            }

            summary.record(ItemOutcome {
                identity: source.identity().to_string(),
                company: source.company().to_string(),
                status,
            });
        }

        info!(
            done = summary.done,
            skipped = summary.skipped,
            failed = summary.failed,
            interrupted = summary.interrupted,
            paced_secs = pacer.cumulative_delay().as_secs(),
            "run complete"
        );
        summary
    }

    fn interrupted(&self) -> bool {
        if self.interrupt.load(Ordering::SeqCst) {
            warn!("interrupt received, stopping before next item");
            true
        } else {
            false
        }
    }

    async fn process_item(&mut self, source: &SourceDescriptor) -> ItemStatus {
        debug!(stage = Stage::Extracting.as_str());
        let content = match self.extractor.extract(source).await {
            Ok(content) if !content.is_empty() => content,
            Ok(_) => {
                return ItemStatus::Failed(FailureReason::Extraction {
                    error_kind: "empty_content".to_string(),
                    message: format!("no text extracted from {}", source.locator()),
                });
            }
            Err(e) => {
                return ItemStatus::Failed(FailureReason::Extraction {
                    error_kind: e.kind().to_string(),
                    message: e.to_string(),
                });
            }
        };

        debug!(stage = Stage::Analyzing.as_str(), chars = content.length);
        let (record, attempts) = match self.analyze_with_retry(source, &content).await {
            Ok(found) => found,
            Err((e, attempts)) => {
                return ItemStatus::Failed(FailureReason::Analysis {
                    attempts,
                    message: e.to_string(),
                });
            }
        };
        drop(content);

        debug!(stage = Stage::Persisting.as_str());
        let target = match self.sink.persist(&record).await {
            Ok(target) => target,
            Err(e) => {
                return ItemStatus::Failed(FailureReason::Persist {
                    message: e.to_string(),
                });
            }
        };

        if let Err(e) = self.dedup.mark_done(source.identity()) {
            return ItemStatus::Failed(FailureReason::Dedup {
                message: e.to_string(),
            });
        }

        debug!(stage = Stage::Done.as_str());
        ItemStatus::Done { target, attempts }
    }

    /// Runs analysis until it succeeds or the policy gives up.
    ///
    /// Returns the record with the attempt count, or the last error with the
    /// attempt count.
    async fn analyze_with_retry(
        &self,
        source: &SourceDescriptor,
        content: &RawContent,
    ) -> Result<(StructuredRecord, u32), (AnalyzeError, u32)> {
        let policy = &self.config.retry;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "attempting analysis");

            match self.analyzer.try_analyze(source, content).await {
                Ok(record) => return Ok((record, attempt)),
                Err(e) => match policy.should_retry(attempt) {
                    RetryDecision::Retry {
                        delay,
                        attempt: next_attempt,
                    } => {
                        info!(
                            attempt = next_attempt,
                            max_attempts = policy.max_attempts(),
                            delay_ms = delay.as_millis(),
                            kind = e.kind(),
                            error = %e,
                            "retrying analysis"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        debug!(%reason, "not retrying analysis");
                        return Err((e, attempt));
                    }
                },
            }
        }
    }
}
