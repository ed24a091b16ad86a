//! Per-item outcomes, run summary and the process exit mapping.

use std::fmt;

use serde::Serialize;

use crate::sink::PersistTarget;

/// Where an item is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Pending,
    Extracting,
    Analyzing,
    Persisting,
    Done,
}

impl Stage {
    /// Lowercase label for log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Extracting => "extracting",
            Self::Analyzing => "analyzing",
            Self::Persisting => "persisting",
            Self::Done => "done",
        }
    }
}

/// Why an item was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The identity is already in the processed set.
    AlreadyProcessed,
}

/// Why an item failed. Messages are the display strings of the
/// underlying errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// No usable text could be extracted.
    Extraction { error_kind: String, message: String },
    /// Every analysis attempt failed; `message` is the last error.
    Analysis { attempts: u32, message: String },
    /// The sink rejected the record; the identity was not marked.
    Persist { message: String },
    /// The record was persisted but the processed marker could not be
    /// flushed; the item will be redone on the next run.
    Dedup { message: String },
}

impl FailureReason {
    /// Stage the item was in when it failed.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Extraction { .. } => Stage::Extracting,
            Self::Analysis { .. } => Stage::Analyzing,
            Self::Persist { .. } | Self::Dedup { .. } => Stage::Persisting,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extraction { message, .. } => write!(f, "extraction failed: {message}"),
            Self::Analysis { attempts, message } => {
                write!(f, "analysis failed after {attempts} attempt(s): {message}")
            }
            Self::Persist { message } => write!(f, "persist failed: {message}"),
            Self::Dedup { message } => write!(f, "processed marker not saved: {message}"),
        }
    }
}

/// Terminal state of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    /// Persisted and marked.
    Done {
        target: PersistTarget,
        attempts: u32,
    },
    /// Not processed this run.
    Skipped(SkipReason),
    /// Processing stopped at some stage.
    Failed(FailureReason),
}

/// Outcome of one source, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub identity: String,
    pub company: String,
    pub status: ItemStatus,
}

impl ItemOutcome {
    /// True for [`ItemStatus::Done`].
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self.status, ItemStatus::Done { .. })
    }

    /// True for [`ItemStatus::Failed`].
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.status, ItemStatus::Failed(_))
    }

    /// True for [`ItemStatus::Skipped`].
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self.status, ItemStatus::Skipped(_))
    }
}

/// Result of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
    pub outcomes: Vec<ItemOutcome>,
    /// The run stopped early because the interrupt flag was set.
    pub interrupted: bool,
}

impl RunSummary {
    pub(crate) fn record(&mut self, outcome: ItemOutcome) {
        match outcome.status {
            ItemStatus::Done { .. } => self.done += 1,
            ItemStatus::Skipped(_) => self.skipped += 1,
            ItemStatus::Failed(_) => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }

    /// Items that left `Pending` (done + failed).
    #[must_use]
    pub fn processed(&self) -> usize {
        self.done + self.failed
    }

    /// Exit outcome for this run's counts.
    #[must_use]
    pub fn exit_outcome(&self) -> ProcessExit {
        determine_exit_outcome(self.done, self.failed)
    }
}

/// How the process should exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    Success,
    Partial,
    Failure,
}

impl ProcessExit {
    /// Process exit code. Only a total failure is non-zero.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Success | Self::Partial => 0,
            Self::Failure => 1,
        }
    }
}

/// Maps done/failed counts to the exit outcome.
#[must_use]
pub fn determine_exit_outcome(done: usize, failed: usize) -> ProcessExit {
    if failed == 0 {
        ProcessExit::Success
    } else if done > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}
