//! Result persistence.
//!
//! A [`ResultSink`] takes one validated [`StructuredRecord`] at a time. The
//! pipeline marks the record's identity as processed only after `persist`
//! returns `Ok`, so every sink must make the record durable before returning.

mod api;
mod csv;
mod json;

pub use api::ApiSink;
pub use csv::{CSV_HEADER, CsvSink, escape_csv};
pub use json::JsonDirSink;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::analyze::StructuredRecord;

/// Where a record ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistTarget {
    /// A local file.
    File(PathBuf),
    /// A remote endpoint.
    Remote(String),
    /// Several targets, in sink order.
    Many(Vec<PersistTarget>),
}

impl fmt::Display for PersistTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => f.write_str(url),
            Self::Many(targets) => {
                for (i, target) in targets.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{target}")?;
                }
                Ok(())
            }
        }
    }
}

/// Errors persisting one record.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Writing a local artifact failed.
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The record could not be encoded.
    #[error("cannot serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The remote endpoint rejected or never received the record.
    #[error("result API {url} failed: {reason}")]
    Http {
        url: String,
        reason: String,
        status: Option<u16>,
    },
}

impl PersistError {
    /// Creates an I/O error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

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
}

/// Durable destination for structured records.
#[async_trait]
pub trait ResultSink: Send {
    /// Persists `record`, returning where it was written.
    ///
    /// # Errors
    ///
    /// Any [`PersistError`]; the record must then be treated as not persisted.
    async fn persist(&mut self, record: &StructuredRecord) -> Result<PersistTarget, PersistError>;
}

/// Runs several sinks in order, stopping at the first failure.
///
/// Sinks before the failing one keep what they wrote.
pub struct CompositeSink {
    sinks: Vec<Box<dyn ResultSink>>,
}

impl CompositeSink {
    /// Creates a composite from sinks in execution order.
    #[must_use]
    pub fn new(sinks: Vec<Box<dyn ResultSink>>) -> Self {
        Self { sinks }
    }

    /// Number of inner sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// True when there are no inner sinks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl fmt::Debug for CompositeSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

#[async_trait]
impl ResultSink for CompositeSink {
    async fn persist(&mut self, record: &StructuredRecord) -> Result<PersistTarget, PersistError> {
        let mut targets = Vec::with_capacity(self.sinks.len());
        for sink in &mut self.sinks {
            targets.push(sink.persist(record).await?);
        }
        Ok(PersistTarget::Many(targets))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    use super::*;
    use crate::analyze::Outlook;

    struct CountingSink {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl ResultSink for CountingSink {
        async fn persist(
            &mut self,
            _record: &StructuredRecord,
        ) -> Result<PersistTarget, PersistError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(PersistError::http("http://api.test", "down"))
            } else {
                Ok(PersistTarget::Remote("http://api.test".to_string()))
            }
        }
    }

    fn record() -> StructuredRecord {
        StructuredRecord {
            source_identity: "acme".to_string(),
            company_label: "Acme".to_string(),
            source_url: "https://example.com/a.pdf".to_string(),
            metrics: BTreeMap::new(),
            events: BTreeSet::new(),
            outlook: Outlook::Good,
            extracted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_composite_stops_at_first_failure() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut sink = CompositeSink::new(vec![
            Box::new(CountingSink {
                calls: Arc::clone(&first),
                fail: true,
            }),
            Box::new(CountingSink {
                calls: Arc::clone(&second),
                fail: false,
            }),
        ]);

        assert!(sink.persist(&record()).await.is_err());
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_composite_collects_targets() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut sink = CompositeSink::new(vec![
            Box::new(CountingSink {
                calls: Arc::clone(&calls),
                fail: false,
            }),
            Box::new(CountingSink {
                calls: Arc::clone(&calls),
                fail: false,
            }),
        ]);

        let target = sink.persist(&record()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(target.to_string(), "http://api.test, http://api.test");
    }
}
