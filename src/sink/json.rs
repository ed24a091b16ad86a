//! One pretty JSON document per record.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{PersistError, PersistTarget, ResultSink};
use crate::analyze::StructuredRecord;
use crate::atomic::write_atomic;
use crate::source::sanitize_identity;

/// Writes `{dir}/{identity}.json` for every record, replacing older artifacts.
#[derive(Debug, Clone)]
pub struct JsonDirSink {
    dir: PathBuf,
}

impl JsonDirSink {
    /// Creates a sink writing into `dir` (created on first write).
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Artifact path for an identity.
    #[must_use]
    pub fn path_for(&self, identity: &str) -> PathBuf {
        let mut stem = sanitize_identity(identity);
        if stem.is_empty() {
            stem.push_str("record");
        }
        self.dir.join(format!("{stem}.json"))
    }
}

#[async_trait]
impl ResultSink for JsonDirSink {
    #[instrument(skip(self, record), fields(identity = %record.source_identity))]
    async fn persist(&mut self, record: &StructuredRecord) -> Result<PersistTarget, PersistError> {
        let path = self.path_for(&record.source_identity);
        let body = serde_json::to_vec_pretty(record)?;
        write_atomic(&path, |writer| std::io::Write::write_all(writer, &body))
            .map_err(|e| PersistError::io(&path, e))?;
        debug!(path = %path.display(), "record written");
        Ok(PersistTarget::File(path))
    }
}
