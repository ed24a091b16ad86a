//! Processed-identity store.
//!
//! The on-disk format is a JSON array of identity strings in insertion order.
//! The set only ever grows; every new identity is flushed before
//! [`DedupStore::mark_done`] returns, so a crash after a successful mark never
//! loses it.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::atomic::write_atomic;

/// Errors loading or flushing the processed set.
#[derive(Debug, Error)]
pub enum DedupError {
    /// The state file exists but could not be read.
    #[error("cannot read dedup state {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state file is not a JSON array of strings.
    #[error("dedup state {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Writing the state file failed.
    #[error("cannot write dedup state {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Persistent set of identities that completed the pipeline.
#[derive(Debug, Default)]
pub struct DedupStore {
    path: Option<PathBuf>,
    order: Vec<String>,
    members: HashSet<String>,
}

impl DedupStore {
    /// Loads the store at `path`. A missing file is an empty set.
    ///
    /// # Errors
    ///
    /// [`DedupError::Read`] if the file cannot be read and
    /// [`DedupError::Malformed`] if it is not a JSON array of strings.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DedupError> {
        let path = path.as_ref().to_path_buf();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no dedup state yet, starting empty");
                return Ok(Self {
                    path: Some(path),
                    ..Self::default()
                });
            }
            Err(source) => return Err(DedupError::Read { path, source }),
        };

        let stored: Vec<String> = if raw.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&raw).map_err(|source| DedupError::Malformed {
                path: path.clone(),
                source,
            })?
        };

        let mut store = Self {
            path: Some(path),
            ..Self::default()
        };
        for identity in stored {
            store.insert(identity);
        }
        info!(entries = store.len(), "dedup state loaded");
        Ok(store)
    }

    /// A store that never touches disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Whether `identity` has already been processed.
    #[must_use]
    pub fn contains(&self, identity: &str) -> bool {
        self.members.contains(identity)
    }

    /// Records `identity` as processed and flushes the state file.
    ///
    /// Returns `Ok(false)` without writing if the identity was already present.
    ///
    /// # Errors
    ///
    /// [`DedupError::Write`] if the flush fails; the identity is then removed
    /// again so memory and disk agree.
    #[instrument(skip(self))]
    pub fn mark_done(&mut self, identity: &str) -> Result<bool, DedupError> {
        if self.contains(identity) {
            return Ok(false);
        }
        self.insert(identity.to_string());

        if let Err(e) = self.flush() {
            self.members.remove(identity);
            self.order.pop();
            return Err(e);
        }
        debug!(entries = self.len(), "identity marked done");
        Ok(true)
    }

    /// Number of processed identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when nothing has been processed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Identities in insertion order.
    #[must_use]
    pub fn identities(&self) -> &[String] {
        &self.order
    }

    /// Backing file, `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn insert(&mut self, identity: String) {
        if self.members.insert(identity.clone()) {
            self.order.push(identity);
        }
    }

    fn flush(&self) -> Result<(), DedupError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        write_atomic(path, |writer| {
            serde_json::to_writer_pretty(&mut *writer, &self.order).map_err(std::io::Error::other)
        })
        .map_err(|source| DedupError::Write {
            path: path.clone(),
            source,
        })
    }
}
