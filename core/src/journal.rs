//! Append-only record of dataset versions touched during a run.
//!
//! One [`Journal`] lives for one pipeline run. The catalog appends an entry
//! every time a versioned dataset is loaded or saved, so the exact versions a
//! run consumed and produced can be replayed later.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};

use crate::error::{CatalogError, CatalogResult};

/// Catalog operation recorded in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Load,
    Save,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Load => f.write_str("load"),
            Operation::Save => f.write_str("save"),
        }
    }
}

/// One journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub run_id: String,
    pub name: String,
    pub operation: Operation,
    pub version: String,
}

/// Run-scoped journal shared by every catalog copy of the run.
pub struct Journal {
    run_id: String,
    records: Mutex<Vec<JournalRecord>>,
    sink: Option<Mutex<File>>,
}

impl fmt::Debug for Journal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Journal")
            .field("run_id", &self.run_id)
            .field("records", &self.len())
            .field("file_sink", &self.sink.is_some())
            .finish()
    }
}

impl Journal {
    /// Journal kept in memory only.
    pub fn new<S: Into<String>>(run_id: S) -> Self {
        Self {
            run_id: run_id.into(),
            records: Mutex::new(Vec::new()),
            sink: None,
        }
    }

    /// Journal that also appends every record as a JSON line to `path`.
    pub fn with_file<S: Into<String>, P: AsRef<Path>>(run_id: S, path: P) -> CatalogResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                CatalogError::configuration_with_source(
                    format!("Cannot open journal file {}", path.display()),
                    e,
                )
            })?;
        let mut journal = Self::new(run_id);
        journal.sink = Some(Mutex::new(file));
        Ok(journal)
    }

    /// Identifier of the run this journal belongs to.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Append a catalog event.
    pub fn log_catalog(&self, name: &str, operation: Operation, version: &str) {
        let record = JournalRecord {
            run_id: self.run_id.clone(),
            name: name.to_string(),
            operation,
            version: version.to_string(),
        };

        match serde_json::to_string(&record) {
            Ok(line) => {
                info!(target: "depot::journal", "{}", line);
                if let Some(sink) = &self.sink {
                    let mut file = sink.lock().unwrap_or_else(PoisonError::into_inner);
                    if let Err(e) = writeln!(file, "{}", line) {
                        warn!("Failed to write journal record for '{}': {}", name, e);
                    }
                }
            }
            Err(e) => warn!("Failed to encode journal record for '{}': {}", name, e),
        }

        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    /// Snapshot of every record so far, oldest first.
    pub fn records(&self) -> Vec<JournalRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
