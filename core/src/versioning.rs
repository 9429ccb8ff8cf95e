//! Version identifiers for versioned datasets.
//!
//! A versioned dataset stores each save under
//! `<filepath>/<version>/<file name>`. Versions are UTC timestamps formatted so
//! that lexicographic order is chronological order, which is what lets "latest"
//! be resolved by sorting.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// `chrono` format of generated versions, e.g. `2019-07-01T11.34.52.102Z`.
pub const VERSION_FORMAT: &str = "%Y-%m-%dT%H.%M.%S%.3fZ";

/// Generate a version string for the current instant.
pub fn generate_timestamp() -> String {
    Utc::now().format(VERSION_FORMAT).to_string()
}

/// The versions a dataset should use for loading and saving.
///
/// `load: None` resolves the latest existing version on every load;
/// `save: None` generates a fresh timestamp on every save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub load: Option<String>,
    pub save: Option<String>,
}

impl Version {
    pub fn new(load: Option<String>, save: Option<String>) -> Self {
        Self { load, save }
    }
}

/// Last segment of a slash separated path.
pub fn file_name(filepath: &str) -> &str {
    filepath
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(filepath)
}

/// Path of `filepath` stored under `version`.
pub fn versioned_path(filepath: &str, version: &str) -> String {
    let base = filepath.trim_end_matches('/');
    format!("{}/{}/{}", base, version, file_name(base))
}

/// Pick the greatest version among `candidates` that follow the versioned layout
/// of `filepath`. Paths that do not match the layout are ignored.
pub fn latest_version<'a, I>(filepath: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let base = filepath.trim_matches('/');
    let name = file_name(base);
    candidates
        .into_iter()
        .filter_map(|path| {
            let rest = path.trim_start_matches('/').strip_prefix(base)?;
            let (version, tail) = rest.strip_prefix('/')?.split_once('/')?;
            (tail == name && !version.is_empty()).then_some(version)
        })
        .max()
        .map(str::to_string)
}

/// Remembers which versions a dataset used on its last load and save.
#[derive(Debug, Default)]
pub struct VersionTracker {
    last_load: Mutex<Option<String>>,
    last_save: Mutex<Option<String>>,
}

impl VersionTracker {
    pub fn record_load(&self, version: &str) {
        *self.last_load.lock().unwrap_or_else(PoisonError::into_inner) = Some(version.to_string());
    }

    pub fn record_save(&self, version: &str) {
        *self.last_save.lock().unwrap_or_else(PoisonError::into_inner) = Some(version.to_string());
    }

    pub fn last_load(&self) -> Option<String> {
        self.last_load
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_save(&self) -> Option<String> {
        self.last_save
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
