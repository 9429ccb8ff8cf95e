//! Read-only snapshot of the datasets registered in a catalog.

use std::collections::HashMap;
use std::sync::Arc;

use crate::dataset::DataSet;
use crate::error::{CatalogError, CatalogResult};

#[derive(Debug, Default)]
struct Snapshot {
    names: Vec<String>,
    by_name: HashMap<String, Arc<dyn DataSet>>,
}

/// Datasets of a catalog as of its last registry change.
///
/// The catalog builds a new snapshot on every `add`; a handle obtained earlier
/// keeps showing the datasets that were registered at that time.
#[derive(Debug, Clone, Default)]
pub struct FrozenDataSets {
    inner: Arc<Snapshot>,
}

impl FrozenDataSets {
    pub(crate) fn snapshot(names: &[String], data_sets: &HashMap<String, Arc<dyn DataSet>>) -> Self {
        let by_name = names
            .iter()
            .filter_map(|name| {
                data_sets
                    .get(name)
                    .map(|data_set| (name.clone(), Arc::clone(data_set)))
            })
            .collect();
        Self {
            inner: Arc::new(Snapshot {
                names: names.to_vec(),
                by_name,
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn DataSet>> {
        self.inner.by_name.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.by_name.contains_key(name)
    }

    /// Names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.names.iter().map(String::as_str)
    }

    /// `(name, dataset)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn DataSet>)> {
        self.inner
            .names
            .iter()
            .filter_map(|name| self.inner.by_name.get(name).map(|d| (name.as_str(), d)))
    }

    pub fn len(&self) -> usize {
        self.inner.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.names.is_empty()
    }

    /// Always rejected: the view cannot be changed.
    pub fn set(&self, name: &str, _data_set: Arc<dyn DataSet>) -> CatalogResult<()> {
        let hint = if self.contains(name) {
            "Please change datasets through configuration."
        } else {
            "Please use DataCatalog::add() instead."
        };
        Err(CatalogError::ReadOnlyView {
            hint: hint.to_string(),
        })
    }
}
