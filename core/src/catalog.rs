//! The dataset registry.
//!
//! [`DataCatalog`] maps names to datasets, wraps every load and save in the
//! dataset's transformer chain, and reports the versions used to the run
//! journal.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::dataset::{DataSet, MemoryDataSet};
use crate::error::{CatalogError, CatalogResult};
use crate::frozen::FrozenDataSets;
use crate::journal::{Journal, Operation};
use crate::transformer::{Transformer, load_through, save_through};

/// Entry of a feed dict: either raw data or a ready dataset.
pub enum FeedValue {
    Data(Value),
    DataSet(Arc<dyn DataSet>),
}

impl From<Value> for FeedValue {
    fn from(data: Value) -> Self {
        FeedValue::Data(data)
    }
}

impl From<Arc<dyn DataSet>> for FeedValue {
    fn from(data_set: Arc<dyn DataSet>) -> Self {
        FeedValue::DataSet(data_set)
    }
}

impl fmt::Debug for FeedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedValue::Data(data) => f.debug_tuple("Data").field(data).finish(),
            FeedValue::DataSet(data_set) => f.debug_tuple("DataSet").field(data_set).finish(),
        }
    }
}

impl FeedValue {
    fn into_data_set(self) -> Arc<dyn DataSet> {
        match self {
            FeedValue::Data(data) => Arc::new(MemoryDataSet::with_data(data)),
            FeedValue::DataSet(data_set) => data_set,
        }
    }
}

/// Registry of named datasets.
///
/// Cloning a catalog is a shallow copy: datasets and the journal are shared,
/// the registry and transformer lists are not.
#[derive(Debug, Clone, Default)]
pub struct DataCatalog {
    names: Vec<String>,
    data_sets: HashMap<String, Arc<dyn DataSet>>,
    transformers: HashMap<String, Vec<Arc<dyn Transformer>>>,
    default_transformers: Vec<Arc<dyn Transformer>>,
    journal: Option<Arc<Journal>>,
    frozen: FrozenDataSets,
}

impl DataCatalog {
    /// Empty catalog without a journal.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> DataCatalogBuilder {
        DataCatalogBuilder::default()
    }

    fn data_set(&self, name: &str) -> CatalogResult<&Arc<dyn DataSet>> {
        self.data_sets
            .get(name)
            .ok_or_else(|| CatalogError::not_found(name))
    }

    fn chain(&self, name: &str) -> &[Arc<dyn Transformer>] {
        self.transformers.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Load the data of a registered dataset.
    pub fn load(&self, name: &str) -> CatalogResult<Value> {
        let data_set = self.data_set(name)?;
        info!("Loading data from `{}` ({})...", name, data_set.type_name());

        let data = load_through(name, data_set.as_ref(), self.chain(name))?;

        let version = data_set.versioned().and_then(|v| v.last_load_version());
        if let (Some(journal), Some(version)) = (&self.journal, version) {
            journal.log_catalog(name, Operation::Load, &version);
        }
        Ok(data)
    }

    /// Load and deserialize into `T`.
    pub fn load_as<T: DeserializeOwned>(&self, name: &str) -> CatalogResult<T> {
        let data = self.load(name)?;
        serde_json::from_value(data).map_err(|e| {
            CatalogError::data_set_with_source(
                format!("Data loaded from '{}' does not have the requested shape", name),
                e,
            )
        })
    }

    /// Save data to a registered dataset.
    pub fn save(&self, name: &str, data: Value) -> CatalogResult<()> {
        let data_set = self.data_set(name)?;
        info!("Saving data to `{}` ({})...", name, data_set.type_name());

        save_through(name, data_set.as_ref(), self.chain(name), data)?;

        let version = data_set.versioned().and_then(|v| v.last_save_version());
        if let (Some(journal), Some(version)) = (&self.journal, version) {
            journal.log_catalog(name, Operation::Save, &version);
        }
        Ok(())
    }

    /// Serialize `data` and save it.
    pub fn save_from<T: Serialize + ?Sized>(&self, name: &str, data: &T) -> CatalogResult<()> {
        let value = serde_json::to_value(data).map_err(|e| {
            CatalogError::data_set_with_source(format!("Cannot serialize data for '{}'", name), e)
        })?;
        self.save(name, value)
    }

    /// Whether the dataset holds data.
    ///
    /// A dataset without an existence check is reported as not existing.
    pub fn exists(&self, name: &str) -> CatalogResult<bool> {
        let data_set = self.data_set(name)?;
        match data_set.exists() {
            Err(e) if e.is_not_implemented() => {
                warn!(
                    "`exists()` not implemented for `{}`. Assuming output does not exist.",
                    data_set.type_name()
                );
                Ok(false)
            }
            other => other,
        }
    }

    /// Ask a dataset to drop cached data. The name stays registered.
    pub fn release(&self, name: &str) -> CatalogResult<()> {
        self.data_set(name)?.release()
    }

    /// Register `data_set` under `name`.
    ///
    /// The dataset starts with a copy of the default transformers.
    pub fn add<S: Into<String>>(
        &mut self,
        name: S,
        data_set: Arc<dyn DataSet>,
        replace: bool,
    ) -> CatalogResult<()> {
        let name = name.into();
        if !replace && self.data_sets.contains_key(&name) {
            return Err(CatalogError::already_exists(name));
        }
        self.insert(name, data_set);
        self.refreeze();
        Ok(())
    }

    /// Register several datasets.
    ///
    /// Names are checked before anything is registered, so a rejected batch
    /// leaves the catalog unchanged.
    pub fn add_all<I, S>(&mut self, data_sets: I, replace: bool) -> CatalogResult<()>
    where
        I: IntoIterator<Item = (S, Arc<dyn DataSet>)>,
        S: Into<String>,
    {
        let entries: Vec<(String, Arc<dyn DataSet>)> = data_sets
            .into_iter()
            .map(|(name, data_set)| (name.into(), data_set))
            .collect();

        if !replace {
            let mut seen = HashSet::new();
            for (name, _) in &entries {
                if self.data_sets.contains_key(name) || !seen.insert(name.as_str()) {
                    return Err(CatalogError::already_exists(name.clone()));
                }
            }
        }

        for (name, data_set) in entries {
            self.insert(name, data_set);
        }
        self.refreeze();
        Ok(())
    }

    /// Register raw values as in-memory datasets and datasets as they are.
    pub fn add_feed_dict<I, S, V>(&mut self, feed_dict: I, replace: bool) -> CatalogResult<()>
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: Into<FeedValue>,
    {
        self.add_all(
            feed_dict
                .into_iter()
                .map(|(name, value)| (name, FeedValue::into_data_set(value.into()))),
            replace,
        )
    }

    /// Attach `transformer` to every registered dataset and to datasets added
    /// later.
    pub fn add_transformer(&mut self, transformer: Arc<dyn Transformer>) {
        for chain in self.transformers.values_mut() {
            chain.push(Arc::clone(&transformer));
        }
        self.default_transformers.push(transformer);
    }

    /// Attach `transformer` to the named datasets only.
    ///
    /// Fails without attaching anything if a name is not registered.
    pub fn add_transformer_to<I, S>(
        &mut self,
        transformer: Arc<dyn Transformer>,
        names: I,
    ) -> CatalogResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<S> = names.into_iter().collect();
        for name in &names {
            let name: &str = name.as_ref();
            if !self.data_sets.contains_key(name) {
                return Err(CatalogError::not_found(name));
            }
        }
        for name in &names {
            let name: &str = name.as_ref();
            if let Some(chain) = self.transformers.get_mut(name) {
                chain.push(Arc::clone(&transformer));
            }
        }
        Ok(())
    }

    /// Registered names in registration order.
    pub fn list(&self) -> &[String] {
        &self.names
    }

    /// New catalog sharing this catalog's datasets, transformers and journal.
    pub fn shallow_copy(&self) -> Self {
        self.clone()
    }

    /// Read-only snapshot of the registered datasets.
    pub fn datasets(&self) -> FrozenDataSets {
        self.frozen.clone()
    }

    pub fn journal(&self) -> Option<&Arc<Journal>> {
        self.journal.as_ref()
    }

    fn insert(&mut self, name: String, data_set: Arc<dyn DataSet>) {
        if self.data_sets.contains_key(&name) {
            warn!("Replacing DataSet '{}'", name);
        } else {
            self.names.push(name.clone());
        }
        self.transformers
            .insert(name.clone(), self.default_transformers.clone());
        self.data_sets.insert(name, data_set);
    }

    fn refreeze(&mut self) {
        self.frozen = FrozenDataSets::snapshot(&self.names, &self.data_sets);
    }
}

/// Builds a [`DataCatalog`] from datasets, feed data and transformers.
#[derive(Debug, Default)]
pub struct DataCatalogBuilder {
    data_sets: Vec<(String, Arc<dyn DataSet>)>,
    feed_dict: Vec<(String, FeedValue)>,
    transformers: Vec<(String, Vec<Arc<dyn Transformer>>)>,
    default_transformers: Vec<Arc<dyn Transformer>>,
    journal: Option<Arc<Journal>>,
}

impl DataCatalogBuilder {
    pub fn data_set<S: Into<String>>(mut self, name: S, data_set: Arc<dyn DataSet>) -> Self {
        self.data_sets.push((name.into(), data_set));
        self
    }

    pub fn data_sets<I, S>(mut self, data_sets: I) -> Self
    where
        I: IntoIterator<Item = (S, Arc<dyn DataSet>)>,
        S: Into<String>,
    {
        self.data_sets
            .extend(data_sets.into_iter().map(|(name, d)| (name.into(), d)));
        self
    }

    /// Data registered through [`DataCatalog::add_feed_dict`] once the
    /// datasets are in place.
    pub fn feed<S: Into<String>, V: Into<FeedValue>>(mut self, name: S, value: V) -> Self {
        self.feed_dict.push((name.into(), value.into()));
        self
    }

    /// Explicit transformer list for one of the builder's datasets.
    pub fn transformers<S: Into<String>>(
        mut self,
        name: S,
        transformers: Vec<Arc<dyn Transformer>>,
    ) -> Self {
        self.transformers.push((name.into(), transformers));
        self
    }

    /// Transformer given to every dataset without an explicit list.
    pub fn default_transformer(mut self, transformer: Arc<dyn Transformer>) -> Self {
        self.default_transformers.push(transformer);
        self
    }

    pub fn journal(mut self, journal: Arc<Journal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn build(self) -> CatalogResult<DataCatalog> {
        let mut catalog = DataCatalog {
            default_transformers: self.default_transformers,
            journal: self.journal,
            ..DataCatalog::default()
        };
        catalog.add_all(self.data_sets, false)?;

        let excess: Vec<&str> = self
            .transformers
            .iter()
            .map(|(name, _)| name.as_str())
            .filter(|name| !catalog.data_sets.contains_key(*name))
            .collect();
        if !excess.is_empty() {
            return Err(CatalogError::configuration(format!(
                "Unexpected transformers for missing data_sets {}",
                excess.join(", ")
            )));
        }
        for (name, transformers) in self.transformers {
            catalog.transformers.insert(name, transformers);
        }

        catalog.add_feed_dict(self.feed_dict, false)?;
        Ok(catalog)
    }
}
