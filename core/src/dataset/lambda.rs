use serde_json::{Map, Value};
use std::fmt;

use super::DataSet;
use crate::error::{CatalogError, CatalogResult};

type LoadFn = Box<dyn Fn() -> CatalogResult<Value> + Send + Sync>;
type SaveFn = Box<dyn Fn(Value) -> CatalogResult<()> + Send + Sync>;
type ExistsFn = Box<dyn Fn() -> CatalogResult<bool> + Send + Sync>;
type ReleaseFn = Box<dyn Fn() -> CatalogResult<()> + Send + Sync>;

/// Dataset backed by caller supplied closures.
///
/// Missing `load` or `save` closures fail the operation; a missing `exists`
/// reports the capability as not implemented.
#[derive(Default)]
pub struct LambdaDataSet {
    load: Option<LoadFn>,
    save: Option<SaveFn>,
    exists: Option<ExistsFn>,
    release: Option<ReleaseFn>,
}

impl LambdaDataSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_load<F>(mut self, load: F) -> Self
    where
        F: Fn() -> CatalogResult<Value> + Send + Sync + 'static,
    {
        self.load = Some(Box::new(load));
        self
    }

    pub fn with_save<F>(mut self, save: F) -> Self
    where
        F: Fn(Value) -> CatalogResult<()> + Send + Sync + 'static,
    {
        self.save = Some(Box::new(save));
        self
    }

    pub fn with_exists<F>(mut self, exists: F) -> Self
    where
        F: Fn() -> CatalogResult<bool> + Send + Sync + 'static,
    {
        self.exists = Some(Box::new(exists));
        self
    }

    pub fn with_release<F>(mut self, release: F) -> Self
    where
        F: Fn() -> CatalogResult<()> + Send + Sync + 'static,
    {
        self.release = Some(Box::new(release));
        self
    }
}

impl fmt::Debug for LambdaDataSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LambdaDataSet")
            .field("load", &self.load.is_some())
            .field("save", &self.save.is_some())
            .field("exists", &self.exists.is_some())
            .field("release", &self.release.is_some())
            .finish()
    }
}

impl DataSet for LambdaDataSet {
    fn load(&self) -> CatalogResult<Value> {
        match &self.load {
            Some(load) => load(),
            None => Err(CatalogError::data_set(
                "Cannot load data set. No `load` function provided when LambdaDataSet was created.",
            )),
        }
    }

    fn save(&self, data: Value) -> CatalogResult<()> {
        match &self.save {
            Some(save) => save(data),
            None => Err(CatalogError::data_set(
                "Cannot save to data set. No `save` function provided when LambdaDataSet was created.",
            )),
        }
    }

    fn exists(&self) -> CatalogResult<bool> {
        match &self.exists {
            Some(exists) => exists(),
            None => Err(CatalogError::not_implemented(self.type_name(), "exists")),
        }
    }

    fn release(&self) -> CatalogResult<()> {
        match &self.release {
            Some(release) => release(),
            None => Ok(()),
        }
    }

    fn describe(&self) -> Map<String, Value> {
        let closure = |present: bool| {
            if present {
                Value::String("<closure>".to_string())
            } else {
                Value::Null
            }
        };
        let mut params = Map::new();
        params.insert("load".to_string(), closure(self.load.is_some()));
        params.insert("save".to_string(), closure(self.save.is_some()));
        params.insert("exists".to_string(), closure(self.exists.is_some()));
        params.insert("release".to_string(), closure(self.release.is_some()));
        params
    }

    fn type_name(&self) -> &'static str {
        "LambdaDataSet"
    }
}
