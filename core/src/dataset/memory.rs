use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use super::{DataSet, value_kind};
use crate::config::{BuildContext, DataSetConfig};
use crate::error::{CatalogError, CatalogResult};

/// Dataset that keeps its value in process memory.
///
/// Loads and saves copy the value, so a caller mutating what it loaded never
/// changes what the next `load` returns.
#[derive(Debug, Default)]
pub struct MemoryDataSet {
    data: Mutex<Option<Value>>,
}

impl MemoryDataSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data<V: Into<Value>>(data: V) -> Self {
        Self {
            data: Mutex::new(Some(data.into())),
        }
    }
}

impl DataSet for MemoryDataSet {
    fn load(&self) -> CatalogResult<Value> {
        self.data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| CatalogError::data_set("Data for MemoryDataSet has not been saved yet."))
    }

    fn save(&self, data: Value) -> CatalogResult<()> {
        *self.data.lock().unwrap_or_else(PoisonError::into_inner) = Some(data);
        Ok(())
    }

    fn exists(&self) -> CatalogResult<bool> {
        Ok(self
            .data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some())
    }

    fn release(&self) -> CatalogResult<()> {
        debug!("Releasing in-memory data");
        self.data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }

    fn describe(&self) -> Map<String, Value> {
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        let mut params = Map::new();
        params.insert(
            "data".to_string(),
            data.as_ref()
                .map(|v| Value::String(value_kind(v).to_string()))
                .unwrap_or(Value::Null),
        );
        params
    }

    fn type_name(&self) -> &'static str {
        "MemoryDataSet"
    }
}

/// Configuration entry for [`MemoryDataSet`]: `{"type": "MemoryDataSet", "data": ...}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryDataSetConfig {
    #[serde(default)]
    pub data: Option<Value>,
}

#[typetag::serde(name = "MemoryDataSet")]
impl DataSetConfig for MemoryDataSetConfig {
    fn build(&self, _ctx: &BuildContext<'_>) -> CatalogResult<Arc<dyn DataSet>> {
        Ok(Arc::new(match &self.data {
            Some(data) => MemoryDataSet::with_data(data.clone()),
            None => MemoryDataSet::new(),
        }))
    }
}
