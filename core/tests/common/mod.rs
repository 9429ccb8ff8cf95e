//! Common test utilities and helpers for integration tests

use depot_core::{CatalogResult, DataSet, LoadNext, MemoryDataSet, SaveNext, Transformer, Value};
use std::sync::{Arc, Mutex};

/// Shared log of transformer calls, in call order.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Snapshot of the calls recorded so far
pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().expect("call log").clone()
}

/// Transformer that records entering and leaving every load and save.
#[derive(Debug)]
pub struct CountingTransformer {
    pub tag: String,
    pub log: CallLog,
}

impl CountingTransformer {
    pub fn new(tag: &str, log: &CallLog) -> Arc<dyn Transformer> {
        Arc::new(Self {
            tag: tag.to_string(),
            log: Arc::clone(log),
        })
    }

    fn record(&self, event: String) {
        self.log.lock().expect("call log").push(event);
    }
}

impl Transformer for CountingTransformer {
    fn load(&self, name: &str, next: LoadNext<'_>) -> CatalogResult<Value> {
        self.record(format!("{}:load:{}:enter", self.tag, name));
        let data = next();
        self.record(format!("{}:load:{}:exit", self.tag, name));
        data
    }

    fn save(&self, name: &str, next: SaveNext<'_>, data: Value) -> CatalogResult<()> {
        self.record(format!("{}:save:{}:enter", self.tag, name));
        let result = next(data);
        self.record(format!("{}:save:{}:exit", self.tag, name));
        result
    }
}

/// Empty in-memory dataset behind the trait object
pub fn memory() -> Arc<dyn DataSet> {
    Arc::new(MemoryDataSet::new())
}

/// In-memory dataset holding `data`
pub fn memory_with(data: Value) -> Arc<dyn DataSet> {
    Arc::new(MemoryDataSet::with_data(data))
}
