use depot_common::{
    CommonError, CompressionAlgorithm, CompressionBuilder, Compressor, Storage, StorageBackend,
    StorageBuilder,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, warn};

use super::{DataSet, Versioned};
use crate::config::{BuildContext, DataSetConfig};
use crate::error::{CatalogError, CatalogResult};
use crate::versioning::{Version, VersionTracker, generate_timestamp, latest_version, versioned_path};

/// Encoding of the stored object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Any JSON value.
    #[default]
    Json,
    /// UTF-8 text; only string values can be saved.
    Text,
}

impl Format {
    fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Text => "text",
        }
    }

    fn encode(&self, data: &Value) -> CatalogResult<Vec<u8>> {
        match (self, data) {
            (Format::Json, data) => serde_json::to_vec(data)
                .map_err(|e| CatalogError::data_set_with_source("Cannot encode data as JSON", e)),
            (Format::Text, Value::String(text)) => Ok(text.as_bytes().to_vec()),
            (Format::Text, other) => Err(CatalogError::data_set(format!(
                "Text format can only save strings, got {}",
                super::value_kind(other)
            ))),
        }
    }

    fn decode(&self, raw: &[u8]) -> CatalogResult<Value> {
        match self {
            Format::Json => serde_json::from_slice(raw)
                .map_err(|e| CatalogError::data_set_with_source("Stored object is not valid JSON", e)),
            Format::Text => String::from_utf8(raw.to_vec())
                .map(Value::String)
                .map_err(|e| CatalogError::data_set_with_source("Stored object is not valid UTF-8", e)),
        }
    }
}

/// Dataset that stores one object in an object store.
///
/// With a [`Version`] attached, every save goes to a fresh
/// `<filepath>/<version>/<file name>` path and loads resolve the requested or
/// latest version.
pub struct ObjectStoreDataSet {
    filepath: String,
    storage: Arc<dyn Storage>,
    format: Format,
    compressor: Option<Box<dyn Compressor>>,
    version: Option<Version>,
    versions: VersionTracker,
}

impl fmt::Debug for ObjectStoreDataSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreDataSet")
            .field("filepath", &self.filepath)
            .field("storage", &self.storage.describe())
            .field("format", &self.format)
            .field("compression", &self.compressor.as_ref().map(|c| c.algorithm()))
            .field("version", &self.version)
            .finish()
    }
}

impl ObjectStoreDataSet {
    pub fn new<S: Into<String>>(filepath: S, storage: Arc<dyn Storage>) -> Self {
        Self {
            filepath: filepath.into(),
            storage,
            format: Format::default(),
            compressor: None,
            version: None,
            versions: VersionTracker::default(),
        }
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn with_compressor(mut self, compressor: Box<dyn Compressor>) -> Self {
        self.compressor = Some(compressor);
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    pub fn filepath(&self) -> &str {
        &self.filepath
    }

    fn latest(&self) -> CatalogResult<Option<String>> {
        let paths = block_on(self.storage.list(&self.filepath))??;
        Ok(latest_version(&self.filepath, paths.iter().map(String::as_str)))
    }

    fn load_path(&self) -> CatalogResult<String> {
        let Some(version) = &self.version else {
            return Ok(self.filepath.clone());
        };
        let resolved = match &version.load {
            Some(load) => load.clone(),
            None => self.latest()?.ok_or_else(|| {
                CatalogError::data_set(format!(
                    "Did not find any versions for {}",
                    self as &dyn DataSet
                ))
            })?,
        };
        debug!("Resolved load version '{}' for '{}'", resolved, self.filepath);
        self.versions.record_load(&resolved);
        Ok(versioned_path(&self.filepath, &resolved))
    }

    fn check_save_consistency(&self, version: &Version, save_version: &str) {
        let load_version = match &version.load {
            Some(load) => Some(load.clone()),
            None => self.latest().ok().flatten(),
        };
        if let Some(load_version) = load_version {
            if load_version != save_version {
                warn!(
                    "Save version '{}' did not match load version '{}' for {}. Loading this data set will not return what was just saved.",
                    save_version, load_version, self as &dyn DataSet
                );
            }
        }
    }

    fn encode(&self, data: &Value) -> CatalogResult<Vec<u8>> {
        let raw = self.format.encode(data)?;
        match &self.compressor {
            Some(compressor) => Ok(compressor.compress(&raw)?),
            None => Ok(raw),
        }
    }

    fn decode(&self, bytes: Vec<u8>) -> CatalogResult<Value> {
        let raw = match &self.compressor {
            Some(compressor) => compressor.decompress(&bytes)?,
            None => bytes,
        };
        self.format.decode(&raw)
    }
}

impl DataSet for ObjectStoreDataSet {
    fn load(&self) -> CatalogResult<Value> {
        let path = self.load_path()?;
        let bytes = block_on(self.storage.get(&path))??.ok_or_else(|| {
            CatalogError::data_set(format!(
                "Failed while loading data from data set {}: no object at '{}'",
                self as &dyn DataSet, path
            ))
        })?;
        self.decode(bytes)
    }

    fn save(&self, data: Value) -> CatalogResult<()> {
        let payload = self.encode(&data)?;

        let Some(version) = &self.version else {
            block_on(self.storage.put(&self.filepath, payload))??;
            return Ok(());
        };

        let save_version = version.save.clone().unwrap_or_else(generate_timestamp);
        let path = versioned_path(&self.filepath, &save_version);
        block_on(self.storage.put_if_absent(&path, payload))?.map_err(|e| match e {
            CommonError::AlreadyExistsError { .. } => CatalogError::data_set(format!(
                "Save path '{}' for {} must not exist if versioning is enabled.",
                path, self as &dyn DataSet
            )),
            other => other.into(),
        })?;
        self.versions.record_save(&save_version);
        self.check_save_consistency(version, &save_version);
        Ok(())
    }

    fn exists(&self) -> CatalogResult<bool> {
        let path = match &self.version {
            None => self.filepath.clone(),
            Some(Version { load: Some(load), .. }) => versioned_path(&self.filepath, load),
            Some(_) => match self.latest()? {
                Some(latest) => versioned_path(&self.filepath, &latest),
                None => return Ok(false),
            },
        };
        Ok(block_on(self.storage.exists(&path))??)
    }

    fn describe(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("filepath".to_string(), Value::String(self.filepath.clone()));
        params.insert("storage".to_string(), Value::String(self.storage.describe()));
        params.insert("format".to_string(), Value::String(self.format.as_str().to_string()));
        params.insert(
            "compression".to_string(),
            self.compressor
                .as_ref()
                .map(|c| Value::String(c.algorithm().as_str().to_string()))
                .unwrap_or(Value::Null),
        );
        params.insert(
            "version".to_string(),
            self.version
                .as_ref()
                .and_then(|v| serde_json::to_value(v).ok())
                .unwrap_or(Value::Null),
        );
        params
    }

    fn type_name(&self) -> &'static str {
        "ObjectStoreDataSet"
    }

    fn versioned(&self) -> Option<&dyn Versioned> {
        self.version.as_ref().map(|_| self as &dyn Versioned)
    }
}

impl Versioned for ObjectStoreDataSet {
    fn last_load_version(&self) -> Option<String> {
        self.versions.last_load()
    }

    fn last_save_version(&self) -> Option<String> {
        self.versions.last_save()
    }
}

/// Drive a storage future to completion from synchronous code.
///
/// Inside a multi-thread Tokio runtime the future runs on a scoped thread
/// against the current handle. A current-thread runtime cannot drive its I/O
/// and timers while its only thread waits here, so the future gets a
/// throwaway runtime on the scoped thread instead. Outside any runtime the
/// throwaway runtime runs on the calling thread.
fn block_on<F>(future: F) -> CatalogResult<F::Output>
where
    F: Future + Send,
    F::Output: Send,
{
    let Ok(handle) = Handle::try_current() else {
        return run_on_fresh_runtime(future);
    };

    std::thread::scope(|s| {
        let task = if handle.runtime_flavor() == RuntimeFlavor::CurrentThread {
            s.spawn(move || run_on_fresh_runtime(future))
        } else {
            s.spawn(move || Ok(handle.block_on(future)))
        };
        task.join()
            .map_err(|_| CatalogError::data_set("Storage task panicked"))?
    })
}

fn run_on_fresh_runtime<F: Future>(future: F) -> CatalogResult<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CatalogError::data_set_with_source("Cannot start storage runtime", e))?;
    Ok(runtime.block_on(future))
}

/// Configuration entry for [`ObjectStoreDataSet`].
///
/// ```json
/// {"type": "ObjectStoreDataSet", "filepath": "cars.json",
///  "backend": {"kind": "local", "root_path": "data"}, "versioned": true}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreDataSetConfig {
    pub filepath: String,
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub key_prefix: Option<String>,
    #[serde(default)]
    pub format: Format,
    #[serde(default)]
    pub compression: Option<CompressionAlgorithm>,
    #[serde(default)]
    pub versioned: bool,
    #[serde(default)]
    pub credentials: Option<HashMap<String, String>>,
}

#[typetag::serde(name = "ObjectStoreDataSet")]
impl DataSetConfig for ObjectStoreDataSetConfig {
    fn build(&self, ctx: &BuildContext<'_>) -> CatalogResult<Arc<dyn DataSet>> {
        let mut backend = self.backend.clone();
        if let Some(credentials) = &self.credentials {
            backend.apply_credentials(credentials);
        }

        let mut builder = StorageBuilder::new().backend(backend);
        if let Some(prefix) = &self.key_prefix {
            builder = builder.key_prefix(prefix.clone());
        }

        let mut data_set =
            ObjectStoreDataSet::new(self.filepath.clone(), builder.build()?).with_format(self.format);
        if let Some(algorithm) = self.compression {
            data_set = data_set.with_compressor(CompressionBuilder::with_algorithm(algorithm).build()?);
        }
        if self.versioned {
            data_set = data_set.with_version(ctx.version());
        }
        Ok(Arc::new(data_set))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    fn memory_storage() -> Arc<dyn Storage> {
        StorageBuilder::new().build().expect("memory storage")
    }

    #[test]
    fn test_unversioned_round_trip_overwrites() {
        let data_set = ObjectStoreDataSet::new("cars.json", memory_storage());
        assert!(!data_set.exists().expect("exists"));

        data_set.save(json!({"cars": 1})).expect("save");
        data_set.save(json!({"cars": 2})).expect("overwrite");

        assert!(data_set.exists().expect("exists"));
        assert_eq!(data_set.load().expect("load"), json!({"cars": 2}));
        assert!(data_set.versioned().is_none());
    }

    #[test]
    fn test_text_format_rejects_non_strings() {
        let data_set = ObjectStoreDataSet::new("notes.txt", memory_storage()).with_format(Format::Text);
        assert!(data_set.save(json!(12)).is_err());

        data_set.save(json!("hello")).expect("save");
        assert_eq!(data_set.load().expect("load"), json!("hello"));
    }

    #[test]
    fn test_compressed_objects_round_trip() {
        let compressor = CompressionBuilder::with_algorithm(CompressionAlgorithm::Zstd)
            .build()
            .expect("compressor");
        let data_set =
            ObjectStoreDataSet::new("cars.json.zst", memory_storage()).with_compressor(compressor);

        data_set.save(json!({"rows": [1, 2, 3]})).expect("save");
        assert_eq!(data_set.load().expect("load"), json!({"rows": [1, 2, 3]}));
    }

    #[test]
    fn test_versioned_load_picks_latest() {
        let storage = memory_storage();
        for version in ["2019-01-01T00.00.00.000Z", "2019-02-01T00.00.00.000Z"] {
            ObjectStoreDataSet::new("cars.json", Arc::clone(&storage))
                .with_version(Version::new(None, Some(version.to_string())))
                .save(json!(version))
                .expect("save");
        }

        let data_set =
            ObjectStoreDataSet::new("cars.json", storage).with_version(Version::default());
        assert!(data_set.exists().expect("exists"));
        assert_eq!(data_set.load().expect("load"), json!("2019-02-01T00.00.00.000Z"));

        let versioned = data_set.versioned().expect("versioned");
        assert_eq!(
            versioned.last_load_version().as_deref(),
            Some("2019-02-01T00.00.00.000Z")
        );
        assert_eq!(versioned.last_save_version(), None);
    }

    #[test]
    fn test_versioned_without_saves() {
        let data_set =
            ObjectStoreDataSet::new("cars.json", memory_storage()).with_version(Version::default());
        assert!(!data_set.exists().expect("exists"));
        let err = data_set.load().expect_err("no versions");
        assert!(err.to_string().contains("Did not find any versions"));
    }

    #[test]
    fn test_versioned_save_path_must_not_exist() {
        let data_set = ObjectStoreDataSet::new("cars.json", memory_storage())
            .with_version(Version::new(None, Some("2019-01-01T00.00.00.000Z".to_string())));

        data_set.save(json!(1)).expect("first save");
        let err = data_set.save(json!(2)).expect_err("second save");
        assert!(err.to_string().contains("must not exist if versioning is enabled"));
    }

    #[test]
    #[traced_test]
    fn test_mismatched_versions_warn() {
        let data_set = ObjectStoreDataSet::new("cars.json", memory_storage()).with_version(Version::new(
            Some("2019-01-01T00.00.00.000Z".to_string()),
            Some("2019-02-01T00.00.00.000Z".to_string()),
        ));

        data_set.save(json!(1)).expect("save");

        assert!(logs_contain("did not match load version"));
        assert_eq!(
            data_set.last_save_version().as_deref(),
            Some("2019-02-01T00.00.00.000Z")
        );
    }

    #[test]
    fn test_local_backend_from_config() {
        let dir = TempDir::new().expect("temp dir");
        let kind: Box<dyn DataSetConfig> = serde_json::from_value(json!({
            "type": "ObjectStoreDataSet",
            "filepath": "raw/cars.json",
            "backend": {"kind": "local", "root_path": dir.path()},
            "versioned": true
        }))
        .expect("config");

        let ctx = BuildContext {
            name: "cars",
            load_version: None,
            save_version: Some("2020-01-01T00.00.00.000Z"),
        };
        let data_set = kind.build(&ctx).expect("build");
        data_set.save(json!([1, 2])).expect("save");

        assert!(
            dir.path()
                .join("raw/cars.json/2020-01-01T00.00.00.000Z/cars.json")
                .exists()
        );
        assert_eq!(data_set.load().expect("load"), json!([1, 2]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_usable_inside_a_runtime() {
        let data_set = ObjectStoreDataSet::new("cars.json", memory_storage());
        data_set.save(json!("async")).expect("save");
        assert_eq!(data_set.load().expect("load"), json!("async"));
    }

    async fn after_timer() -> u32 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        7
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_timer_futures_finish_on_current_thread_runtime() {
        let handle = Handle::current();
        let (done, finished) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let _runtime = handle.enter();
            let _ = done.send(block_on(after_timer()));
        });

        let result = finished
            .recv_timeout(Duration::from_secs(5))
            .expect("storage bridge stalled");
        assert_eq!(result.expect("block_on"), 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timer_futures_finish_on_multi_thread_runtime() {
        assert_eq!(block_on(after_timer()).expect("block_on"), 7);
    }

    #[test]
    fn test_timer_futures_finish_outside_a_runtime() {
        assert_eq!(block_on(after_timer()).expect("block_on"), 7);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_data_set_usable_on_current_thread_runtime() {
        let dir = TempDir::new().expect("temp dir");
        let storage = StorageBuilder::new()
            .backend(StorageBackend::LocalFileSystem {
                root_path: dir.path().to_string_lossy().to_string(),
            })
            .build()
            .expect("local storage");
        let data_set = ObjectStoreDataSet::new("cars.json", storage);

        data_set.save(json!({"seats": 2})).expect("save");
        assert_eq!(data_set.load().expect("load"), json!({"seats": 2}));
    }
}
