//! Building a catalog from configuration.
//!
//! Every catalog entry is a JSON object whose `type` field selects a
//! [`DataSetConfig`] implementation registered with `typetag`:
//!
//! ```json
//! {
//!   "cars": {"type": "ObjectStoreDataSet", "filepath": "cars.json",
//!            "backend": {"kind": "s3", "bucket": "raw", "region": "eu-west-1"},
//!            "credentials": "s3_raw", "versioned": true},
//!   "params": {"type": "MemoryDataSet", "data": {"alpha": 0.1}}
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::DataCatalog;
use crate::dataset::DataSet;
use crate::error::{CatalogError, CatalogResult};
use crate::journal::Journal;
use crate::versioning::{Version, generate_timestamp};

/// Key of a catalog entry naming its credentials.
pub const CREDENTIALS_KEY: &str = "credentials";

/// Key of a catalog entry selecting the dataset kind.
pub const TYPE_KEY: &str = "type";

/// Construction parameters of one dataset kind.
#[typetag::serde(tag = "type")]
pub trait DataSetConfig: Debug + Send + Sync {
    fn build(&self, ctx: &BuildContext<'_>) -> CatalogResult<Arc<dyn DataSet>>;
}

/// What a [`DataSetConfig`] knows about the catalog it is built for.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub name: &'a str,
    pub load_version: Option<&'a str>,
    pub save_version: Option<&'a str>,
}

impl BuildContext<'_> {
    /// Version for datasets that have versioning enabled.
    pub fn version(&self) -> Version {
        Version::new(
            self.load_version.map(str::to_string),
            self.save_version.map(str::to_string),
        )
    }
}

/// Everything needed to build a catalog from configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Dataset name to dataset configuration.
    pub catalog: Map<String, Value>,
    /// Credentials name to credentials entry.
    pub credentials: Map<String, Value>,
    /// Exact load versions by dataset name.
    pub load_versions: HashMap<String, String>,
    /// Save version shared by every versioned dataset.
    pub save_version: Option<String>,
}

impl CatalogConfig {
    pub fn from_json_str(json: &str) -> CatalogResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            CatalogError::configuration_with_source("Cannot parse catalog configuration", e)
        })
    }
}

fn resolve_credentials(name: &str, credentials: &Map<String, Value>) -> CatalogResult<Value> {
    credentials
        .get(name)
        .cloned()
        .ok_or_else(|| CatalogError::CredentialsNotFound {
            name: name.to_string(),
        })
}

fn build_data_set(
    name: &str,
    config: &Value,
    credentials: &Map<String, Value>,
    ctx: &BuildContext<'_>,
) -> CatalogResult<Arc<dyn DataSet>> {
    let Some(entry) = config.as_object() else {
        return Err(CatalogError::configuration(format!(
            "Catalog configuration of DataSet '{}' must be a mapping",
            name
        )));
    };
    if !entry.contains_key(TYPE_KEY) {
        return Err(CatalogError::configuration(format!(
            "`type` is missing from DataSet '{}' catalog configuration",
            name
        )));
    }

    let mut entry = entry.clone();
    if let Some(Value::String(credentials_name)) = entry.get(CREDENTIALS_KEY) {
        let resolved = resolve_credentials(credentials_name, credentials)?;
        entry.insert(CREDENTIALS_KEY.to_string(), resolved);
    }

    let kind: Box<dyn DataSetConfig> = serde_json::from_value(Value::Object(entry)).map_err(|e| {
        CatalogError::configuration_with_source(
            format!("An exception occurred when parsing config for DataSet '{}'", name),
            e,
        )
    })?;
    debug!("Building DataSet '{}' from {:?}", name, kind);
    kind.build(ctx)
}

impl DataCatalog {
    /// Build a catalog from configuration.
    ///
    /// The save version is `config.save_version`, else the journal's run id,
    /// else a fresh timestamp. Nothing is returned unless every entry builds.
    pub fn from_config(config: &CatalogConfig, journal: Option<Arc<Journal>>) -> CatalogResult<Self> {
        let save_version = config
            .save_version
            .clone()
            .or_else(|| journal.as_ref().map(|j| j.run_id().to_string()))
            .unwrap_or_else(generate_timestamp);

        let mut missing: Vec<&str> = config
            .load_versions
            .keys()
            .map(String::as_str)
            .filter(|name| !config.catalog.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            missing.sort_unstable();
            warn!(
                "`load_versions` keys [{}] are not found in the catalog.",
                missing.join(", ")
            );
        }

        let mut data_sets = Vec::with_capacity(config.catalog.len());
        for (name, entry) in &config.catalog {
            let ctx = BuildContext {
                name,
                load_version: config.load_versions.get(name).map(String::as_str),
                save_version: Some(save_version.as_str()),
            };
            data_sets.push((name.clone(), build_data_set(name, entry, &config.credentials, &ctx)?));
        }

        let mut builder = DataCatalog::builder().data_sets(data_sets);
        if let Some(journal) = journal {
            builder = builder.journal(journal);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracing_test::traced_test;

    fn config(catalog: Value) -> CatalogConfig {
        CatalogConfig {
            catalog: catalog.as_object().cloned().unwrap_or_default(),
            ..CatalogConfig::default()
        }
    }

    #[test]
    fn test_order_follows_configuration() {
        let config = CatalogConfig::from_json_str(
            r#"{"catalog": {
                "zebra": {"type": "MemoryDataSet"},
                "apple": {"type": "MemoryDataSet", "data": [1, 2]}
            }}"#,
        )
        .expect("config");

        let catalog = DataCatalog::from_config(&config, None).expect("catalog");
        assert_eq!(catalog.list(), ["zebra", "apple"]);
        assert_eq!(catalog.load("apple").expect("load"), json!([1, 2]));
    }

    #[test]
    fn test_unknown_type_is_a_configuration_error() {
        let err = DataCatalog::from_config(&config(json!({"cars": {"type": "NoSuchDataSet"}})), None)
            .expect_err("unknown type");
        assert!(matches!(err, CatalogError::Configuration { .. }));
        assert!(err.to_string().contains("'cars'"));
    }

    #[test]
    fn test_entry_must_be_a_mapping() {
        let err = DataCatalog::from_config(&config(json!({"cars": "MemoryDataSet"})), None)
            .expect_err("not a mapping");
        assert!(matches!(err, CatalogError::Configuration { .. }));
    }

    #[test]
    #[traced_test]
    fn test_stale_load_versions_only_warn() {
        let mut config = config(json!({"cars": {"type": "MemoryDataSet"}}));
        config
            .load_versions
            .insert("boats".to_string(), "2019-01-01T00.00.00.000Z".to_string());

        let catalog = DataCatalog::from_config(&config, None).expect("catalog");

        assert_eq!(catalog.list(), ["cars"]);
        assert!(logs_contain("`load_versions` keys [boats] are not found in the catalog."));
    }

    #[test]
    fn test_build_context_version() {
        let ctx = BuildContext {
            name: "cars",
            load_version: Some("v1"),
            save_version: None,
        };
        assert_eq!(ctx.version(), Version::new(Some("v1".to_string()), None));
    }
}
