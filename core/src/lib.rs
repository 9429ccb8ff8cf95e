//! Depot Core - a catalog of named datasets
//!
//! [`DataCatalog`] registers datasets by name and routes every load and save
//! through the dataset's transformer chain. Versioned datasets report the
//! versions they used to a run [`Journal`].

pub mod catalog;
pub mod config;
pub mod dataset;
pub mod error;
pub mod frozen;
pub mod journal;
pub mod transformer;
pub mod versioning;

pub use catalog::{DataCatalog, DataCatalogBuilder, FeedValue};
pub use config::{BuildContext, CatalogConfig, DataSetConfig};
pub use dataset::{
    DataSet, Format, LambdaDataSet, MemoryDataSet, ObjectStoreDataSet, Versioned,
};
pub use error::{CatalogError, CatalogResult};
pub use frozen::FrozenDataSets;
pub use journal::{Journal, JournalRecord, Operation};
pub use serde_json::Value;
pub use transformer::{LoadNext, ProfileTimeTransformer, SaveNext, Transformer};
pub use versioning::{Version, generate_timestamp};
