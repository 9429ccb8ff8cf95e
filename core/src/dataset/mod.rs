//! The dataset capability and its built-in implementations.
//!
//! A dataset owns exactly one backend and moves [`Value`]s in and out of it.
//! The catalog never looks inside a dataset beyond this trait.

mod lambda;
mod memory;
mod object;

pub use lambda::LambdaDataSet;
pub use memory::{MemoryDataSet, MemoryDataSetConfig};
pub use object::{Format, ObjectStoreDataSet, ObjectStoreDataSetConfig};

use serde_json::{Map, Value};
use std::fmt;

use crate::error::{CatalogError, CatalogResult};

/// Uniform load/save contract over a single storage backend.
///
/// Implementations use interior mutability for their own state: the catalog
/// shares one instance between shallow copies through `Arc`.
pub trait DataSet: Send + Sync + fmt::Debug {
    /// Read the data from the backend.
    fn load(&self) -> CatalogResult<Value>;

    /// Write `data` to the backend.
    fn save(&self, data: Value) -> CatalogResult<()>;

    /// Whether the backend currently holds data.
    ///
    /// Datasets that cannot tell keep the default, which reports the missing
    /// capability instead of guessing.
    fn exists(&self) -> CatalogResult<bool> {
        Err(CatalogError::not_implemented(self.type_name(), "exists"))
    }

    /// Drop any cached in-memory state.
    fn release(&self) -> CatalogResult<()> {
        Ok(())
    }

    /// Constructor parameters, used for diagnostics and `Display`.
    fn describe(&self) -> Map<String, Value>;

    /// Short type name used in log lines.
    fn type_name(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Version information, for datasets that support versioning.
    fn versioned(&self) -> Option<&dyn Versioned> {
        None
    }
}

/// Extension implemented by datasets that read and write versioned paths.
pub trait Versioned {
    /// Version used by the most recent load, if any.
    fn last_load_version(&self) -> Option<String>;

    /// Version used by the most recent save, if any.
    fn last_save_version(&self) -> Option<String>;
}

impl fmt::Display for dyn DataSet + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.type_name())?;
        let params = self.describe();
        let mut first = true;
        for (key, value) in params.iter().filter(|(_, v)| !v.is_null()) {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            match value {
                Value::String(s) => write!(f, "{}={}", key, s)?,
                other => write!(f, "{}={}", key, other)?,
            }
        }
        f.write_str(")")
    }
}

/// Value kind shown in descriptions instead of the value itself.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "<null>",
        Value::Bool(_) => "<bool>",
        Value::Number(_) => "<number>",
        Value::String(_) => "<string>",
        Value::Array(_) => "<array>",
        Value::Object(_) => "<object>",
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
}
