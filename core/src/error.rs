//! Error types for catalog and dataset operations.

use depot_common::{CommonError, Diagnose, ErrorCategory, ErrorSeverity};
use thiserror::Error;

/// Errors raised by the catalog, its datasets and its transformers.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// An operation referenced a name that was never registered.
    #[error("DataSet '{name}' not found in the catalog")]
    DataSetNotFound { name: String },

    /// `add` without `replace` on a name that is already registered.
    #[error("DataSet '{name}' has already been registered")]
    DataSetAlreadyExists { name: String },

    /// Catalog construction rejected its input.
    #[error("Invalid catalog configuration: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// A dataset configuration referenced an unknown credentials entry.
    #[error(
        "Unable to find credentials '{name}': check your data catalog and credentials configuration"
    )]
    CredentialsNotFound { name: String },

    /// A dataset failed to load, save or inspect its backend.
    #[error("{message}")]
    DataSet {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// The dataset does not provide the requested capability.
    #[error("{dataset} does not implement `{operation}`")]
    NotImplemented {
        dataset: String,
        operation: &'static str,
    },

    /// Attempted mutation through the read-only dataset view.
    #[error("Operation not allowed! {hint}")]
    ReadOnlyView { hint: String },

    #[error(transparent)]
    Common(#[from] CommonError),
}

/// Result type alias for catalog operations.
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

impl CatalogError {
    pub fn not_found<S: Into<String>>(name: S) -> Self {
        Self::DataSetNotFound { name: name.into() }
    }

    pub fn already_exists<S: Into<String>>(name: S) -> Self {
        Self::DataSetAlreadyExists { name: name.into() }
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    pub fn configuration_with_source<S: Into<String>, E: Into<anyhow::Error>>(
        message: S,
        source: E,
    ) -> Self {
        Self::Configuration {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn data_set<S: Into<String>>(message: S) -> Self {
        Self::DataSet {
            message: message.into(),
            source: None,
        }
    }

    pub fn data_set_with_source<S: Into<String>, E: Into<anyhow::Error>>(
        message: S,
        source: E,
    ) -> Self {
        Self::DataSet {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn not_implemented<S: Into<String>>(dataset: S, operation: &'static str) -> Self {
        Self::NotImplemented {
            dataset: dataset.into(),
            operation,
        }
    }

    /// Whether this error means "capability missing" rather than "operation failed".
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, CatalogError::NotImplemented { .. })
    }
}

impl Diagnose for CatalogError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            CatalogError::DataSetNotFound { .. } | CatalogError::DataSetAlreadyExists { .. } => {
                ErrorSeverity::Medium
            }
            CatalogError::NotImplemented { .. } | CatalogError::ReadOnlyView { .. } => {
                ErrorSeverity::Low
            }
            CatalogError::Configuration { .. }
            | CatalogError::CredentialsNotFound { .. }
            | CatalogError::DataSet { .. } => ErrorSeverity::High,
            CatalogError::Common(e) => e.severity(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            CatalogError::DataSetNotFound { .. } | CatalogError::DataSetAlreadyExists { .. } => {
                ErrorCategory::Resource
            }
            CatalogError::Configuration { .. } => ErrorCategory::Configuration,
            CatalogError::CredentialsNotFound { .. } => ErrorCategory::Security,
            CatalogError::DataSet { .. } => ErrorCategory::DataProcessing,
            CatalogError::NotImplemented { .. } | CatalogError::ReadOnlyView { .. } => {
                ErrorCategory::Internal
            }
            CatalogError::Common(e) => e.category(),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        let hints: &[&str] = match self {
            CatalogError::DataSetNotFound { .. } => &["Check the name against DataCatalog::list()"],
            CatalogError::DataSetAlreadyExists { .. } => &["Pass `replace = true` to overwrite it"],
            CatalogError::Configuration { .. } => &["Review the catalog configuration entry"],
            CatalogError::CredentialsNotFound { .. } => &[
                "Add the credentials entry or fix the name referenced by the dataset",
            ],
            CatalogError::DataSet { .. } => &["Check the dataset backend and the data it holds"],
            CatalogError::NotImplemented { .. } => &["Use a dataset that supports the operation"],
            CatalogError::ReadOnlyView { .. } => &["Register datasets through DataCatalog::add()"],
            CatalogError::Common(e) => return e.suggestions(),
        };
        hints.iter().map(|h| h.to_string()).collect()
    }

    fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Common(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_messages_name_the_dataset() {
        assert_eq!(
            CatalogError::not_found("cars").to_string(),
            "DataSet 'cars' not found in the catalog"
        );
        assert_eq!(
            CatalogError::already_exists("boats").to_string(),
            "DataSet 'boats' has already been registered"
        );
        assert!(
            CatalogError::CredentialsNotFound {
                name: "s3_creds".to_string()
            }
            .to_string()
            .contains("'s3_creds'")
        );
    }

    #[test]
    fn test_common_errors_pass_through() {
        let err: CatalogError = CommonError::storage_error("bucket gone").into();
        assert_eq!(err.to_string(), "Storage operation failed: bucket gone");
        assert!(!err.is_not_implemented());
    }

    #[test]
    fn test_diagnostics_defer_to_storage_errors() {
        let storage: CatalogError = CommonError::storage_error("timeout").into();
        assert!(storage.is_retryable());
        assert_eq!(storage.category(), ErrorCategory::Infrastructure);

        let missing = CatalogError::not_found("cars");
        assert!(!missing.is_retryable());
        assert_eq!(missing.category(), ErrorCategory::Resource);
        assert_eq!(missing.severity(), ErrorSeverity::Medium);
        assert!(!missing.suggestions().is_empty());
    }

    #[test]
    fn test_data_set_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        let err = CatalogError::data_set_with_source("Failed while loading data", io);
        assert!(err.source().is_some());
    }
}
