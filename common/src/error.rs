//! Error handling for the depot-common crate.

use thiserror::Error;

/// Error type shared by the storage and compression layers.
///
/// Every variant carries a human readable message and, where one exists, the
/// underlying library error so callers can walk the chain.
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Storage operation failed: {message}")]
    StorageError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Object not found: {message}")]
    NotFoundError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Object already exists: {message}")]
    AlreadyExistsError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Invalid configuration: {message}")]
    ConfigurationError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Compression failed: {message}")]
    CompressionError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Decompression failed: {message}")]
    DecompressionError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Permission denied: {message}")]
    PermissionError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

/// Result type alias for common operations.
pub type Result<T> = std::result::Result<T, CommonError>;

/// Error severity levels for categorizing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Operation can continue with degraded functionality
    Low,
    /// Operation should be retried or an alternative used
    Medium,
    /// Operation must be aborted but the process can continue
    High,
    /// Process integrity is at risk
    Critical,
}

/// Error category for grouping related error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Backend and transport errors
    Infrastructure,
    /// Payload encoding errors
    DataProcessing,
    /// Configuration and setup errors
    Configuration,
    /// Missing or conflicting objects
    Resource,
    /// Credentials and access errors
    Security,
    /// Internal logic errors
    Internal,
}

/// Diagnostics attached to an error: how bad it is and what to try next.
pub trait Diagnose {
    /// Get the error severity level.
    fn severity(&self) -> ErrorSeverity;

    /// Get the error category.
    fn category(&self) -> ErrorCategory;

    /// Get suggestions for resolving the error.
    fn suggestions(&self) -> Vec<String>;

    /// Check if the error is retryable.
    fn is_retryable(&self) -> bool;
}

macro_rules! constructors {
    ($($variant:ident => $plain:ident, $with_source:ident;)*) => {
        impl CommonError {
            $(
                #[doc = concat!("Create a `", stringify!($variant), "` with a custom message.")]
                pub fn $plain<S: Into<String>>(message: S) -> Self {
                    Self::$variant {
                        message: message.into(),
                        source: None,
                    }
                }

                #[doc = concat!("Create a `", stringify!($variant), "` with a custom message and source error.")]
                pub fn $with_source<S: Into<String>, E: Into<anyhow::Error>>(
                    message: S,
                    source: E,
                ) -> Self {
                    Self::$variant {
                        message: message.into(),
                        source: Some(source.into()),
                    }
                }
            )*
        }
    };
}

constructors! {
    StorageError => storage_error, storage_error_with_source;
    NotFoundError => not_found_error, not_found_error_with_source;
    AlreadyExistsError => already_exists_error, already_exists_error_with_source;
    ConfigurationError => configuration_error, configuration_error_with_source;
    CompressionError => compression_error, compression_error_with_source;
    DecompressionError => decompression_error, decompression_error_with_source;
    PermissionError => permission_error, permission_error_with_source;
}

impl CommonError {
    /// Whether this error reports a missing object.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CommonError::NotFoundError { .. })
    }
}

impl From<object_store::Error> for CommonError {
    fn from(error: object_store::Error) -> Self {
        match error {
            object_store::Error::NotFound { ref path, .. } => {
                let message = path.clone();
                CommonError::not_found_error_with_source(message, error)
            }
            object_store::Error::AlreadyExists { ref path, .. } => {
                let message = path.clone();
                CommonError::already_exists_error_with_source(message, error)
            }
            object_store::Error::PermissionDenied { ref path, .. }
            | object_store::Error::Unauthenticated { ref path, .. } => {
                let message = path.clone();
                CommonError::permission_error_with_source(message, error)
            }
            object_store::Error::UnknownConfigurationKey { .. } => {
                CommonError::configuration_error_with_source("Invalid object store settings", error)
            }
            other => CommonError::storage_error_with_source("Object store operation failed", other),
        }
    }
}

impl Diagnose for CommonError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            CommonError::StorageError { .. } => ErrorSeverity::High,
            CommonError::NotFoundError { .. } => ErrorSeverity::Low,
            CommonError::AlreadyExistsError { .. } => ErrorSeverity::Medium,
            CommonError::ConfigurationError { .. } => ErrorSeverity::High,
            CommonError::CompressionError { .. } => ErrorSeverity::Low,
            CommonError::DecompressionError { .. } => ErrorSeverity::Medium,
            CommonError::PermissionError { .. } => ErrorSeverity::High,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            CommonError::StorageError { .. } => ErrorCategory::Infrastructure,
            CommonError::NotFoundError { .. } | CommonError::AlreadyExistsError { .. } => {
                ErrorCategory::Resource
            }
            CommonError::ConfigurationError { .. } => ErrorCategory::Configuration,
            CommonError::CompressionError { .. } | CommonError::DecompressionError { .. } => {
                ErrorCategory::DataProcessing
            }
            CommonError::PermissionError { .. } => ErrorCategory::Security,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        let hints: &[&str] = match self {
            CommonError::StorageError { .. } => &[
                "Check that the storage backend is reachable",
                "Verify bucket, container or root path settings",
            ],
            CommonError::NotFoundError { .. } => &[
                "Verify the object path",
                "Check whether a versioned dataset was ever saved",
            ],
            CommonError::AlreadyExistsError { .. } => &[
                "Use a fresh save version for versioned datasets",
            ],
            CommonError::ConfigurationError { .. } => &[
                "Review the catalog configuration values",
                "Check for missing required parameters",
            ],
            CommonError::CompressionError { .. } => &["Check compression algorithm parameters"],
            CommonError::DecompressionError { .. } => &[
                "Verify the object was written with the same compression setting",
            ],
            CommonError::PermissionError { .. } => &[
                "Check the credentials referenced by the dataset",
            ],
        };
        hints.iter().map(|h| h.to_string()).collect()
    }

    fn is_retryable(&self) -> bool {
        matches!(self, CommonError::StorageError { .. })
    }
}

/// Context helpers for adding rich context to errors.
pub mod context {
    use super::*;

    /// Extension trait for adding context to Results.
    pub trait ErrorContext<T> {
        /// Wrap the error as a configuration error.
        fn with_config_context<F>(self, f: F) -> Result<T>
        where
            F: FnOnce() -> String;
    }

    impl<T, E> ErrorContext<T> for std::result::Result<T, E>
    where
        E: Into<anyhow::Error>,
    {
        fn with_config_context<F>(self, f: F) -> Result<T>
        where
            F: FnOnce() -> String,
        {
            self.map_err(|e| CommonError::configuration_error_with_source(f(), e.into()))
        }
    }
}

pub use context::ErrorContext;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::error::Error;

    #[test]
    fn test_error_creation() {
        let storage_error =
            CommonError::storage_error_with_source("Put failed", anyhow!("disk full"));
        assert!(matches!(storage_error, CommonError::StorageError { .. }));
        assert!(storage_error.source().is_some());

        let not_found = CommonError::not_found_error("data/cars.json");
        assert!(not_found.is_not_found());
        assert!(not_found.source().is_none());
    }

    #[test]
    fn test_diagnose_trait() {
        let config_error = CommonError::configuration_error("bad region");
        assert_eq!(config_error.severity(), ErrorSeverity::High);
        assert_eq!(config_error.category(), ErrorCategory::Configuration);
        assert!(!config_error.is_retryable());
        assert!(!config_error.suggestions().is_empty());

        let storage_error = CommonError::storage_error("timeout");
        assert!(storage_error.is_retryable());
        assert_eq!(storage_error.category(), ErrorCategory::Infrastructure);
    }

    #[test]
    fn test_object_store_not_found_conversion() {
        let error = object_store::Error::NotFound {
            path: "a/b.json".to_string(),
            source: Box::new(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
        };
        let converted = CommonError::from(error);
        assert!(converted.is_not_found());
        assert!(converted.to_string().contains("a/b.json"));
    }

    #[test]
    fn test_error_context_extension() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));

        let wrapped = result.with_config_context(|| "Failed to open root path".to_string());
        match wrapped {
            Err(CommonError::ConfigurationError { message, source }) => {
                assert_eq!(message, "Failed to open root path");
                assert!(source.is_some());
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
