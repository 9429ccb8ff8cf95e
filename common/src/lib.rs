//! Common utilities and abstractions for the Depot project.
//!
//! This crate provides the object storage and compression layers that
//! dataset implementations build on.

pub mod compression;
pub mod error;
pub mod storage;

pub use compression::{CompressionAlgorithm, CompressionBuilder, Compressor};
pub use error::{CommonError, Diagnose, ErrorCategory, ErrorSeverity, Result};
pub use storage::{Storage, StorageBackend, StorageBuilder};
