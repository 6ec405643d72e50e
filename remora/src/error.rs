//! Error-handling module for the crate

use thiserror::Error;

use crate::{
    execution::config::ConfigError,
    inspector::{memory::LoadError, InspectorError},
};

/// Error-collection for all the possible errors occurring in this crate
#[allow(variant_size_differences)]
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid discovery parameters, rejected before any work starts
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A table or column referenced during initialization does not exist,
    /// or the backend failed while the schema was being interned
    #[error(transparent)]
    Inspector(#[from] InspectorError),
    /// Error while loading a database from disk
    #[error(transparent)]
    Load(#[from] LoadError),
    /// Error during a write of a side file
    #[error("failed to write \"{filename}\": {error}")]
    IoWriting {
        /// Underlying IO error
        error: std::io::Error,
        /// Name of the file that could not be written
        filename: String,
    },
    /// JSON serialization error
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    /// IO error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
