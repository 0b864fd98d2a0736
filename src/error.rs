//! Error taxonomy of a reconstruction run.
//!
//! Only configuration, I/O and contract violations escalate to the caller.
//! Numerical degeneracies (e.g. a sinogram fit which cannot be performed) are
//! absorbed where they occur: see `fit::FitError`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for reconstruction operations
pub type Result<T> = std::result::Result<T, ReconstructionError>;

#[derive(Error, Debug)]
pub enum ReconstructionError {
    /// Missing or inconsistent set-up, detected before any processing
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A file could not be opened, read or written
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed content in an image or projection data file
    #[error("Cannot decode {path:?}: {reason}")]
    Format { path: PathBuf, reason: String },

    /// Writing to the full log failed mid-run
    #[error("Could not write to the reconstruction log: {0}")]
    Log(#[from] std::io::Error),

    /// Programming-contract violation, e.g. an odd number of viewgrams
    /// handed to the pairwise Colsher filter
    #[error("Structural invariant violated: {0}")]
    StructuralInvariant(String),
}

impl ReconstructionError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
