//! Error types for adaptive infill generation.

use thiserror::Error;

/// Errors that can occur while generating adaptive infill.
#[derive(Error, Debug)]
pub enum InfillError {
    /// Mesh has no triangles.
    #[error("mesh is empty")]
    EmptyMesh,

    /// Invalid infill settings.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Slicing the mesh into layers failed.
    #[error("slicing failed: {0}")]
    SliceFailed(String),

    /// Settings could not be parsed.
    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result type for infill operations.
pub type Result<T> = std::result::Result<T, InfillError>;
