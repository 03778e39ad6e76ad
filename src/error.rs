//! Error types for case operations.

use std::path::PathBuf;

use stereotile_geom::GeometryError;
use thiserror::Error;

use crate::model::Tag;

/// Errors that can occur while operating on a case.
#[derive(Error, Debug)]
pub enum CaseError {
    /// Tile index outside the case's grid
    #[error("Tile index {index} out of range (case has {len} tiles)")]
    OutOfRange {
        /// The offending index
        index: usize,
        /// Number of tiles in the case
        len: usize,
    },

    /// A store already exists for this case directory
    #[error("Case at {path:?} is already initialized")]
    AlreadyInitialized {
        /// Path of the existing store file
        path: PathBuf,
    },

    /// No store exists for this case directory
    #[error("No case store found at {path:?}")]
    NotInitialized {
        /// Path where the store was expected
        path: PathBuf,
    },

    /// Category key not defined for this case
    #[error("Invalid category: {category}")]
    InvalidCategory {
        /// The unknown category as supplied by the caller
        category: String,
    },

    /// Annotation has no points in any category
    #[error("Annotation has no points in any category")]
    EmptyAnnotation,

    /// Caller-supplied tag collides with an existing annotation
    #[error("Tag already exists: {0}")]
    DuplicateTag(Tag),

    /// Tag does not name an existing annotation
    #[error("Unknown tag: {0}")]
    UnknownTag(Tag),

    /// Every tile in the case is marked completed
    #[error("All tiles are completed")]
    AllCompleted,

    /// Polygon geometry could not be computed
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// Store contents violate an invariant
    #[error("Corrupt store: {message}")]
    CorruptStore {
        /// Description of the violation
        message: String,
    },

    /// Store file version not readable by this build
    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Version written by this build
        expected: String,
        /// Version found in the file
        found: String,
    },

    /// I/O error during store or export operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raster error from the slide source or tile composition
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl CaseError {
    /// Create a corrupt store error with a message.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptStore {
            message: message.into(),
        }
    }

    /// Create an invalid category error.
    pub fn invalid_category(category: impl ToString) -> Self {
        Self::InvalidCategory {
            category: category.to_string(),
        }
    }

    /// Whether the error is a caller mistake that left state unchanged.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::OutOfRange { .. }
                | Self::InvalidCategory { .. }
                | Self::EmptyAnnotation
                | Self::DuplicateTag(_)
                | Self::UnknownTag(_)
                | Self::Geometry(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CaseError>;
