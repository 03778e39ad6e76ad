//! Error types for geometry computations.

use thiserror::Error;

/// Errors that can occur while measuring a polygon.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// Too few vertices for the requested measure
    #[error("Polygon needs at least {needed} points, got {found}")]
    InsufficientPoints {
        /// Minimum vertex count
        needed: usize,
        /// Vertex count supplied
        found: usize,
    },

    /// First and last point coincide, so there is no chord to measure from
    #[error("Chord between first and last point has zero length")]
    DegenerateChord,

    /// A vertex has a NaN or infinite coordinate
    #[error("Point {index} has a non-finite coordinate")]
    NonFinitePoint {
        /// Position of the vertex in the polygon
        index: usize,
    },
}

pub type Result<T> = std::result::Result<T, GeometryError>;
