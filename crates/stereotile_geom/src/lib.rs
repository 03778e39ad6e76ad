//! Polygon geometry used by stereotile.
//!
//! Pure functions over finished polygons: the enclosed area (shoelace
//! formula) and the longest-axis approximation used to sanity check
//! reference regions. Nothing here holds state.

pub mod error;
pub mod point;
pub mod polygon;

pub use error::{GeometryError, Result};
pub use point::{Bounds, Point};
pub use polygon::{
    check_finite, longest_axis, polygon_area, AreaMode, LongestAxis, MIN_AXIS_POINTS,
    MIN_POLYGON_POINTS,
};
