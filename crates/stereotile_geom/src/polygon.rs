//! Polygon area and longest-axis computations.

use std::borrow::Cow;

use crate::error::{GeometryError, Result};
use crate::point::Point;

/// Minimum number of points for a polygon with an area.
pub const MIN_POLYGON_POINTS: usize = 3;

/// Minimum number of points for the longest-axis computation: both chord
/// endpoints plus at least two interior points.
pub const MIN_AXIS_POINTS: usize = 4;

/// How the point sequence is closed before the shoelace sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AreaMode {
    /// Duplicate the first point when the point count is odd, then sum over
    /// the cyclic sequence. Areas stored by existing cases were computed
    /// this way.
    #[default]
    Legacy,
    /// Treat the sequence as a closed polygon as-is.
    Closed,
}

/// Fail on the first vertex with a NaN or infinite coordinate.
pub fn check_finite(points: &[Point]) -> Result<()> {
    match points.iter().position(|p| !p.is_finite()) {
        Some(index) => Err(GeometryError::NonFinitePoint { index }),
        None => Ok(()),
    }
}

/// Area enclosed by `points` using the shoelace formula.
///
/// The polygon does not need to be explicitly closed. The result is
/// non-negative regardless of winding order.
pub fn polygon_area(points: &[Point], mode: AreaMode) -> Result<f64> {
    if points.len() < MIN_POLYGON_POINTS {
        return Err(GeometryError::InsufficientPoints {
            needed: MIN_POLYGON_POINTS,
            found: points.len(),
        });
    }
    check_finite(points)?;

    // The duplicated vertex is a zero-length edge, so both modes agree up to
    // floating point rounding.
    let ring: Cow<'_, [Point]> = match mode {
        AreaMode::Legacy if points.len() % 2 != 0 => {
            let mut padded = points.to_vec();
            padded.push(points[0]);
            Cow::Owned(padded)
        }
        _ => Cow::Borrowed(points),
    };

    let n = ring.len();
    let twice_area: f64 = (0..n)
        .map(|i| {
            let next = &ring[(i + 1) % n];
            let prev = &ring[(i + n - 1) % n];
            ring[i].x * (next.y - prev.y)
        })
        .sum();

    Ok((twice_area / 2.0).abs())
}

/// Result of [`longest_axis`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LongestAxis {
    /// Interior point farthest from the chord.
    pub apex: Point,
    /// Perpendicular foot of `apex` on the chord line.
    pub foot: Point,
    /// Signed distance from the chord to `apex`.
    pub distance: f64,
}

/// Approximate the long axis of a polygon traced from `points[0]` to
/// `points[last]`.
///
/// Every interior point is measured against the chord joining the first and
/// last point using the cross product normalized by the chord length. The
/// distance is signed: points to the right of the chord (for a y-down image
/// frame) are negative and never win over a point on the left.
pub fn longest_axis(points: &[Point]) -> Result<LongestAxis> {
    if points.len() < MIN_AXIS_POINTS {
        return Err(GeometryError::InsufficientPoints {
            needed: MIN_AXIS_POINTS,
            found: points.len(),
        });
    }
    check_finite(points)?;

    let first = points[0];
    let last = points[points.len() - 1];
    let chord = last.sub(&first);
    let chord_len = chord.norm();
    if chord_len == 0.0 {
        return Err(GeometryError::DegenerateChord);
    }

    let interior = &points[1..points.len() - 1];
    let mut apex = interior[0];
    let mut distance = chord.cross(&apex.sub(&first)) / chord_len;
    for p in &interior[1..] {
        let d = chord.cross(&p.sub(&first)) / chord_len;
        // Ties keep the earliest point
        if d > distance {
            distance = d;
            apex = *p;
        }
    }

    let unit = Point::new(chord.x / chord_len, chord.y / chord_len);
    let lambda = unit.dot(&apex.sub(&first));
    let foot = Point::new(first.x + unit.x * lambda, first.y + unit.y * lambda);

    Ok(LongestAxis {
        apex,
        foot,
        distance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[(f64, f64)]) -> Vec<Point> {
        raw.iter().copied().map(Point::from).collect()
    }

    #[test]
    fn test_non_finite_points_rejected() {
        let poly = pts(&[(0.0, 0.0), (f64::NAN, 0.0), (0.0, 5.0)]);
        assert_eq!(
            polygon_area(&poly, AreaMode::Legacy),
            Err(GeometryError::NonFinitePoint { index: 1 })
        );
        let axis = pts(&[(0.0, 0.0), (1.0, 2.0), (2.0, f64::INFINITY), (4.0, 0.0)]);
        assert_eq!(
            longest_axis(&axis),
            Err(GeometryError::NonFinitePoint { index: 2 })
        );
    }

    #[test]
    fn test_square_area() {
        let square = pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        assert_eq!(polygon_area(&square, AreaMode::Legacy).unwrap(), 100.0);
        assert_eq!(polygon_area(&square, AreaMode::Closed).unwrap(), 100.0);
    }

    #[test]
    fn test_triangle_area_odd_count() {
        let triangle = pts(&[(0.0, 0.0), (4.0, 0.0), (0.0, 3.0)]);
        assert_eq!(polygon_area(&triangle, AreaMode::Legacy).unwrap(), 6.0);
        assert_eq!(polygon_area(&triangle, AreaMode::Closed).unwrap(), 6.0);
    }

    #[test]
    fn test_area_winding_independent() {
        let cw = pts(&[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)]);
        assert_eq!(polygon_area(&cw, AreaMode::Legacy).unwrap(), 100.0);
    }

    #[test]
    fn test_area_explicitly_closed_input() {
        // First point repeated at the end: five points, legacy pads to six
        let closed = pts(&[
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (0.0, 10.0),
            (0.0, 0.0),
        ]);
        assert_eq!(polygon_area(&closed, AreaMode::Legacy).unwrap(), 100.0);
        assert_eq!(polygon_area(&closed, AreaMode::Closed).unwrap(), 100.0);
    }

    #[test]
    fn test_area_modes_agree_on_pentagon() {
        let pentagon = pts(&[
            (100.0, 100.0),
            (200.0, 100.0),
            (200.0, 200.0),
            (150.0, 250.0),
            (100.0, 200.0),
        ]);
        let legacy = polygon_area(&pentagon, AreaMode::Legacy).unwrap();
        let closed = polygon_area(&pentagon, AreaMode::Closed).unwrap();
        assert!((legacy - 12500.0).abs() < 1e-9);
        assert!((legacy - closed).abs() < 1e-9);
    }

    #[test]
    fn test_area_insufficient_points() {
        let line = pts(&[(0.0, 0.0), (1.0, 1.0)]);
        assert_eq!(
            polygon_area(&line, AreaMode::Legacy),
            Err(GeometryError::InsufficientPoints {
                needed: 3,
                found: 2
            })
        );
    }

    #[test]
    fn test_longest_axis_picks_farthest_point() {
        // Chord along the x axis from (0,0) to (10,0)
        let arc = pts(&[(0.0, 0.0), (2.0, 3.0), (5.0, 7.0), (8.0, 2.0), (10.0, 0.0)]);
        let axis = longest_axis(&arc).unwrap();
        assert_eq!(axis.apex, Point::new(5.0, 7.0));
        assert_eq!(axis.foot, Point::new(5.0, 0.0));
        assert!((axis.distance - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_longest_axis_diagonal_chord() {
        let arc = pts(&[(0.0, 0.0), (0.0, 4.0), (1.0, 1.0), (4.0, 4.0)]);
        let axis = longest_axis(&arc).unwrap();
        assert_eq!(axis.apex, Point::new(0.0, 4.0));
        assert!((axis.foot.x - 2.0).abs() < 1e-12);
        assert!((axis.foot.y - 2.0).abs() < 1e-12);
        assert!((axis.distance - 8.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_longest_axis_needs_two_interior_points() {
        let tri = pts(&[(0.0, 0.0), (1.0, 1.0), (2.0, 0.0)]);
        assert_eq!(
            longest_axis(&tri),
            Err(GeometryError::InsufficientPoints {
                needed: 4,
                found: 3
            })
        );
    }

    #[test]
    fn test_longest_axis_degenerate_chord() {
        let ring = pts(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]);
        assert_eq!(longest_axis(&ring), Err(GeometryError::DegenerateChord));
    }
}
