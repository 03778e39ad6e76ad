//! Annotation data model.

use std::collections::BTreeMap;

use stereotile_geom::{longest_axis, LongestAxis, Point};

use crate::model::{CategoryId, Tag};

/// Finished polygons for one annotation pass, keyed by category.
///
/// Categories that were not drawn may be absent or map to an empty list.
pub type CategoryPoints = BTreeMap<CategoryId, Vec<Point>>;

/// The polygon drawn for one category of an annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryShape {
    pub category: CategoryId,
    /// Vertices in tile-relative display pixels
    pub points: Vec<Point>,
    /// Cached polygon area, 0 when the category was not drawn
    pub area: f64,
}

impl CategoryShape {
    pub fn is_drawn(&self) -> bool {
        !self.points.is_empty()
    }
}

/// A persisted annotation as seen by callers.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub tag: Tag,
    /// Presentation index of the tile the annotation was drawn on
    pub tile: usize,
    /// One entry per category of the case, in category order
    pub shapes: Vec<CategoryShape>,
    /// Whether the annotation is flagged as impacted
    pub impacted: bool,
}

impl Annotation {
    pub fn shape(&self, category: CategoryId) -> Option<&CategoryShape> {
        self.shapes.get(category.index())
    }

    pub fn area(&self, category: CategoryId) -> f64 {
        self.shape(category).map_or(0.0, |s| s.area)
    }

    /// Categories that have a polygon in this annotation.
    pub fn drawn_categories(&self) -> impl Iterator<Item = CategoryId> + '_ {
        self.shapes.iter().filter(|s| s.is_drawn()).map(|s| s.category)
    }

    /// Long axis of the reference polygon, if it has enough points.
    ///
    /// Used to spot reference regions that are implausibly shallow.
    pub fn reference_axis(&self) -> Option<LongestAxis> {
        let shape = self.shape(CategoryId::REFERENCE)?;
        longest_axis(&shape.points).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation() -> Annotation {
        Annotation {
            tag: Tag::new("t1"),
            tile: 3,
            shapes: vec![
                CategoryShape {
                    category: CategoryId(0),
                    points: vec![
                        Point::new(0.0, 0.0),
                        Point::new(3.0, 5.0),
                        Point::new(6.0, 4.0),
                        Point::new(9.0, 0.0),
                    ],
                    area: 42.0,
                },
                CategoryShape {
                    category: CategoryId(1),
                    points: Vec::new(),
                    area: 0.0,
                },
            ],
            impacted: false,
        }
    }

    #[test]
    fn test_area_lookup() {
        let ann = annotation();
        assert_eq!(ann.area(CategoryId(0)), 42.0);
        assert_eq!(ann.area(CategoryId(1)), 0.0);
        assert_eq!(ann.area(CategoryId(7)), 0.0);
    }

    #[test]
    fn test_drawn_categories() {
        let ann = annotation();
        let drawn: Vec<_> = ann.drawn_categories().collect();
        assert_eq!(drawn, vec![CategoryId(0)]);
    }

    #[test]
    fn test_reference_axis() {
        let axis = annotation().reference_axis().unwrap();
        assert_eq!(axis.apex, Point::new(3.0, 5.0));
        assert!((axis.distance - 5.0).abs() < 1e-12);
    }
}
