//! Read-only queries over a case store.

use std::collections::BTreeMap;

use stereotile_geom::Point;

use crate::error::{CaseError, Result};
use crate::model::{Annotation, CategoryId, CategoryShape, Tag};
use crate::store::{AnnotationRow, CaseRecord, CaseStore};

/// Annotation counts per category plus the impacted count.
///
/// An annotation counts towards a category when its area there is
/// non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CategoryCounts {
    /// One entry per category, in category order
    pub per_category: Vec<usize>,
    pub impacted: usize,
}

impl CategoryCounts {
    fn zeroed(categories: usize) -> Self {
        Self {
            per_category: vec![0; categories],
            impacted: 0,
        }
    }

    fn add(&mut self, row: &AnnotationRow, impacted: bool) {
        for (count, area) in self.per_category.iter_mut().zip(&row.areas) {
            if *area != 0.0 {
                *count += 1;
            }
        }
        if impacted {
            self.impacted += 1;
        }
    }

    pub fn get(&self, category: CategoryId) -> usize {
        self.per_category.get(category.index()).copied().unwrap_or(0)
    }
}

/// Summary of one presentation tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileStatus {
    pub presentation: usize,
    pub real: usize,
    pub completed: bool,
    pub annotations: usize,
}

impl CaseStore {
    /// Look up one annotation by tag.
    pub fn annotation(&self, tag: &Tag) -> Option<Annotation> {
        let record = self.record();
        let row = record.annotations.get(tag)?;
        let mut points: BTreeMap<CategoryId, Vec<Point>> = BTreeMap::new();
        for p in record.points.iter().filter(|p| &p.tag == tag) {
            points.entry(p.category).or_default().push(Point::new(p.x, p.y));
        }
        Some(build_annotation(record, tag, row, points))
    }

    /// Annotations drawn on a presentation tile, ordered by tag.
    pub fn annotations_for_tile(&self, tile: usize) -> Result<Vec<Annotation>> {
        if tile >= self.tile_count() {
            return Err(CaseError::OutOfRange {
                index: tile,
                len: self.tile_count(),
            });
        }
        Ok(self.collect_annotations(|row| row.tile == tile))
    }

    /// Every annotation of the case, ordered by tag.
    pub fn annotations(&self) -> Vec<Annotation> {
        self.collect_annotations(|_| true)
    }

    fn collect_annotations(&self, keep: impl Fn(&AnnotationRow) -> bool) -> Vec<Annotation> {
        let record = self.record();
        let mut grouped: BTreeMap<&Tag, BTreeMap<CategoryId, Vec<Point>>> = BTreeMap::new();
        for p in &record.points {
            match record.annotations.get(&p.tag) {
                Some(row) if keep(row) => grouped
                    .entry(&p.tag)
                    .or_default()
                    .entry(p.category)
                    .or_default()
                    .push(Point::new(p.x, p.y)),
                _ => {}
            }
        }

        record
            .annotations
            .iter()
            .filter(|(_, row)| keep(*row))
            .map(|(tag, row)| {
                let points = grouped.remove(tag).unwrap_or_default();
                build_annotation(record, tag, row, points)
            })
            .collect()
    }

    pub fn total_annotations(&self) -> usize {
        self.record().annotations.len()
    }

    pub fn is_impacted(&self, tag: &Tag) -> bool {
        self.record().impacted.contains(tag)
    }

    /// Impacted tags in tag order.
    pub fn impacted_tags(&self) -> Vec<Tag> {
        self.record().impacted.iter().cloned().collect()
    }

    pub fn is_completed(&self, tile: usize) -> Result<bool> {
        self.record()
            .tiles
            .get(tile)
            .map(|t| t.completed)
            .ok_or(CaseError::OutOfRange {
                index: tile,
                len: self.tile_count(),
            })
    }

    pub fn completed_count(&self) -> usize {
        self.record().tiles.iter().filter(|t| t.completed).count()
    }

    /// Lowest presentation index whose review is not finished.
    pub fn first_incomplete(&self) -> Result<usize> {
        self.record()
            .tiles
            .iter()
            .position(|t| !t.completed)
            .ok_or(CaseError::AllCompleted)
    }

    pub fn tile_status(&self, tile: usize) -> Result<TileStatus> {
        let row = self.record().tiles.get(tile).ok_or(CaseError::OutOfRange {
            index: tile,
            len: self.tile_count(),
        })?;
        Ok(TileStatus {
            presentation: tile,
            real: row.real,
            completed: row.completed,
            annotations: self
                .record()
                .annotations
                .values()
                .filter(|a| a.tile == tile)
                .count(),
        })
    }

    /// Case-wide annotation counts.
    pub fn category_counts(&self) -> CategoryCounts {
        let record = self.record();
        let mut counts = CategoryCounts::zeroed(record.categories.len());
        for (tag, row) in &record.annotations {
            counts.add(row, record.impacted.contains(tag));
        }
        counts
    }

    /// Annotation counts per presentation tile, one entry per tile.
    pub fn tile_counts(&self) -> Vec<CategoryCounts> {
        let record = self.record();
        let mut counts = vec![CategoryCounts::zeroed(record.categories.len()); record.tiles.len()];
        for (tag, row) in &record.annotations {
            counts[row.tile].add(row, record.impacted.contains(tag));
        }
        counts
    }

    /// Summed area per category for every presentation tile, together with
    /// the number of annotations on the tile.
    pub fn tile_areas(&self) -> Vec<(Vec<f64>, usize)> {
        let record = self.record();
        let mut sums = vec![(vec![0.0; record.categories.len()], 0); record.tiles.len()];
        for row in record.annotations.values() {
            let (areas, count) = &mut sums[row.tile];
            for (sum, area) in areas.iter_mut().zip(&row.areas) {
                *sum += area;
            }
            *count += 1;
        }
        sums
    }
}

fn build_annotation(
    record: &CaseRecord,
    tag: &Tag,
    row: &AnnotationRow,
    mut points: BTreeMap<CategoryId, Vec<Point>>,
) -> Annotation {
    let shapes = record
        .categories
        .ids()
        .map(|category| CategoryShape {
            category,
            points: points.remove(&category).unwrap_or_default(),
            area: row.areas.get(category.index()).copied().unwrap_or(0.0),
        })
        .collect();

    Annotation {
        tag: tag.clone(),
        tile: row.tile,
        shapes,
        impacted: record.impacted.contains(tag),
    }
}
