//! Persisted schema of a case store.
//!
//! A case is one JSON document with fixed tables: the tile table (which
//! also holds the randomization permutation), the annotation table, a
//! single point table with a category column, and the impacted set.
//!
//! # Versioning
//!
//! The store uses semantic versioning (MAJOR.MINOR.PATCH):
//!
//! - **Version 0.x.x**: unstable. Only files with the same minor version are
//!   considered compatible; other 0.x files are read with a warning.
//! - **Version 1.x.x** (future): breaking changes only on major bumps.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CaseError, Result};
use crate::grid::SlideGrid;
use crate::model::{CategoryId, CategorySet, Tag};
use crate::randomization::RandomizationMap;

/// Complete persisted state of one case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Format version for compatibility checking.
    pub version: String,

    /// Slide the case samples, resolved by the slide source.
    pub slide_path: PathBuf,

    /// Tile grid of the slide.
    pub grid: SlideGrid,

    /// Ordered categories; index 0 is the reference.
    pub categories: CategorySet,

    /// One row per presentation index.
    pub tiles: Vec<TileRow>,

    /// Annotation rows keyed by tag.
    #[serde(default)]
    pub annotations: BTreeMap<Tag, AnnotationRow>,

    /// Polygon vertices of every annotation, in drawing order per
    /// (tag, category).
    #[serde(default)]
    pub points: Vec<PointRow>,

    /// Tags flagged as impacted.
    #[serde(default)]
    pub impacted: BTreeSet<Tag>,

    #[serde(default)]
    pub metadata: StoreMetadata,
}

/// Tile table row; its position in [`CaseRecord::tiles`] is the
/// presentation index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRow {
    /// Real (row-major) index of the tile
    pub real: usize,
    #[serde(default)]
    pub completed: bool,
}

/// Annotation table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRow {
    /// Presentation index of the owning tile
    pub tile: usize,
    /// Cached polygon area per category, in category order
    pub areas: Vec<f64>,
}

/// Point table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRow {
    pub tag: Tag,
    pub category: CategoryId,
    pub x: f64,
    pub y: f64,
}

/// Store metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// Tool that created this file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    /// Creation timestamp (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    /// Last modified timestamp (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
}

impl StoreMetadata {
    /// Create new metadata with the current timestamp.
    pub fn new() -> Self {
        let now = Self::current_timestamp();
        Self {
            created_by: Some(format!("stereotile {}", env!("CARGO_PKG_VERSION"))),
            created_at: Some(now.clone()),
            modified_at: Some(now),
        }
    }

    /// Update the modified timestamp.
    pub fn touch(&mut self) {
        self.modified_at = Some(Self::current_timestamp());
    }

    fn current_timestamp() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

impl CaseRecord {
    /// Current version of the store format.
    pub const CURRENT_VERSION: &'static str = "0.1.0";

    /// Major version number for compatibility checking.
    pub const VERSION_MAJOR: u32 = 0;

    /// Minor version number.
    pub const VERSION_MINOR: u32 = 1;

    /// Build the record of a freshly initialized case.
    pub fn new(
        slide_path: PathBuf,
        grid: SlideGrid,
        categories: CategorySet,
        map: &RandomizationMap,
    ) -> Self {
        Self {
            version: Self::CURRENT_VERSION.to_string(),
            slide_path,
            grid,
            categories,
            tiles: map
                .iter()
                .map(|(_, real)| TileRow {
                    real,
                    completed: false,
                })
                .collect(),
            annotations: BTreeMap::new(),
            points: Vec::new(),
            impacted: BTreeSet::new(),
            metadata: StoreMetadata::new(),
        }
    }

    /// Parse a version string into (major, minor, patch) components.
    pub fn parse_version(version: &str) -> Option<(u32, u32, u32)> {
        let mut parts = version.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some((major, minor, patch))
    }

    /// Check if a version is compatible with the current version.
    ///
    /// For version 0.x.x (unstable), only exact minor version matches are compatible.
    /// For version 1.x.x+, any file with the same major version is compatible.
    pub fn is_version_compatible(file_version: &str) -> bool {
        let Some((file_major, file_minor, _)) = Self::parse_version(file_version) else {
            return false;
        };

        if Self::VERSION_MAJOR == 0 {
            file_major == 0 && file_minor == Self::VERSION_MINOR
        } else {
            file_major == Self::VERSION_MAJOR
        }
    }

    /// Check if a file can be read at all, possibly with a warning.
    pub fn is_version_readable(file_version: &str) -> bool {
        let Some((file_major, _, _)) = Self::parse_version(file_version) else {
            return false;
        };
        file_major == 0 || file_major == Self::VERSION_MAJOR
    }

    /// Parse a store document and check its version and invariants.
    pub fn from_json(json: &str) -> Result<Self> {
        let record: Self = serde_json::from_str(json)?;

        if !Self::is_version_readable(&record.version) {
            return Err(CaseError::VersionMismatch {
                expected: Self::CURRENT_VERSION.to_string(),
                found: record.version,
            });
        }
        if !Self::is_version_compatible(&record.version) {
            log::warn!(
                "Store version {} may not be fully compatible with current version {} \
                 (version 0.x.x is unstable - format may have changed)",
                record.version,
                Self::CURRENT_VERSION
            );
        }

        record.validate()?;
        Ok(record)
    }

    /// Randomization map stored in the tile table.
    pub fn randomization(&self) -> Result<RandomizationMap> {
        RandomizationMap::from_permutation(self.tiles.iter().map(|t| t.real).collect())
    }

    /// Check cross-table invariants.
    pub fn validate(&self) -> Result<()> {
        self.grid.check()?;
        if self.tiles.len() != self.grid.tile_count() {
            return Err(CaseError::corrupt(format!(
                "tile table has {} rows but the grid has {} tiles",
                self.tiles.len(),
                self.grid.tile_count()
            )));
        }
        self.randomization()?;

        let n_categories = self.categories.len();
        for (tag, row) in &self.annotations {
            if row.tile >= self.tiles.len() {
                return Err(CaseError::corrupt(format!(
                    "annotation {} references tile {}",
                    tag, row.tile
                )));
            }
            if row.areas.len() != n_categories {
                return Err(CaseError::corrupt(format!(
                    "annotation {} has {} areas for {} categories",
                    tag,
                    row.areas.len(),
                    n_categories
                )));
            }
        }
        if let Some(orphan) = self
            .points
            .iter()
            .find(|p| !self.annotations.contains_key(&p.tag) || !self.categories.contains(p.category))
        {
            return Err(CaseError::corrupt(format!(
                "point row for tag {} category {} has no owner",
                orphan.tag, orphan.category
            )));
        }
        if let Some(orphan) = self
            .impacted
            .iter()
            .find(|t| !self.annotations.contains_key(*t))
        {
            return Err(CaseError::corrupt(format!(
                "impacted tag {} has no annotation",
                orphan
            )));
        }
        Ok(())
    }

    /// Remove an annotation together with its point rows and impacted flag.
    ///
    /// Returns false when the tag does not exist.
    pub fn remove_annotation(&mut self, tag: &Tag) -> bool {
        let removed = self.annotations.remove(tag).is_some();
        self.points.retain(|p| &p.tag != tag);
        self.impacted.remove(tag);
        removed
    }

    /// Number of rows in any table that reference `tag`.
    pub fn rows_referencing(&self, tag: &Tag) -> usize {
        usize::from(self.annotations.contains_key(tag))
            + self.points.iter().filter(|p| &p.tag == tag).count()
            + usize::from(self.impacted.contains(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> CaseRecord {
        let grid = SlideGrid::new(2, 2, 100, 10);
        let map = RandomizationMap::with_seed(4, 11);
        CaseRecord::new(
            PathBuf::from("slide.svs"),
            grid,
            CategorySet::default(),
            &map,
        )
    }

    #[test]
    fn test_version_parsing() {
        assert_eq!(CaseRecord::parse_version("0.1.0"), Some((0, 1, 0)));
        assert_eq!(CaseRecord::parse_version("10.20.30"), Some((10, 20, 30)));
        assert_eq!(CaseRecord::parse_version("invalid"), None);
        assert_eq!(CaseRecord::parse_version("1.2"), None);
        assert_eq!(CaseRecord::parse_version("1.2.3.4"), None);
    }

    #[test]
    fn test_version_compatibility() {
        assert!(CaseRecord::is_version_compatible(CaseRecord::CURRENT_VERSION));
        assert!(CaseRecord::is_version_compatible("0.1.7"));
        assert!(!CaseRecord::is_version_compatible("0.2.0"));
        assert!(!CaseRecord::is_version_compatible("1.0.0"));
        assert!(CaseRecord::is_version_readable("0.2.0"));
        assert!(!CaseRecord::is_version_readable("1.0.0"));
    }

    #[test]
    fn test_json_roundtrip_preserves_permutation() {
        let original = record();
        let json = serde_json::to_string(&original).unwrap();
        let loaded = CaseRecord::from_json(&json).unwrap();
        assert_eq!(loaded.tiles, original.tiles);
        assert_eq!(
            loaded.randomization().unwrap(),
            RandomizationMap::with_seed(4, 11)
        );
    }

    #[test]
    fn test_rejects_unreadable_version() {
        let mut r = record();
        r.version = "3.0.0".to_string();
        let json = serde_json::to_string(&r).unwrap();
        assert!(matches!(
            CaseRecord::from_json(&json),
            Err(CaseError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_catches_orphans() {
        let mut r = record();
        r.impacted.insert(Tag::new("ghost"));
        assert!(matches!(r.validate(), Err(CaseError::CorruptStore { .. })));

        let mut r = record();
        r.points.push(PointRow {
            tag: Tag::new("ghost"),
            category: CategoryId(1),
            x: 0.0,
            y: 0.0,
        });
        assert!(r.validate().is_err());

        let mut r = record();
        r.tiles.pop();
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_remove_annotation_cascades() {
        let mut r = record();
        let tag = Tag::new("a");
        r.annotations.insert(
            tag.clone(),
            AnnotationRow {
                tile: 1,
                areas: vec![1.0, 2.0, 0.0, 0.0],
            },
        );
        for category in [CategoryId(0), CategoryId(1)] {
            r.points.push(PointRow {
                tag: tag.clone(),
                category,
                x: 1.0,
                y: 2.0,
            });
        }
        r.impacted.insert(tag.clone());
        assert_eq!(r.rows_referencing(&tag), 4);

        assert!(r.remove_annotation(&tag));
        assert_eq!(r.rows_referencing(&tag), 0);
        assert!(!r.remove_annotation(&tag));
        assert!(r.validate().is_ok());
    }
}
