//! Case store: durable state of one sampling case.
//!
//! Each case directory holds a single store file. Every mutating operation
//! is one transaction: the change is applied to a copy of the record, the
//! copy is written to a temporary file, synced and atomically renamed over
//! the store file, and only then becomes the in-memory state. A failed
//! write leaves both the file and the store untouched.

mod queries;
mod record;


use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use stereotile_geom::{polygon_area, AreaMode, Point};

use crate::constants::STORE_FILE_NAME;
use crate::error::{CaseError, Result};
use crate::grid::{PixelRect, SlideGrid};
use crate::model::{Annotation, CategoryPoints, CategorySet, Tag};
use crate::randomization::RandomizationMap;

pub use queries::{CategoryCounts, TileStatus};
pub use record::{AnnotationRow, CaseRecord, PointRow, StoreMetadata, TileRow};

/// Parameters for creating a new case.
#[derive(Debug, Clone)]
pub struct CaseInit {
    /// Slide the case samples
    pub slide_path: PathBuf,
    /// Tile grid of the slide
    pub grid: SlideGrid,
    /// Ordered categories, reference first
    pub categories: CategorySet,
    /// Seed for the presentation order; random when `None`
    pub seed: Option<u64>,
}

/// Persistent store of one case directory.
#[derive(Debug)]
pub struct CaseStore {
    dir: PathBuf,
    path: PathBuf,
    record: CaseRecord,
    map: RandomizationMap,
}

impl CaseStore {
    /// Path of the store file inside a case directory.
    pub fn store_path(dir: &Path) -> PathBuf {
        dir.join(STORE_FILE_NAME)
    }

    /// Whether a case has been initialized in `dir`.
    pub fn exists(dir: &Path) -> bool {
        Self::store_path(dir).is_file()
    }

    /// Initialize a new case in `dir`, drawing its presentation order.
    ///
    /// Fails with [`CaseError::AlreadyInitialized`] if the directory already
    /// holds a case; the existing store is not touched. Concurrent
    /// initializations of the same directory race on an exclusive file
    /// creation and exactly one of them succeeds.
    pub fn initialize(dir: &Path, init: CaseInit) -> Result<Self> {
        let path = Self::store_path(dir);
        if path.exists() {
            return Err(CaseError::AlreadyInitialized { path });
        }
        if init.categories.len() < 2 {
            return Err(CaseError::invalid_category(
                "a case needs a reference category and at least one measured category",
            ));
        }
        if let Some((_, cat)) = init
            .categories
            .iter()
            .find(|(_, c)| c.name.contains(['/', '\\']) || c.name == "." || c.name == "..")
        {
            return Err(CaseError::invalid_category(format!(
                "category '{}' cannot be used in a file name",
                cat.name
            )));
        }
        init.grid.check()?;
        let tile_count = init.grid.tile_count();
        if tile_count == 0 {
            return Err(CaseError::OutOfRange { index: 0, len: 0 });
        }

        let map = match init.seed {
            Some(seed) => RandomizationMap::with_seed(tile_count, seed),
            None => RandomizationMap::random(tile_count),
        };
        let record = CaseRecord::new(init.slide_path, init.grid, init.categories, &map);

        fs::create_dir_all(dir)?;
        let bytes = serde_json::to_vec_pretty(&record)?;
        create_exclusive(&path, &bytes)?;

        log::info!(
            "Initialized case at {:?}: {}x{} tiles, {} categories",
            dir,
            record.grid.tiles_x,
            record.grid.tiles_y,
            record.categories.len()
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            path,
            record,
            map,
        })
    }

    /// Open an existing case.
    pub fn open(dir: &Path) -> Result<Self> {
        let path = Self::store_path(dir);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CaseError::NotInitialized { path });
            }
            Err(e) => return Err(e.into()),
        };
        let record = CaseRecord::from_json(&json)?;
        let map = record.randomization()?;

        log::info!(
            "Opened case at {:?}: {} tiles, {} annotations",
            dir,
            record.tiles.len(),
            record.annotations.len()
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            path,
            record,
            map,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn slide_path(&self) -> &Path {
        &self.record.slide_path
    }

    pub fn grid(&self) -> &SlideGrid {
        &self.record.grid
    }

    pub fn categories(&self) -> &CategorySet {
        &self.record.categories
    }

    pub fn randomization(&self) -> &RandomizationMap {
        &self.map
    }

    pub fn metadata(&self) -> &StoreMetadata {
        &self.record.metadata
    }

    /// Read-only view of the persisted tables.
    pub fn record(&self) -> &CaseRecord {
        &self.record
    }

    pub fn tile_count(&self) -> usize {
        self.record.tiles.len()
    }

    /// Real tile index shown at a presentation index.
    pub fn resolve(&self, tile: usize) -> Result<usize> {
        self.map.resolve(tile)
    }

    /// Padded slide window of a presentation tile.
    pub fn pixel_rect(&self, tile: usize) -> Result<PixelRect> {
        let real = self.resolve(tile)?;
        self.record.grid.pixel_rect(real)
    }

    fn check_tile(&self, tile: usize) -> Result<()> {
        if tile >= self.record.tiles.len() {
            return Err(CaseError::OutOfRange {
                index: tile,
                len: self.record.tiles.len(),
            });
        }
        Ok(())
    }

    /// Persist a new annotation on a presentation tile.
    ///
    /// Areas are computed per category. Categories absent from `points` or
    /// given as an empty list were not drawn and get area 0. Generates a tag
    /// when `tag` is `None`. Nothing is written if validation fails.
    pub fn create(
        &mut self,
        tile: usize,
        points: &CategoryPoints,
        tag: Option<Tag>,
    ) -> Result<Annotation> {
        self.check_tile(tile)?;

        if let Some(bad) = points
            .keys()
            .find(|id| !self.record.categories.contains(**id))
        {
            return Err(CaseError::invalid_category(bad));
        }
        if points.values().all(|p| p.is_empty()) {
            return Err(CaseError::EmptyAnnotation);
        }

        let mut areas = Vec::with_capacity(self.record.categories.len());
        for id in self.record.categories.ids() {
            let area = match points.get(&id) {
                Some(p) if !p.is_empty() => polygon_area(p, AreaMode::Legacy)?,
                _ => 0.0,
            };
            areas.push(area);
        }

        let tag = tag.unwrap_or_else(Tag::generate);
        if self.record.annotations.contains_key(&tag) {
            return Err(CaseError::DuplicateTag(tag));
        }

        let rows: Vec<PointRow> = points
            .iter()
            .flat_map(|(&category, pts)| {
                let tag = &tag;
                pts.iter().map(move |p| PointRow {
                    tag: tag.clone(),
                    category,
                    x: p.x,
                    y: p.y,
                })
            })
            .collect();

        let row = AnnotationRow { tile, areas };
        let key = tag.clone();
        self.transact("create", move |record| {
            record.annotations.insert(key, row);
            record.points.extend(rows);
            Ok(())
        })?;

        log::debug!("Created annotation {} on tile {}", tag, tile);
        self.annotation(&tag)
            .ok_or_else(|| CaseError::corrupt(format!("annotation {} vanished after create", tag)))
    }

    /// Persist an annotation whose categories are given by name.
    pub fn create_named(
        &mut self,
        tile: usize,
        points: &BTreeMap<String, Vec<Point>>,
        tag: Option<Tag>,
    ) -> Result<Annotation> {
        let mut by_id = CategoryPoints::new();
        for (name, pts) in points {
            let id = self
                .record
                .categories
                .id_of(name)
                .ok_or_else(|| CaseError::invalid_category(name))?;
            by_id.insert(id, pts.clone());
        }
        self.create(tile, &by_id, tag)
    }

    /// Delete an annotation, its point rows and its impacted flag.
    ///
    /// Deleting a tag that does not exist is a no-op. Returns whether an
    /// annotation was removed.
    pub fn delete(&mut self, tag: &Tag) -> Result<bool> {
        if !self.record.annotations.contains_key(tag) {
            log::debug!("Delete of unknown tag {} ignored", tag);
            return Ok(false);
        }
        let removed = self.transact("delete", |record| Ok(record.remove_annotation(tag)))?;
        log::debug!("Deleted annotation {}", tag);
        Ok(removed)
    }

    /// Flag an existing annotation as impacted.
    pub fn mark_impacted(&mut self, tag: &Tag) -> Result<()> {
        if !self.record.annotations.contains_key(tag) {
            return Err(CaseError::UnknownTag(tag.clone()));
        }
        if self.record.impacted.contains(tag) {
            return Ok(());
        }
        self.transact("mark_impacted", |record| {
            record.impacted.insert(tag.clone());
            Ok(())
        })
    }

    /// Clear the impacted flag. Returns whether the flag was set.
    pub fn unmark_impacted(&mut self, tag: &Tag) -> Result<bool> {
        if !self.record.impacted.contains(tag) {
            return Ok(false);
        }
        self.transact("unmark_impacted", |record| Ok(record.impacted.remove(tag)))
    }

    /// Mark a tile's review as finished or unfinished.
    pub fn set_completed(&mut self, tile: usize, completed: bool) -> Result<()> {
        self.check_tile(tile)?;
        if self.record.tiles[tile].completed == completed {
            return Ok(());
        }
        self.transact("set_completed", |record| {
            record.tiles[tile].completed = completed;
            Ok(())
        })?;
        log::debug!("Tile {} completed = {}", tile, completed);
        Ok(())
    }

    /// Apply `f` to a copy of the record and make it durable.
    fn transact<T>(
        &mut self,
        op: &str,
        f: impl FnOnce(&mut CaseRecord) -> Result<T>,
    ) -> Result<T> {
        let mut next = self.record.clone();
        let out = f(&mut next)?;
        next.metadata.touch();

        let bytes = serde_json::to_vec_pretty(&next)?;
        write_atomic(&self.path, &bytes)?;
        self.record = next;

        log::trace!("Committed {} ({} bytes)", op, bytes.len());
        Ok(out)
    }
}

/// Replace `path` with `bytes` so readers see either the old or the new
/// contents.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let result = (|| -> std::io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)?;
        sync_parent(path);
        Ok(())
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result.map_err(CaseError::from)
}

/// Create `path` with `bytes`, failing if it already exists.
fn create_exclusive(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension(format!("init-{}", Tag::generate()));
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    // Linking fails atomically if the target exists
    let linked = fs::hard_link(&tmp, path);
    let _ = fs::remove_file(&tmp);
    match linked {
        Ok(()) => {
            sync_parent(path);
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(CaseError::AlreadyInitialized {
            path: path.to_path_buf(),
        }),
        Err(e) => {
            log::debug!("Hard link unavailable ({}), using exclusive create", e);
            create_new_with(path, |file| {
                file.write_all(bytes)?;
                file.sync_all()
            })
        }
    }
}

/// Creates `path`, failing if it exists, and fills it with `fill`.
///
/// The file is removed again when `fill` fails, so no partial store is left
/// behind to block a retry.
fn create_new_with(path: &Path, fill: impl FnOnce(&mut File) -> std::io::Result<()>) -> Result<()> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(CaseError::AlreadyInitialized {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(e.into()),
    };
    if let Err(e) = fill(&mut file) {
        drop(file);
        if let Err(rm) = fs::remove_file(path) {
            log::warn!("Failed to remove partial store {:?}: {}", path, rm);
        }
        return Err(e.into());
    }
    Ok(())
}

#[cfg(unix)]
fn sync_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Err(e) = File::open(parent).and_then(|d| d.sync_all()) {
            log::warn!("Failed to sync directory {:?}: {}", parent, e);
        }
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) {}
