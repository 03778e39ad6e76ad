//! Slide access and tile composition.
//!
//! The case engine never decodes slide formats itself. A [`SlideSource`]
//! rasterizes pixel windows; [`TileLoader`] turns a grid tile into the
//! displayed image, filling the padding that edge tiles lack with a blank
//! margin so every tile has the same layout.

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::constants::MARGIN_COLOR;
use crate::error::{CaseError, Result};
use crate::grid::SlideGrid;

/// Source of slide pixels.
pub trait SlideSource {
    /// Width and height of the slide at full resolution.
    fn dimensions(&self) -> (u64, u64);

    /// Read a window whose top-left corner is `(x, y)` in full-resolution
    /// pixels. `width` and `height` are in pixels of `level`.
    fn read_region(&self, x: u64, y: u64, level: u32, width: u32, height: u32)
        -> Result<RgbaImage>;

    /// Full-resolution pixels per pixel of `level`.
    fn level_downsample(&self, level: u32) -> f64 {
        f64::from(1u32 << level.min(31))
    }
}

/// Slide stored as a single ordinary image file, decoded on open.
///
/// Levels above 0 are synthesized by downsampling the requested window.
pub struct ImageFileSource {
    path: PathBuf,
    image: RgbaImage,
}

impl ImageFileSource {
    pub fn open(path: &Path) -> Result<Self> {
        let image = image::open(path)?.to_rgba8();
        log::info!(
            "Opened slide {:?} ({}x{})",
            path,
            image.width(),
            image.height()
        );
        Ok(Self {
            path: path.to_path_buf(),
            image,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SlideSource for ImageFileSource {
    fn dimensions(&self) -> (u64, u64) {
        (u64::from(self.image.width()), u64::from(self.image.height()))
    }

    fn read_region(
        &self,
        x: u64,
        y: u64,
        level: u32,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage> {
        let scale = self.level_downsample(level);
        let full_w = (f64::from(width) * scale).round() as u32;
        let full_h = (f64::from(height) * scale).round() as u32;

        let mut window = RgbaImage::from_pixel(full_w, full_h, Rgba(MARGIN_COLOR));
        let x = u32::try_from(x).unwrap_or(u32::MAX);
        let y = u32::try_from(y).unwrap_or(u32::MAX);
        if x < self.image.width() && y < self.image.height() {
            let crop = imageops::crop_imm(&self.image, x, y, full_w, full_h).to_image();
            imageops::replace(&mut window, &crop, 0, 0);
        }

        if level == 0 {
            return Ok(window);
        }
        Ok(imageops::resize(&window, width, height, FilterType::Triangle))
    }
}

/// Loads displayed tiles from a slide source.
pub struct TileLoader<S> {
    source: S,
}

impl<S: SlideSource> TileLoader<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Size of a displayed tile including full padding, in display pixels.
    pub fn display_size(grid: &SlideGrid) -> u32 {
        let full = f64::from(grid.tile_size) + 2.0 * f64::from(grid.padding_size);
        (full / grid.zoom_multiplier).round().max(1.0) as u32
    }

    /// Render the displayed image of a real tile.
    ///
    /// The tile body always starts at `padding_size / zoom_multiplier`
    /// display pixels; sides that had no padding at the slide edge are
    /// filled with the margin color.
    pub fn load(&self, grid: &SlideGrid, real_index: usize) -> Result<RgbaImage> {
        let rect = grid.pixel_rect(real_index)?;
        let level = grid.downscale_level;
        let scale = self.source.level_downsample(level);
        let to_level = |v: u32| (f64::from(v) / scale).round() as u32;

        let region = self.source.read_region(
            rect.x,
            rect.y,
            level,
            to_level(rect.width),
            to_level(rect.height),
        )?;

        let full = grid
            .window_size()
            .ok_or_else(|| CaseError::corrupt("tile window does not fit in u32"))?;
        let mut canvas = RgbaImage::from_pixel(to_level(full), to_level(full), Rgba(MARGIN_COLOR));
        imageops::replace(
            &mut canvas,
            &region,
            i64::from(to_level(rect.missing.left)),
            i64::from(to_level(rect.missing.top)),
        );

        if !rect.missing.is_zero() {
            log::debug!(
                "Tile {} re-padded at slide edge: {:?}",
                real_index,
                rect.missing
            );
        }

        let display = Self::display_size(grid);
        if canvas.width() == display && canvas.height() == display {
            return Ok(canvas);
        }
        Ok(imageops::resize(&canvas, display, display, FilterType::Triangle))
    }
}
