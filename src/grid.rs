//! Tile grid addressing.
//!
//! Converts real (row-major) tile indices into the pixel window requested
//! from the slide, and tile-relative annotation coordinates back into
//! whole-slide coordinates.
//!
//! Each tile is requested with `padding_size` pixels of context on every
//! side, except where that would leave the slide: the first column gets no
//! left padding, the last column no right padding, and likewise for rows.

use serde::{Deserialize, Serialize};
use stereotile_geom::Point;

use crate::config::GridConfig;
use crate::error::{CaseError, Result};

/// Tile grid of one slide. Fixed once a case is initialized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlideGrid {
    /// Number of tile columns
    pub tiles_x: u32,
    /// Number of tile rows
    pub tiles_y: u32,
    /// Tile side in slide pixels
    pub tile_size: u32,
    /// Context margin around each tile in slide pixels
    pub padding_size: u32,
    /// Slide pyramid level tiles are read from
    #[serde(default)]
    pub downscale_level: u32,
    /// Slide pixels per displayed pixel
    #[serde(default = "default_zoom")]
    pub zoom_multiplier: f64,
}

fn default_zoom() -> f64 {
    crate::constants::DEFAULT_ZOOM_MULTIPLIER
}

/// Sides of a tile window, in slide pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Margins {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Margins {
    pub fn is_zero(&self) -> bool {
        *self == Margins::default()
    }
}

/// Pixel window requested from the slide for one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    /// Left edge in slide pixels
    pub x: u64,
    /// Top edge in slide pixels
    pub y: u64,
    pub width: u32,
    pub height: u32,
    /// Padding actually included in the window
    pub padding: Margins,
    /// Padding that was omitted at slide edges
    pub missing: Margins,
}

/// Padding decision along one axis.
struct AxisWindow {
    origin: u64,
    size: u32,
    before: u32,
    after: u32,
}

fn axis_window(index: u32, count: u32, tile_size: u32, padding: u32) -> AxisWindow {
    let base = u64::from(index) * u64::from(tile_size);
    let before = if index > 0 && base >= u64::from(padding) {
        padding
    } else {
        0
    };
    let after = if index + 1 < count { padding } else { 0 };
    AxisWindow {
        origin: base - u64::from(before),
        size: tile_size + before + after,
        before,
        after,
    }
}

impl SlideGrid {
    /// Create a grid rendered at full resolution.
    pub fn new(tiles_x: u32, tiles_y: u32, tile_size: u32, padding_size: u32) -> Self {
        Self {
            tiles_x,
            tiles_y,
            tile_size,
            padding_size,
            downscale_level: crate::constants::DEFAULT_DOWNSCALE_LEVEL,
            zoom_multiplier: default_zoom(),
        }
    }

    /// Grid with tile and display settings taken from configuration.
    pub fn from_config(tiles_x: u32, tiles_y: u32, config: &GridConfig) -> Self {
        Self::new(tiles_x, tiles_y, config.tile_size, config.padding_size)
            .with_display(config.downscale_level, config.zoom_multiplier)
    }

    /// Grid covering a slide of the given pixel dimensions.
    ///
    /// Partial tiles at the right and bottom edges are not sampled.
    pub fn from_slide_dimensions(width: u64, height: u64, config: &GridConfig) -> Self {
        let tile = u64::from(config.tile_size.max(1));
        let tiles_x = u32::try_from(width / tile).unwrap_or(u32::MAX);
        let tiles_y = u32::try_from(height / tile).unwrap_or(u32::MAX);
        Self::from_config(tiles_x, tiles_y, config)
    }

    /// Set the pyramid level and display zoom.
    pub fn with_display(mut self, downscale_level: u32, zoom_multiplier: f64) -> Self {
        self.downscale_level = downscale_level;
        self.zoom_multiplier = zoom_multiplier;
        self
    }

    /// Side of a fully padded tile window, `tile_size + 2 * padding_size`,
    /// or `None` when it does not fit in `u32`.
    pub fn window_size(&self) -> Option<u32> {
        self.padding_size
            .checked_mul(2)
            .and_then(|p| self.tile_size.checked_add(p))
    }

    /// Check that tile windows of this grid can be addressed.
    pub fn check(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(CaseError::corrupt("grid tile size is zero"));
        }
        if self.window_size().is_none() {
            return Err(CaseError::corrupt(format!(
                "tile size {} with padding {} overflows the pixel window",
                self.tile_size, self.padding_size
            )));
        }
        Ok(())
    }

    /// Total number of tiles.
    pub fn tile_count(&self) -> usize {
        self.tiles_x as usize * self.tiles_y as usize
    }

    /// Column and row of a real tile index.
    pub fn tile_xy(&self, real_index: usize) -> Result<(u32, u32)> {
        let len = self.tile_count();
        if real_index >= len {
            return Err(CaseError::OutOfRange {
                index: real_index,
                len,
            });
        }
        let tiles_x = self.tiles_x as usize;
        Ok(((real_index % tiles_x) as u32, (real_index / tiles_x) as u32))
    }

    /// Top-left corner of a tile without padding, in slide pixels.
    pub fn tile_origin(&self, real_index: usize) -> Result<(u64, u64)> {
        let (tx, ty) = self.tile_xy(real_index)?;
        let size = u64::from(self.tile_size);
        Ok((u64::from(tx) * size, u64::from(ty) * size))
    }

    /// Padded pixel window for a real tile index.
    pub fn pixel_rect(&self, real_index: usize) -> Result<PixelRect> {
        self.check()?;
        let (tx, ty) = self.tile_xy(real_index)?;
        let h = axis_window(tx, self.tiles_x, self.tile_size, self.padding_size);
        let v = axis_window(ty, self.tiles_y, self.tile_size, self.padding_size);
        let p = self.padding_size;

        Ok(PixelRect {
            x: h.origin,
            y: v.origin,
            width: h.size,
            height: v.size,
            padding: Margins {
                left: h.before,
                top: v.before,
                right: h.after,
                bottom: v.after,
            },
            missing: Margins {
                left: p - h.before,
                top: p - v.before,
                right: p - h.after,
                bottom: p - v.after,
            },
        })
    }

    /// Offset of the tile body inside a displayed tile, in display pixels.
    ///
    /// Displayed tiles always carry the full padding on every side (edge
    /// tiles are filled with a margin), so the offset is the same for all
    /// tiles.
    pub fn display_offset(&self) -> f64 {
        (f64::from(self.padding_size) / self.zoom_multiplier).floor()
    }

    /// Convert a tile-relative display point into whole-slide pixels.
    pub fn to_slide(&self, real_index: usize, rel: Point) -> Result<Point> {
        let (ox, oy) = self.tile_origin(real_index)?;
        let pad = f64::from(self.padding_size);
        Ok(Point::new(
            rel.x * self.zoom_multiplier - pad + ox as f64,
            rel.y * self.zoom_multiplier - pad + oy as f64,
        ))
    }

    /// Convert a tile-relative display point so (0, 0) is the tile's
    /// top-left corner rather than the padded window's.
    pub fn to_tile_local(&self, rel: Point) -> Point {
        let offset = self.display_offset();
        Point::new(rel.x - offset, rel.y - offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> SlideGrid {
        SlideGrid::new(5, 5, 1000, 200)
    }

    #[test]
    fn test_corner_tile_has_no_leading_padding() {
        let rect = grid().pixel_rect(0).unwrap();
        assert_eq!((rect.x, rect.y), (0, 0));
        assert_eq!(rect.width, 1200);
        assert_eq!(rect.height, 1200);
        assert_eq!(
            rect.missing,
            Margins {
                left: 200,
                top: 200,
                right: 0,
                bottom: 0
            }
        );
    }

    #[test]
    fn test_interior_tile_padded_on_all_sides() {
        // x = 2, y = 2
        let rect = grid().pixel_rect(12).unwrap();
        assert_eq!((rect.x, rect.y), (1800, 1800));
        assert_eq!(rect.width, 1400);
        assert_eq!(rect.height, 1400);
        assert!(rect.missing.is_zero());
    }

    #[test]
    fn test_last_tile_has_no_trailing_padding() {
        let rect = grid().pixel_rect(24).unwrap();
        assert_eq!((rect.x, rect.y), (3800, 3800));
        assert_eq!(rect.width, 1200);
        assert_eq!(rect.height, 1200);
        assert_eq!(rect.padding.right, 0);
        assert_eq!(rect.padding.bottom, 0);
    }

    #[test]
    fn test_mixed_edges() {
        // x = 4 (last column), y = 0 (first row)
        let rect = grid().pixel_rect(4).unwrap();
        assert_eq!((rect.x, rect.y), (3800, 0));
        assert_eq!(rect.width, 1200);
        assert_eq!(rect.height, 1200);
    }

    #[test]
    fn test_padding_never_pushes_origin_negative() {
        // Padding larger than a tile: column 1 cannot move left by 300
        let g = SlideGrid::new(4, 1, 200, 300);
        let rect = g.pixel_rect(1).unwrap();
        assert_eq!(rect.x, 200);
        assert_eq!(rect.padding.left, 0);
        assert_eq!(rect.missing.left, 300);
        assert_eq!(rect.width, 200 + 300);

        let rect = g.pixel_rect(2).unwrap();
        assert_eq!(rect.x, 100);
        assert_eq!(rect.width, 200 + 600);
    }

    #[test]
    fn test_single_tile_grid() {
        let g = SlideGrid::new(1, 1, 512, 64);
        let rect = g.pixel_rect(0).unwrap();
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (0, 0, 512, 512));
    }

    #[test]
    fn test_out_of_range() {
        assert!(matches!(
            grid().pixel_rect(25),
            Err(CaseError::OutOfRange { index: 25, len: 25 })
        ));
    }

    #[test]
    fn test_oversized_padding_is_rejected() {
        let g = SlideGrid::new(3, 3, u32::MAX / 2, u32::MAX / 2);
        assert_eq!(g.window_size(), None);
        assert!(matches!(g.pixel_rect(4), Err(CaseError::CorruptStore { .. })));
        assert!(g.check().is_err());

        let fits = SlideGrid::new(3, 3, u32::MAX - 2, 1);
        assert_eq!(fits.window_size(), Some(u32::MAX));
        assert!(fits.pixel_rect(4).is_ok());
        assert_eq!(grid().window_size(), Some(1400));
    }

    #[test]
    fn test_to_slide_conversion() {
        let g = grid();
        // real index 7 -> column 2, row 1
        let p = g.to_slide(7, Point::new(200.0, 250.0)).unwrap();
        assert_eq!(p, Point::new(2000.0, 1050.0));

        let zoomed = grid().with_display(1, 2.0);
        let p = zoomed.to_slide(7, Point::new(100.0, 100.0)).unwrap();
        assert_eq!(p, Point::new(2000.0, 1000.0));
    }

    #[test]
    fn test_tile_local() {
        let g = grid().with_display(0, 3.0);
        // floor(200 / 3) = 66
        assert_eq!(g.to_tile_local(Point::new(70.0, 66.0)), Point::new(4.0, 0.0));
    }

    #[test]
    fn test_from_slide_dimensions_floors() {
        let config = GridConfig {
            tile_size: 4096,
            ..GridConfig::default()
        };
        let g = SlideGrid::from_slide_dimensions(127_000, 9000, &config);
        assert_eq!((g.tiles_x, g.tiles_y), (31, 2));
        assert_eq!(g.tile_count(), 62);
    }
}
