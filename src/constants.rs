//! Default values for case configuration.

/// Side length of a sampled tile in slide pixels.
pub const DEFAULT_TILE_SIZE: u32 = 4096;

/// Context margin requested around each tile, in slide pixels.
pub const DEFAULT_PADDING_SIZE: u32 = 600;

/// Slide pixels per displayed pixel.
pub const DEFAULT_ZOOM_MULTIPLIER: f64 = 1.0;

/// Slide pyramid level tiles are read from.
pub const DEFAULT_DOWNSCALE_LEVEL: u32 = 0;

/// Completed tiles required before the stopping rule is evaluated.
pub const DEFAULT_MIN_FINISHED_TILES: usize = 20;

/// Trailing rows that must all pass the CE target.
pub const DEFAULT_PASSED_TILES_REQ: usize = 10;

/// Percentage of the reference area a category must exceed to be checked.
pub const DEFAULT_MIN_PERC: f64 = 2.0;

/// Coefficient of error target, in percent.
pub const DEFAULT_MAX_CE: f64 = 5.0;

/// Annotation ceiling for the rare-category exemption.
pub const DEFAULT_MAX_ANNOTATIONS: usize = 3500;

/// Width of the trailing window for the rolling standard deviation.
pub const DEFAULT_ROLLING_WINDOW: usize = 10;

/// Name of the store file inside a case directory.
pub const STORE_FILE_NAME: &str = "case.stereotile.json";

/// Fill color for margins added around edge tiles.
pub const MARGIN_COLOR: [u8; 4] = [255, 255, 255, 255];
