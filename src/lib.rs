//! stereotile - blinded tile sampling for slide stereology
//!
//! A case presents the tiles of a whole-slide image in a fixed random
//! order, stores the polygon annotations drawn on each tile, and decides
//! from the accumulating area fractions when enough tiles have been sampled.

pub mod analysis;
pub mod config;
pub mod constants;
pub mod error;
pub mod export;
pub mod grid;
pub mod model;
pub mod randomization;
pub mod slide;
pub mod store;

pub use analysis::{CompletionAnalyzer, CompletionReport, CompletionTable, SessionState};
pub use config::{CaseConfig, CompletionConfig, ConfigError, GridConfig, LogLevel};
pub use error::{CaseError, Result};
pub use export::{CaseExporter, ExportResult};
pub use grid::{Margins, PixelRect, SlideGrid};
pub use model::{Annotation, Category, CategoryId, CategoryPoints, CategorySet, Tag};
pub use randomization::RandomizationMap;
pub use slide::{ImageFileSource, SlideSource, TileLoader};
pub use store::{CaseInit, CaseStore};

pub use stereotile_geom as geom;
