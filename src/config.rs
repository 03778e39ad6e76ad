//! Configuration file support for stereotile.
//!
//! Grid and category settings are copied into a case when it is initialized
//! and are fixed from then on. Completion thresholds and the log level are
//! read at every run and may be tuned between sessions.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::model::{default_categories, Category, CategorySet};

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Get the display name for this log level.
    pub fn name(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Parse a level name as accepted on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Case configuration that can be exported and imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Tile geometry used when initializing a case
    #[serde(default)]
    pub grid: GridConfig,

    /// Ordered categories; the first one is the reference region
    #[serde(default = "default_category_configs")]
    pub categories: Vec<CategoryConfig>,

    /// Stopping rule thresholds
    #[serde(default)]
    pub completion: CompletionConfig,
}

/// Tile geometry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    #[serde(default = "default_padding_size")]
    pub padding_size: u32,
    #[serde(default = "default_zoom_multiplier")]
    pub zoom_multiplier: f64,
    #[serde(default)]
    pub downscale_level: u32,
}

fn default_tile_size() -> u32 {
    constants::DEFAULT_TILE_SIZE
}

fn default_padding_size() -> u32 {
    constants::DEFAULT_PADDING_SIZE
}

fn default_zoom_multiplier() -> f64 {
    constants::DEFAULT_ZOOM_MULTIPLIER
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            tile_size: default_tile_size(),
            padding_size: default_padding_size(),
            zoom_multiplier: default_zoom_multiplier(),
            downscale_level: constants::DEFAULT_DOWNSCALE_LEVEL,
        }
    }
}

/// Thresholds for the sampling stopping rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Completed tiles needed before the rule is evaluated at all
    pub min_finished_tiles: usize,
    /// Trailing rows that must all pass (R)
    pub passed_tiles_req: usize,
    /// Percentage a category must exceed to be held to the CE target
    pub min_perc: f64,
    /// CE target in percent
    pub max_ce: f64,
    /// Annotation ceiling for the rare-category exemption
    pub max_annotations: usize,
    /// Rolling window width (W)
    pub rolling_window: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            min_finished_tiles: constants::DEFAULT_MIN_FINISHED_TILES,
            passed_tiles_req: constants::DEFAULT_PASSED_TILES_REQ,
            min_perc: constants::DEFAULT_MIN_PERC,
            max_ce: constants::DEFAULT_MAX_CE,
            max_annotations: constants::DEFAULT_MAX_ANNOTATIONS,
            rolling_window: constants::DEFAULT_ROLLING_WINDOW,
        }
    }
}

/// Category configuration for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Display name of the category
    pub name: String,
    /// RGB color for the category
    #[serde(default = "default_category_color")]
    pub color: [u8; 3],
}

fn default_category_color() -> [u8; 3] {
    [200, 200, 200]
}

fn default_category_configs() -> Vec<CategoryConfig> {
    default_categories().iter().map(CategoryConfig::from).collect()
}

impl From<&Category> for CategoryConfig {
    fn from(cat: &Category) -> Self {
        Self {
            name: cat.name.clone(),
            color: cat.color,
        }
    }
}

impl From<&CategoryConfig> for Category {
    fn from(config: &CategoryConfig) -> Self {
        Category::new(&config.name, config.color)
    }
}

impl CaseConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            log_level: LogLevel::default(),
            grid: GridConfig::default(),
            categories: default_category_configs(),
            completion: CompletionConfig::default(),
        }
    }

    /// Ordered category set described by this configuration.
    pub fn category_set(&self) -> CategorySet {
        CategorySet::new(self.categories.iter().map(Category::from).collect())
    }

    /// Check values that would make a case unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.categories.len() < 2 {
            return Err(ConfigError::invalid(
                "categories",
                "need a reference category and at least one measured category",
            ));
        }
        for (i, cat) in self.categories.iter().enumerate() {
            if cat.name.trim().is_empty() {
                return Err(ConfigError::invalid("categories", "category names must not be empty"));
            }
            if cat.name.contains(['/', '\\']) || cat.name == "." || cat.name == ".." {
                return Err(ConfigError::invalid(
                    "categories",
                    format!("category '{}' cannot be used in a file name", cat.name),
                ));
            }
            if self.categories[..i].iter().any(|c| c.name == cat.name) {
                return Err(ConfigError::invalid(
                    "categories",
                    format!("duplicate category '{}'", cat.name),
                ));
            }
        }
        if self.grid.tile_size == 0 {
            return Err(ConfigError::invalid("grid.tile_size", "must be positive"));
        }
        if self
            .grid
            .padding_size
            .checked_mul(2)
            .and_then(|p| self.grid.tile_size.checked_add(p))
            .is_none()
        {
            return Err(ConfigError::invalid(
                "grid.padding_size",
                "tile_size + 2 * padding_size must fit in 32 bits",
            ));
        }
        if !(self.grid.zoom_multiplier.is_finite() && self.grid.zoom_multiplier > 0.0) {
            return Err(ConfigError::invalid("grid.zoom_multiplier", "must be positive"));
        }
        if self.completion.rolling_window < 2 {
            return Err(ConfigError::invalid(
                "completion.rolling_window",
                "must be at least 2",
            ));
        }
        if self.completion.passed_tiles_req == 0 {
            return Err(ConfigError::invalid(
                "completion.passed_tiles_req",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize and validate configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        config.validate()?;
        Ok(config)
    }

    /// Get the default filename for config export.
    pub fn default_filename() -> &'static str {
        "stereotile-config.json"
    }

    /// Get the default config file path for auto-load.
    pub fn default_path() -> Option<PathBuf> {
        // Try to use XDG config directory, fall back to home directory
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("stereotile").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("stereotile")
                    .join(Self::default_filename())
            })
        }
    }

    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load from `path` if given, else from the default path, else defaults.
    ///
    /// An explicit path must exist and parse. A broken file at the default
    /// path is reported and skipped.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let Some(default_path) = Self::default_path() else {
            return Ok(Self::default());
        };
        if !default_path.exists() {
            log::debug!("No config file found at {:?}", default_path);
            return Ok(Self::default());
        }
        match Self::load(&default_path) {
            Ok(config) => Ok(config),
            Err(e) => {
                log::warn!("Ignoring config file {:?}: {}", default_path, e);
                Ok(Self::default())
            }
        }
    }

    /// Save configuration to a file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

impl Default for CaseConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// A setting has an unusable value
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ConfigError {
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_sampling_protocol() {
        let config = CaseConfig::default();
        assert_eq!(config.grid.tile_size, 4096);
        assert_eq!(config.grid.padding_size, 600);
        assert_eq!(config.completion.min_finished_tiles, 20);
        assert_eq!(config.completion.passed_tiles_req, 10);
        assert_eq!(config.completion.max_annotations, 3500);
        assert_eq!(config.category_set().reference().unwrap().name, "papilla");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let mut config = CaseConfig::default();
        config.completion.max_ce = 7.5;
        config.log_level = LogLevel::Debug;
        let json = config.to_json().unwrap();
        let loaded = CaseConfig::from_json(&json).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "version": 1, "completion": { "max_ce": 4.0 } }"#;
        let config = CaseConfig::from_json(json).unwrap();
        assert_eq!(config.completion.max_ce, 4.0);
        assert_eq!(config.completion.rolling_window, 10);
        assert_eq!(config.grid.tile_size, 4096);
        assert_eq!(config.categories.len(), 4);
    }

    #[test]
    fn test_version_too_new() {
        let json = r#"{ "version": 99 }"#;
        assert!(matches!(
            CaseConfig::from_json(json),
            Err(ConfigError::VersionTooNew {
                file_version: 99,
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_single_category() {
        let json = r#"{ "version": 1, "categories": [ { "name": "papilla" } ] }"#;
        assert!(matches!(
            CaseConfig::from_json(json),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_rejects_duplicate_category() {
        let mut config = CaseConfig::default();
        config.categories[2].name = "fibrosis".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_overflowing_padding() {
        let mut config = CaseConfig::default();
        config.grid.tile_size = u32::MAX / 2;
        config.grid.padding_size = u32::MAX / 2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));

        config.grid.padding_size = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_category_names_unusable_in_file_names() {
        for bad in ["a/b", "a\\b", ".."] {
            let mut config = CaseConfig::default();
            config.categories[1].name = bad.to_string();
            assert!(config.validate().is_err(), "{} accepted", bad);
        }
    }

    #[test]
    fn test_rejects_bad_window_and_zoom() {
        let mut config = CaseConfig::default();
        config.completion.rolling_window = 1;
        assert!(config.validate().is_err());

        let mut config = CaseConfig::default();
        config.grid.zoom_multiplier = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_names() {
        assert_eq!(LogLevel::from_name("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_name("nope"), None);
        assert_eq!(LogLevel::Trace.to_level_filter(), log::LevelFilter::Trace);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = CaseConfig::default();
        config.save(&path).unwrap();
        assert_eq!(CaseConfig::resolve(Some(&path)).unwrap(), config);
    }
}
