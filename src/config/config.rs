use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::utils::app_paths::AppPaths;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub widths: WidthConfig,
    pub virtualization: VirtualizationConfig,
    pub interaction: InteractionConfig,
    pub storage: StorageConfig,
}

/// Pixel constants for column width estimation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidthConfig {
    /// Approximate pixels per character of serialized cell content
    pub char_width: u32,

    /// Clamp range for content-sampled widths
    pub min_width: u32,
    pub max_width: u32,

    /// Fixed widths for columns whose type predicts their content size
    pub identifier_width: u32,
    pub geo_width: u32,
    pub timestamp_width: u32,
    pub boolean_width: u32,
    pub numeric_width: u32,

    /// Subtracted from the available width when a single text column fills the grid
    pub sole_column_margin: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualizationConfig {
    pub enabled: bool,

    /// Extra distance beyond the viewport kept rendered, avoids pop-in on fast scroll
    pub threshold_px: f64,

    /// Grids with fewer rows than this AND narrower rows than `min_row_keys` are not virtualized
    pub min_rows: usize,
    pub min_row_keys: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Smallest width a drag-resize can produce
    pub min_column_width: u32,

    /// Added to the widest measured cell on auto-fit
    pub autofit_margin: u32,

    /// Auto-fit never exceeds this fraction of the document width
    pub autofit_max_fraction: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for per-view JSON documents (defaults to the app data dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_dir: Option<PathBuf>,
}

impl Default for WidthConfig {
    fn default() -> Self {
        Self {
            char_width: 8,
            min_width: 100,
            max_width: 300,
            identifier_width: 160,
            geo_width: 160,
            timestamp_width: 200,
            boolean_width: 100,
            numeric_width: 100,
            sole_column_margin: 10,
        }
    }
}

impl Default for VirtualizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_px: 100.0,
            min_rows: 20,
            min_row_keys: 30,
        }
    }
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            min_column_width: 30,
            autofit_margin: 20,
            autofit_max_fraction: 0.5,
        }
    }
}

impl Config {
    /// Load config from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            // Create default config if it doesn't exist
            let default_config = Self::default();
            default_config.save()?;
            return Ok(default_config);
        }

        let contents = fs::read_to_string(&config_path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(&config_path, contents)?;

        Ok(())
    }

    /// Get the default config file path
    pub fn get_config_path() -> Result<PathBuf> {
        AppPaths::config_file().map_err(|e| anyhow::anyhow!("{}", e))
    }

    /// Create a default config file with comments
    pub fn create_default_with_comments() -> String {
        r#"# SQL Grid Configuration File
# Location: ~/.config/sql-grid/config.toml (Linux)

[widths]
# Pixels per character when sizing columns from their content
char_width = 8

# Content-sized columns stay within this range
min_width = 100
max_width = 300

# Fixed widths by column type
identifier_width = 160
geo_width = 160
timestamp_width = 200
boolean_width = 100
numeric_width = 100

# A lone text column fills the grid minus this margin
sole_column_margin = 10

[virtualization]
# Hide off-screen rows and cells while scrolling
enabled = true

# Pixels beyond the viewport that stay rendered
threshold_px = 100.0

# Small grids (fewer rows AND fewer keys per row than these) are left alone
min_rows = 20
min_row_keys = 30

[interaction]
# Narrowest width a column can be dragged to
min_column_width = 30

# Padding added when double-clicking a header edge to auto-fit
autofit_margin = 20

# Auto-fit never exceeds this share of the document width
autofit_max_fraction = 0.5

[storage]
# Where per-view column configuration is kept (leave commented for default)
# config_dir = "/path/to/views"
"#
        .to_string()
    }
}
