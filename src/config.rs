//! Tool configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults
//! are overridden by whatever the user file specifies; the resulting value
//! is passed explicitly to the engine and the pipeline.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [engine]
//! convert = "convert"             # ImageMagick convert executable
//! identify = "identify"           # ImageMagick identify executable
//! intermediate_format = "png"     # Lossless format of the full-size intermediate
//!
//! [storage]
//! root = "images"                 # Root of the image tree
//! sharded = true                  # ROOT/<8 chars>/<10 chars>/ layout
//!
//! [tiles]
//! quality = 90                    # Tile encoding quality (1-100)
//! strip = true                    # Remove profiles and comments
//! adaptive = false                # -adaptive-resize instead of -resize
//!
//! [cleanup]
//! delete_backoff_ms = [0, 100, 300, 600]   # One entry per delete attempt
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [engine]
//! convert = "/opt/ImageMagick/bin/convert"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{Quality, TileSpec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// External raster engine settings.
    pub engine: EngineConfig,
    /// Image tree location and layout.
    pub storage: StorageConfig,
    /// Defaults for tile specs built from the command line.
    pub tiles: TilesConfig,
    /// Stale file deletion.
    pub cleanup: CleanupConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.convert.trim().is_empty() || self.engine.identify.trim().is_empty() {
            return Err(ConfigError::Validation(
                "engine.convert and engine.identify must not be empty".into(),
            ));
        }
        let format = &self.engine.intermediate_format;
        if format.is_empty() || !format.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Validation(format!(
                "engine.intermediate_format must be a bare extension, got '{format}'"
            )));
        }
        if !(1..=100).contains(&self.tiles.quality) {
            return Err(ConfigError::Validation(
                "tiles.quality must be 1-100".into(),
            ));
        }
        if self.cleanup.delete_backoff_ms.is_empty() {
            return Err(ConfigError::Validation(
                "cleanup.delete_backoff_ms needs at least one attempt".into(),
            ));
        }
        Ok(())
    }
}

/// External raster engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub convert: String,
    pub identify: String,
    /// Extension of the Stage A intermediate. Must be lossless.
    pub intermediate_format: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            convert: "convert".to_string(),
            identify: "identify".to_string(),
            intermediate_format: "png".to_string(),
        }
    }
}

/// Image tree location and layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub root: String,
    pub sharded: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "images".to_string(),
            sharded: true,
        }
    }
}

/// Tile processing defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TilesConfig {
    pub quality: u32,
    pub strip: bool,
    pub adaptive: bool,
}

impl Default for TilesConfig {
    fn default() -> Self {
        Self {
            quality: Quality::default().value(),
            strip: true,
            adaptive: false,
        }
    }
}

impl TilesConfig {
    /// A tile spec for the given permille values carrying these defaults.
    pub fn spec(&self, tile_width_permille: u32, tile_height_permille: u32) -> TileSpec {
        TileSpec {
            quality: Some(Quality::new(self.quality)),
            strip: self.strip,
            adaptive: self.adaptive,
            ..TileSpec::new(tile_width_permille, tile_height_permille)
        }
    }
}

/// Stale file deletion schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanupConfig {
    /// Delay before each delete attempt, in milliseconds.
    pub delete_backoff_ms: Vec<u64>,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            delete_backoff_ms: vec![0, 100, 300, 600],
        }
    }
}

impl CleanupConfig {
    pub fn backoff(&self) -> Vec<Duration> {
        self.delete_backoff_ms
            .iter()
            .copied()
            .map(Duration::from_millis)
            .collect()
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Config::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a `config.toml` file.
///
/// A missing file yields the stock defaults. Otherwise user values are
/// merged on top of stock defaults, unknown keys are rejected and the
/// result is validated.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let overlay = if path.exists() {
        let content = fs::read_to_string(path)?;
        Some(toml::from_str::<toml::Value>(&content)?)
    } else {
        None
    };
    resolve_config(stock_defaults_value()?, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# sku-tiles configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Raster engine (ImageMagick)
# ---------------------------------------------------------------------------
[engine]
# Executables, either on PATH or as absolute paths.
convert = "convert"
identify = "identify"

# Format of the full-size intermediate written before cropping.
# Must be lossless; tiles are cut from it.
intermediate_format = "png"

# ---------------------------------------------------------------------------
# Image tree
# ---------------------------------------------------------------------------
[storage]
# Root directory of the image tree.
root = "images"

# Store files as ROOT/<first 8 chars of SKU>/<first 10 chars of SKU>/.
sharded = true

# ---------------------------------------------------------------------------
# Tile defaults
# ---------------------------------------------------------------------------
[tiles]
# Encoding quality of the tiles (1 = worst, 100 = best).
quality = 90

# Strip profiles and comments from the tiles.
strip = true

# Use -adaptive-resize instead of -resize when the master must be scaled.
adaptive = false

# ---------------------------------------------------------------------------
# Cleanup
# ---------------------------------------------------------------------------
[cleanup]
# Delay in milliseconds before each attempt to delete a stale tile.
# Files that survive every attempt are left behind and reported.
delete_backoff_ms = [0, 100, 300, 600]
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.engine.convert, "convert");
        assert_eq!(config.engine.intermediate_format, "png");
        assert_eq!(config.storage.root, "images");
        assert!(config.storage.sharded);
        assert_eq!(config.tiles.quality, 90);
        assert_eq!(config.cleanup.delete_backoff_ms, vec![0, 100, 300, 600]);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[engine]
convert = "/opt/im/convert"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.engine.convert, "/opt/im/convert");
        // Defaults preserved
        assert_eq!(config.engine.identify, "identify");
        assert_eq!(config.tiles.quality, 90);
    }

    #[test]
    fn unknown_keys_rejected() {
        let toml = r#"
[tiles]
qualty = 80
"#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn unknown_section_rejected() {
        assert!(toml::from_str::<Config>("[theme]\nx = 1\n").is_err());
    }

    #[test]
    fn validate_quality_range() {
        let mut config = Config::default();
        config.tiles.quality = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
        config.tiles.quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_intermediate_format() {
        let mut config = Config::default();
        config.engine.intermediate_format = ".png".into();
        assert!(config.validate().is_err());
        config.engine.intermediate_format = "tiff".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_backoff_not_empty() {
        let mut config = Config::default();
        config.cleanup.delete_backoff_ms.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn backoff_converts_to_durations() {
        let config = CleanupConfig {
            delete_backoff_ms: vec![0, 250],
        };
        assert_eq!(
            config.backoff(),
            vec![Duration::ZERO, Duration::from_millis(250)]
        );
    }

    #[test]
    fn tiles_config_builds_spec() {
        let spec = TilesConfig {
            quality: 75,
            strip: false,
            adaptive: true,
        }
        .spec(125, 250);
        assert_eq!(spec.tile_width_permille, 125);
        assert_eq!(spec.tile_height_permille, 250);
        assert_eq!(spec.quality, Some(Quality::new(75)));
        assert!(!spec.strip);
        assert!(spec.adaptive);
        assert!(spec.auto_resize());
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"quality = 90"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"quality = 70"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("quality").unwrap().as_integer(), Some(70));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[tiles]
quality = 90
strip = true
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[tiles]
quality = 70
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let tiles = merged.get("tiles").unwrap();
        assert_eq!(tiles.get("quality").unwrap().as_integer(), Some(70));
        assert_eq!(tiles.get("strip").unwrap().as_bool(), Some(true));
    }

    #[test]
    fn merge_toml_arrays_replace() {
        let base: toml::Value = toml::from_str("a = [1, 2, 3]").unwrap();
        let overlay: toml::Value = toml::from_str("a = [9]").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // Loading
    // =========================================================================

    #[test]
    fn load_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_sparse_file_merges_over_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[storage]\nroot = \"/srv/img\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.storage.root, "/srv/img");
        assert!(config.storage.sharded);
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn load_invalid_values_fails_validation() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[tiles]\nquality = 0\n").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn load_broken_toml_errors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[tiles\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let config: Config = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, Config::default());
    }
}
