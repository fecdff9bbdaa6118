//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging the `imaging.toml` file. Stock
//! defaults are serialized to a TOML value and the user file is merged on
//! top, so a config file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [encoding]
//! quality = 90              # JPEG / AVIF quality (1-100)
//! avif_speed = 6            # rav1e speed (1 = slowest, 10 = fastest)
//!
//! [resize]
//! filter = "lanczos3"       # nearest | triangle | catmull_rom | gaussian | lanczos3
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//!
//! # The recipe: operations applied to every upload, in order
//! [[process]]
//! op = "auto_orient"
//!
//! [[process]]
//! op = "resize_to_fill"
//! width = 400
//! height = 500
//! gravity = "North"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{EncodeParams, PendingFormat, Quality, ResizeFilter, supported_names};
use crate::operation::{Operation, Recipe};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
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

/// Pipeline configuration loaded from `imaging.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Encoder settings used on flush.
    pub encoding: EncodingConfig,
    /// Resampling settings for every resize operation.
    pub resize: ResizeConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// The ordered recipe.
    pub process: Vec<Operation>,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.encoding.quality) {
            return Err(ConfigError::Validation(
                "encoding.quality must be 1-100".into(),
            ));
        }
        if !(1..=10).contains(&self.encoding.avif_speed) {
            return Err(ConfigError::Validation(
                "encoding.avif_speed must be 1-10".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        for (index, operation) in self.process.iter().enumerate() {
            validate_operation(operation)
                .map_err(|msg| ConfigError::Validation(format!("process[{index}]: {msg}")))?;
        }
        Ok(())
    }

    /// Recipe built from the `[[process]]` entries.
    pub fn recipe(&self) -> Recipe {
        self.process.iter().cloned().collect()
    }

    pub fn encode_params(&self) -> EncodeParams {
        EncodeParams {
            quality: Quality::new(self.encoding.quality),
            avif_speed: self.encoding.avif_speed,
        }
    }
}

fn validate_operation(operation: &Operation) -> Result<(), String> {
    match operation {
        Operation::Convert { format } => {
            if PendingFormat::parse(format).is_none() {
                return Err(format!(
                    "unsupported format '{format}' (expected one of: {})",
                    supported_names()
                ));
            }
        }
        Operation::ResizeToLimit { width, height }
        | Operation::ResizeToFit { width, height }
        | Operation::ResizeToFill { width, height, .. } => {
            if *width == 0 || *height == 0 {
                return Err(format!(
                    "{} dimensions must be non-zero",
                    operation.name()
                ));
            }
        }
        Operation::AutoOrient | Operation::Strip => {}
    }
    Ok(())
}

/// Encoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingConfig {
    /// Lossy quality for JPEG and AVIF (1-100).
    pub quality: u32,
    /// rav1e speed for AVIF (1-10).
    pub avif_speed: u8,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        let params = EncodeParams::default();
        Self {
            quality: params.quality.value(),
            avif_speed: params.avif_speed,
        }
    }
}

/// Resize settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    pub filter: ResizeFilter,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers. When absent, defaults to the
    /// number of CPU cores. Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Stock defaults as a TOML value, the base every user file merges onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PipelineConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely, so a
///   `[[process]]` list in the user file replaces the stock one.
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

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PipelineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the file at `path`.
///
/// A missing file yields the stock defaults (an empty recipe).
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `imaging.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Upload Imaging Configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
[encoding]
# Lossy quality for JPEG and AVIF output (1-100). PNG, TIFF and WebP
# (lossless) ignore it.
quality = 90
# rav1e encoder speed for AVIF output: 1 = slowest/smallest, 10 = fastest.
avif_speed = 6

# ---------------------------------------------------------------------------
# Resizing
# ---------------------------------------------------------------------------
[resize]
# Resampling filter: nearest, triangle, catmull_rom, gaussian, lanczos3
filter = "lanczos3"

# ---------------------------------------------------------------------------
# Parallel processing
# ---------------------------------------------------------------------------
[processing]
# Maximum number of parallel workers for batch runs.
# Omit to use all CPU cores. Values above the core count are clamped.
# max_processes = 4

# ---------------------------------------------------------------------------
# Recipe
# ---------------------------------------------------------------------------
# Operations applied to every upload, in the order listed. With no
# process entries, files are left untouched.
#
# op = "auto_orient"       Rotate upright from EXIF orientation
# op = "strip"             Remove all metadata
# op = "resize_to_limit"   Shrink to fit width x height (never enlarges)
# op = "resize_to_fit"     Scale up or down to fit width x height
# op = "resize_to_fill"    Cover width x height and crop at gravity
#                          (Center, North, South, East, West,
#                           NorthEast, NorthWest, SouthEast, SouthWest)
# op = "convert"           Re-encode as format (jpg, jpeg, png, tif, tiff,
#                          webp, avif); the name becomes the file extension
#
# [[process]]
# op = "auto_orient"
#
# [[process]]
# op = "resize_to_fill"
# width = 400
# height = 500
# gravity = "North"
#
# [[process]]
# op = "strip"
#
# [[process]]
# op = "convert"
# format = "webp"
"##
}
