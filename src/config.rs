//! Intake configuration.
//!
//! Handles loading, validating, and merging `place-photos.toml`. Stock
//! defaults are overridden by whatever keys the user file sets.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [compression]
//! max_dimension = 1920      # Longest edge of compressed images, in pixels
//! max_bytes = 1048576       # Byte budget per compressed image
//! quality = 80              # Starting encode quality (1-100)
//! min_quality = 40          # Lowest quality the encoder steps down to
//! quality_step = 10         # Quality decrement per retry
//! format = "jpeg"           # "jpeg" or "avif"
//!
//! [address]
//! policy = "keep-existing"  # "keep-existing", "overwrite", or "skip-when-set"
//!
//! [retrieval]
//! bucket = "places"         # Prefix stripped from stored image paths
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! The per-place image cap is fixed at [`MAX_IMAGES`](crate::types::MAX_IMAGES)
//! and is not configurable. Unknown keys are rejected to catch typos early.

use crate::compress::OutputFormat;
use crate::location::AddressPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up in the config directory.
pub const CONFIG_FILE: &str = "place-photos.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Intake configuration loaded from `place-photos.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntakeConfig {
    /// Compression targets (size, quality, format).
    pub compression: CompressionConfig,
    /// What GPS extraction may do to an already-filled address.
    pub address: AddressConfig,
    /// Asset download settings.
    pub retrieval: RetrievalConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl IntakeConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.compression;
        if c.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "compression.max_dimension must be non-zero".into(),
            ));
        }
        if c.max_bytes == 0 {
            return Err(ConfigError::Validation(
                "compression.max_bytes must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&c.quality) || !(1..=100).contains(&c.min_quality) {
            return Err(ConfigError::Validation(
                "compression.quality and compression.min_quality must be 1-100".into(),
            ));
        }
        if c.min_quality > c.quality {
            return Err(ConfigError::Validation(
                "compression.min_quality must not exceed compression.quality".into(),
            ));
        }
        if self.retrieval.bucket.trim().is_empty() || self.retrieval.bucket.contains('/') {
            return Err(ConfigError::Validation(
                "retrieval.bucket must be a single non-empty path segment".into(),
            ));
        }
        Ok(())
    }
}

/// Compression targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionConfig {
    pub max_dimension: u32,
    pub max_bytes: u64,
    pub quality: u32,
    pub min_quality: u32,
    pub quality_step: u32,
    pub format: OutputFormat,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1920,
            max_bytes: 1024 * 1024,
            quality: 80,
            min_quality: 40,
            quality_step: 10,
            format: OutputFormat::Jpeg,
        }
    }
}

/// Address extraction settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AddressConfig {
    pub policy: AddressPolicy,
}

/// Asset download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Storage bucket name. Stored image paths start with `"{bucket}/"`.
    pub bucket: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            bucket: "places".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel compression workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(IntakeConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
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

/// Load `place-photos.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<IntakeConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: IntakeConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `place-photos.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<IntakeConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `place-photos.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# place-photos configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Compression
# ---------------------------------------------------------------------------
[compression]
# Longest edge of a compressed image, in pixels. Larger photos are downscaled.
max_dimension = 1920

# Byte budget per image. Quality steps down until the output fits.
max_bytes = 1048576

# Starting encode quality (1 = worst, 100 = best).
quality = 80

# The encoder never goes below this quality, even if the budget is missed.
min_quality = 40

# How much quality drops on each retry.
quality_step = 10

# Output format: "jpeg" or "avif".
format = "jpeg"

# ---------------------------------------------------------------------------
# Address from GPS
# ---------------------------------------------------------------------------
[address]
# What to do when the place already has an address:
#   "keep-existing"  keep it and report the GPS address as a suggestion
#   "overwrite"      replace it with the GPS address
#   "skip-when-set"  don't read GPS at all
policy = "keep-existing"

# ---------------------------------------------------------------------------
# Asset download
# ---------------------------------------------------------------------------
[retrieval]
# Storage bucket; stored image paths start with "<bucket>/".
bucket = "places"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel compression workers. Omit for auto (= CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = IntakeConfig::default();
        assert_eq!(config.compression.max_dimension, 1920);
        assert_eq!(config.compression.max_bytes, 1_048_576);
        assert_eq!(config.compression.format, OutputFormat::Jpeg);
        assert_eq!(config.address.policy, AddressPolicy::KeepExisting);
        assert_eq!(config.retrieval.bucket, "places");
        assert!(config.processing.max_processes.is_none());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[compression]
format = "avif"
quality = 70
"#;
        let config: IntakeConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.compression.format, OutputFormat::Avif);
        assert_eq!(config.compression.quality, 70);
        // Defaults preserved
        assert_eq!(config.compression.max_dimension, 1920);
        assert_eq!(config.address.policy, AddressPolicy::KeepExisting);
    }

    #[test]
    fn parse_address_policies() {
        for (raw, expected) in [
            ("keep-existing", AddressPolicy::KeepExisting),
            ("overwrite", AddressPolicy::Overwrite),
            ("skip-when-set", AddressPolicy::SkipWhenSet),
        ] {
            let config: IntakeConfig =
                toml::from_str(&format!("[address]\npolicy = \"{raw}\"\n")).unwrap();
            assert_eq!(config.address.policy, expected);
        }
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.compression.quality, 80);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"
[compression]
max_dimension = 1024

[address]
policy = "overwrite"
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.compression.max_dimension, 1024);
        assert_eq!(config.address.policy, AddressPolicy::Overwrite);
        assert_eq!(config.compression.quality, 80);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE),
            "[compression]\nquality = 30\nmin_quality = 50\n",
        )
        .unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(IntakeConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_zero_dimension() {
        let mut config = IntakeConfig::default();
        config.compression.max_dimension = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_quality_out_of_range() {
        let mut config = IntakeConfig::default();
        config.compression.quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_bucket_with_slash() {
        let mut config = IntakeConfig::default();
        config.retrieval.bucket = "places/extra".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_key_rejected() {
        let result: Result<IntakeConfig, _> = toml::from_str("max_images = 12\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_nested_key_rejected() {
        let result: Result<IntakeConfig, _> = toml::from_str("[compression]\nwidth = 10\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_format_rejected() {
        let result: Result<IntakeConfig, _> = toml::from_str("[compression]\nformat = \"gif\"\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // Merging
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("b = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"].as_integer(), Some(1));
        assert_eq!(merged["b"].as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base = stock_defaults_value().unwrap();
        let overlay: toml::Value = toml::from_str("[compression]\nquality = 65").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["compression"]["quality"].as_integer(), Some(65));
        assert_eq!(merged["compression"]["max_dimension"].as_integer(), Some(1920));
    }

    #[test]
    fn resolve_config_rejects_invalid_values() {
        let base = stock_defaults_value().unwrap();
        let overlay: toml::Value = toml::from_str("[compression]\nmax_bytes = 0").unwrap();
        assert!(resolve_config(base, Some(overlay)).is_err());
    }

    // =========================================================================
    // Processing
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let threads = effective_threads(&ProcessingConfig::default());
        assert!(threads >= 1);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_zero_means_one() {
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // Stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: IntakeConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = IntakeConfig::default();
        assert_eq!(config.compression.quality, defaults.compression.quality);
        assert_eq!(config.compression.max_bytes, defaults.compression.max_bytes);
        assert_eq!(config.address.policy, defaults.address.policy);
        assert_eq!(config.retrieval.bucket, defaults.retrieval.bucket);
    }
}
