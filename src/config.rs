//! Configuration persistence for rugedit settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::capability::UploadOptions;
use crate::domain::{CropMode, Dpi, StyleHints};
use crate::transform::color_remap::{PALETTE_SIZES, TOLERANCES, VARIANT_COLORS};

/// Persisted client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RugEditConfig {
    /// Base URL of the editing service
    pub server_url: String,
    /// Path prefix of the REST API
    pub api_prefix: String,
    /// Connection establishment timeout; requests themselves never time out
    pub connect_timeout_secs: u64,
    /// Maximum number of history snapshots (None = unbounded)
    pub history_limit: Option<usize>,
    /// Layer extraction tuning sent with every upload
    pub upload: UploadOptions,
    /// Number of colors extracted for recoloring (2-10)
    pub palette_size: u8,
    /// Color matching tolerance (10-100)
    pub tolerance: u8,
    pub preserve_luminance: bool,
    /// Colors per generated hue variant (2-5)
    pub variant_colors: u8,
    pub default_dpi: Dpi,
    pub default_crop_mode: CropMode,
    /// Size passed to the generator, e.g. "1024*1024"
    pub generate_size: String,
    pub generate_count: u32,
    pub search_top_k: u32,
    /// Style hints applied to generation and search until changed
    pub style: StyleHints,
}

impl Default for RugEditConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".to_string(),
            api_prefix: "/api".to_string(),
            connect_timeout_secs: 10,
            // 64 full-size snapshots is plenty for an editing pass
            history_limit: Some(64),
            upload: UploadOptions::default(),
            palette_size: 5,
            tolerance: 40,
            preserve_luminance: true,
            variant_colors: 3,
            default_dpi: Dpi::Standard,
            default_crop_mode: CropMode::Fill,
            generate_size: "1024*1024".to_string(),
            generate_count: 1,
            search_top_k: 10,
            style: StyleHints::default(),
        }
    }
}

impl RugEditConfig {
    /// `<config dir>/rugedit/config.json`
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("No configuration directory on this system")?;
        Ok(dir.join("rugedit").join("config.json"))
    }

    /// Read a config file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Self = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.sanitize();
        Ok(config)
    }

    /// Load configuration from disk, or return defaults if unavailable
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Ok(p) => p,
                Err(err) => {
                    log::warn!("{:#}, using default settings", err);
                    return Self::default();
                }
            },
        };
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Error loading config, using defaults: {:#}", err);
                Self::default()
            }
        }
    }

    /// Save configuration to disk
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }

    /// Clamp out-of-range values into their accepted ranges. Returns the
    /// number of adjusted fields.
    pub fn sanitize(&mut self) -> usize {
        let mut adjusted = 0;

        macro_rules! clamp_field {
            ($field:expr, $lo:expr, $hi:expr, $name:literal) => {
                let clamped = $field.clamp($lo, $hi);
                if clamped != $field {
                    log::warn!("{} {} out of range, using {}", $name, $field, clamped);
                    $field = clamped;
                    adjusted += 1;
                }
            };
        }

        clamp_field!(self.upload.alpha_val, 0.05, 0.5, "alpha_val");
        clamp_field!(self.upload.white_threshold, 200, 255, "white_threshold");
        clamp_field!(self.upload.layer_count, 1, 6, "layer_count");
        clamp_field!(self.palette_size, *PALETTE_SIZES.start(), *PALETTE_SIZES.end(), "palette_size");
        clamp_field!(self.tolerance, *TOLERANCES.start(), *TOLERANCES.end(), "tolerance");
        clamp_field!(self.variant_colors, *VARIANT_COLORS.start(), *VARIANT_COLORS.end(), "variant_colors");
        clamp_field!(self.generate_count, 1, 4, "generate_count");
        clamp_field!(self.search_top_k, 1, 100, "search_top_k");

        adjusted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RugEditConfig::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, RugEditConfig::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = RugEditConfig {
            server_url: "http://editor.local:9000".into(),
            history_limit: None,
            default_dpi: Dpi::High,
            default_crop_mode: CropMode::PreserveBorder,
            ..RugEditConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(RugEditConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults_and_clamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"tolerance": 250, "upload": {"alpha_val": 0.9}, "default_dpi": 300,
                "variant_colors": 9, "style": {"style": "persian"}}"#,
        )
        .unwrap();
        let config = RugEditConfig::load_from(&path).unwrap();
        assert_eq!(config.tolerance, 100);
        assert_eq!(config.upload.alpha_val, 0.5);
        assert_eq!(config.upload.white_threshold, 245);
        assert_eq!(config.default_dpi, Dpi::High);
        assert_eq!(config.variant_colors, 5);
        assert_eq!(config.style.style.as_deref(), Some("persian"));
        assert_eq!(config.style.ratio, None);
        assert_eq!(config.server_url, "http://127.0.0.1:8000");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(RugEditConfig::load_from(&path).is_err());
        // the lenient loader falls back to defaults
        assert_eq!(RugEditConfig::load(Some(&path)), RugEditConfig::default());

        std::fs::write(&path, r#"{"default_dpi": 96}"#).unwrap();
        assert!(RugEditConfig::load_from(&path).is_err());
    }
}
