// config.rs - Top-level configuration, loadable from TOML.
//
// Every section carries `#[serde(default)]`, so a config file only needs to
// name the values it changes:
//
//   [frame]
//   expected_width = 1280
//   expected_height = 720
//
//   [recolor]
//   threshold = 0.08
//
// Each component still owns its own config struct (`KmeansConfig`,
// `RecolorParams`, `SchedulerConfig`); this module only aggregates them and
// validates the combination.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::{Quantizer, DEFAULT_DIVISOR};
use crate::kmeans::KmeansConfig;
use crate::recolor::RecolorParams;
use crate::scheduler::SchedulerConfig;

/// Errors from building or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("quantization divisor must be at least 1")]
    ZeroDivisor,
    #[error("expected frame resolution must be non-zero (got {width}x{height})")]
    ZeroResolution { width: u32, height: u32 },
    #[error("match threshold must be positive and finite (got {0})")]
    InvalidThreshold(f32),
    #[error("cluster count must be at least 1")]
    ZeroClusters,
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Resolution the pipeline is sized for. Frames of a different size are
/// still processed; the mismatch is only reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub expected_width: u32,
    pub expected_height: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        FrameConfig { expected_width: 640, expected_height: 480 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Divide-and-truncate factor applied to each channel before dedup.
    pub quantization_divisor: u8,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig { quantization_divisor: DEFAULT_DIVISOR }
    }
}

impl CollectorConfig {
    pub fn quantizer(&self) -> Result<Quantizer, ConfigError> {
        Quantizer::new(self.quantization_divisor)
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HuekeyConfig {
    #[serde(default)]
    pub frame: FrameConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub kmeans: KmeansConfig,
    #[serde(default)]
    pub recolor: RecolorParams,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl HuekeyConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: HuekeyConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load `path` if given and valid, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match Self::load(path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config");
                config
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "falling back to default config");
                Self::default()
            }
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame.expected_width == 0 || self.frame.expected_height == 0 {
            return Err(ConfigError::ZeroResolution {
                width: self.frame.expected_width,
                height: self.frame.expected_height,
            });
        }
        self.collector.quantizer()?;
        if self.kmeans.clusters == 0 {
            return Err(ConfigError::ZeroClusters);
        }
        let t = self.recolor.threshold;
        if !(t.is_finite() && t > 0.0) {
            return Err(ConfigError::InvalidThreshold(t));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
