//! Game configuration (`Game.ini`).
//!
//! Read once at startup; the resulting [`GameConfig`] is immutable and shared
//! by reference with window setup and transform setup.
//!
//! ```ini
//! [Game]
//! Width=1280
//! Height=720
//! API=OpenGL
//! Samples=4
//! ```

use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use thiserror::Error;

/// Only value accepted for `Game.API`.
pub const SUPPORTED_API: &str = "OpenGL";

const SECTION: &str = "Game";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },
    #[error("could not parse configuration: {0}")]
    Parse(#[source] config::ConfigError),
    #[error("missing configuration key Game.{0}")]
    MissingKey(&'static str),
    #[error("invalid value '{value}' for Game.{key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Validated `[Game]` section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameConfig {
    pub width: u32,
    pub height: u32,
    pub api: String,
    /// MSAA sample count, normalised so that `0` becomes `1`.
    pub samples: u32,
}

impl GameConfig {
    /// Load and validate an INI file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        log::info!("Loading configuration from {}", path.display());
        let cfg = Config::builder()
            .add_source(File::from(path).format(FileFormat::Ini).required(true))
            .build()
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_config(&cfg)
    }

    /// Parse INI text directly.
    pub fn from_ini_str(contents: &str) -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Ini))
            .build()
            .map_err(ConfigError::Parse)?;
        Self::from_config(&cfg)
    }

    fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        let width = parse_dimension(cfg, "Width")?;
        let height = parse_dimension(cfg, "Height")?;

        let api = lookup(cfg, "API").ok_or(ConfigError::MissingKey("API"))?;
        if api != SUPPORTED_API {
            return Err(ConfigError::InvalidValue {
                key: "API",
                value: api,
                reason: format!("expected {SUPPORTED_API}"),
            });
        }

        let raw_samples = lookup(cfg, "Samples").ok_or(ConfigError::MissingKey("Samples"))?;
        let samples = parse_u32(&raw_samples, "Samples")?.max(1);
        if !samples.is_power_of_two() || samples > 16 {
            return Err(ConfigError::InvalidValue {
                key: "Samples",
                value: raw_samples,
                reason: "expected 0, 1, 2, 4, 8 or 16".to_string(),
            });
        }

        let config = Self {
            width,
            height,
            api,
            samples,
        };
        log::debug!("Configuration: {config:?}");
        Ok(config)
    }

    /// Width / height, used for the projection.
    #[inline]
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Key lookup that tolerates the loader lower-casing section and key names.
fn lookup(cfg: &Config, key: &str) -> Option<String> {
    cfg.get_string(&format!("{SECTION}.{key}"))
        .or_else(|_| {
            cfg.get_string(&format!(
                "{}.{}",
                SECTION.to_ascii_lowercase(),
                key.to_ascii_lowercase()
            ))
        })
        .ok()
        .map(|v| v.trim().to_string())
}

fn parse_u32(value: &str, key: &'static str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|e| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_dimension(cfg: &Config, key: &'static str) -> Result<u32, ConfigError> {
    let raw = lookup(cfg, key).ok_or(ConfigError::MissingKey(key))?;
    let value = parse_u32(&raw, key)?;
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            key,
            value: raw,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}
