// src/config/model.rs

use log::LevelFilter;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::rm::nvctl::{DEFAULT_CONTROL_PATH, DEFAULT_UNIT_PREFIX, DevicePaths};

/// Top-level runtime config; every table is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)] pub logging:     LoggingConfig,
    #[serde(default)] pub driver:      DriverConfig,
    #[serde(default)] pub enumeration: EnumerationConfig,
    #[serde(default)] pub names:       NamesConfig,
}

/// Mirror of the `[logging]` table
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]                   pub enable: bool,
    #[serde(default)]                   pub file:   Option<String>,
    #[serde(default = "default_level")] pub level:  String,
}
fn default_level() -> String { "INFO".into() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { enable: false, file: None, level: default_level() }
    }
}

impl LoggingConfig {
    /// Unknown names fall back to INFO.
    pub fn level_filter(&self) -> LevelFilter {
        parse_level(&self.level).unwrap_or(LevelFilter::Info)
    }
}

/// Strict level parser used for CLI overrides.
pub fn parse_level(s: &str) -> Result<LevelFilter, ConfigError> {
    match s.to_uppercase().as_str() {
        "OFF"   => Ok(LevelFilter::Off),
        "ERROR" => Ok(LevelFilter::Error),
        "WARN"  => Ok(LevelFilter::Warn),
        "INFO"  => Ok(LevelFilter::Info),
        "DEBUG" => Ok(LevelFilter::Debug),
        "TRACE" => Ok(LevelFilter::Trace),
        _       => Err(ConfigError::InvalidLevel(s.into())),
    }
}

/// Mirror of the `[driver]` table
#[derive(Debug, Deserialize)]
pub struct DriverConfig {
    #[serde(default = "default_control_path")] pub control_path:     PathBuf,
    #[serde(default = "default_unit_prefix")]  pub unit_path_prefix: String,
}
fn default_control_path() -> PathBuf { DEFAULT_CONTROL_PATH.into() }
fn default_unit_prefix() -> String { DEFAULT_UNIT_PREFIX.into() }

impl Default for DriverConfig {
    fn default() -> Self {
        Self { control_path: default_control_path(), unit_path_prefix: default_unit_prefix() }
    }
}

impl From<&DriverConfig> for DevicePaths {
    fn from(cfg: &DriverConfig) -> Self {
        DevicePaths { control: cfg.control_path.clone(), unit_prefix: cfg.unit_path_prefix.clone() }
    }
}

/// How many units a session probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Breadth {
    /// Unit 0 only.
    First,
    /// Until a unit node is missing.
    #[default]
    All,
}

/// Mirror of the `[enumeration]` table
#[derive(Debug, Default, Deserialize)]
pub struct EnumerationConfig {
    #[serde(default)] pub breadth: Breadth,
}

/// Mirror of the `[names]` table
#[derive(Debug, Deserialize)]
pub struct NamesConfig {
    #[serde(default = "default_true")]        pub enable:      bool,
    #[serde(default = "default_library")]     pub library:     String,
    #[serde(default = "default_placeholder")] pub placeholder: String,
}
fn default_true() -> bool { true }
fn default_library() -> String { "libnvidia-ml.so.1".into() }
fn default_placeholder() -> String { "Unknown".into() }

impl Default for NamesConfig {
    fn default() -> Self {
        Self { enable: true, library: default_library(), placeholder: default_placeholder() }
    }
}

/// All the ways config loading can go wrong
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid log level '{0}'")]
    InvalidLevel(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
