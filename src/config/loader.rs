// src/config/loader.rs

//! # Configuration Loader
//!
//! Reads an optional TOML file and deserializes it into `Config`. Without a
//! file every setting takes its built-in default.

use crate::config::model::{Config, ConfigError};
use crate::rop_log;
use log::Level;
use std::{fs, path::Path};

/// Load the configuration from `path`, or defaults when `path` is `None`.
/// A named file that is missing or malformed is an error.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    rop_log!(Level::Debug, "config", "Reading config from {:?}", path);
    let txt = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&txt)?;
    rop_log!(Level::Info, "config", "Loaded config from {:?}", path);
    Ok(cfg)
}
