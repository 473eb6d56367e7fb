// src/cli.rs

//! Command-line surface. Flags override the matching config keys.

use clap::Parser;
use std::path::PathBuf;

use crate::config::model::{parse_level, Breadth, Config, ConfigError};

#[derive(Debug, Parser)]
#[command(name = "ropinfo", version, about = "Query ROP information from NVIDIA GPUs via the RM ioctl interface")]
pub struct Cli {
    /// TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Probe unit 0 only.
    #[arg(long)]
    pub first_only: bool,

    /// Skip the NVML name lookup.
    #[arg(long)]
    pub no_names: bool,

    /// Override `[logging].level` (off, error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Fold the flags into `cfg`. A bad `--log-level` is rejected here
    /// rather than silently falling back like the config file does.
    pub fn apply(&self, cfg: &mut Config) -> Result<(), ConfigError> {
        if self.first_only {
            cfg.enumeration.breadth = Breadth::First;
        }
        if self.no_names {
            cfg.names.enable = false;
        }
        if let Some(level) = &self.log_level {
            parse_level(level)?;
            cfg.logging.level = level.clone();
        }
        Ok(())
    }
}
