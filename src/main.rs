// src/main.rs

//! Console entry-point.
//!
//! 1. Parse flags, load configuration & set up structured logging
//! 2. Load the optional name library
//! 3. Run one RM session over the control channel
//! 4. Print the report, exit 0 only if every unit was processed
//!
// ───── std / 3rd-party imports ──────────────────────────────────────────────
use anyhow::Context;
use chrono::Local;
use clap::Parser;
use fern::Dispatch;
use std::{process, process::ExitCode};

// ───── local imports ────────────────────────────────────────────────────────
use ropinfo::cli::Cli;
use ropinfo::config::{self, Config};
use ropinfo::names::{self, NameLookup};
use ropinfo::report;
use ropinfo::rm::{DevicePaths, NvDriver};
use ropinfo::session::{self, SessionConfig};

// ───── helpers ──────────────────────────────────────────────────────────────

/// Print an error with context and terminate the process.
macro_rules! fatal {
    ($ctx:expr, $($arg:tt)+) => {{
        eprintln!(
            "[{}][ERROR][{}] {}",
            chrono::Local::now().to_rfc3339(),
            $ctx,
            format!($($arg)+)
        );
        std::process::exit(1);
    }};
}

/// Resolve the config file and fold the CLI overrides into it.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut cfg = config::load(cli.config.as_deref())
        .with_context(|| format!("loading config {:?}", cli.config))?;
    cli.apply(&mut cfg).context("applying command-line overrides")?;
    Ok(cfg)
}

/// Configure global logging as requested in `cfg.logging`.
fn setup_logging(cfg: &Config) -> anyhow::Result<()> {
    let log_path = cfg
        .logging
        .enable
        .then(|| cfg.logging.file.as_deref().unwrap_or("ropinfo.log"));

    let mut dispatch = Dispatch::new()
        .format(|out, msg, record| {
            out.finish(format_args!(
                "[{}][{:5}][{}][pid={}] {}",
                Local::now().to_rfc3339(),
                record.level(),
                record.target(),
                process::id(),
                msg
            ))
        })
        .level(cfg.logging.level_filter())
        .chain(std::io::stderr());

    if let Some(path) = log_path {
        dispatch = dispatch.chain(fern::log_file(path).with_context(|| format!("opening log file {path}"))?);
    }

    dispatch.apply().context("installing logger")?;
    Ok(())
}

// ───── main ─────────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    let cli = Cli::parse();

    // 1 ─ Context
    let cfg = load_config(&cli).unwrap_or_else(|e| fatal!("config", "{:#}", e));
    setup_logging(&cfg).unwrap_or_else(|e| fatal!("logging", "{:#}", e));
    log::debug!("configuration: {:?}", cfg);

    // 2 ─ Names (NVML stays initialised until `names` drops)
    let mut names = names::open(&cfg.names);

    // 3 ─ Session
    let driver = NvDriver::new(DevicePaths::from(&cfg.driver));
    let lookup = names.as_mut().map(|n| &mut **n as &mut dyn NameLookup);
    let report = session::run(&driver, lookup, &SessionConfig::from(&cfg));
    drop(names);

    // 4 ─ Report
    if cli.json {
        match report::render_json(&report) {
            Ok(doc) => println!("{doc}"),
            Err(e) => fatal!("report", "{}", e),
        }
    } else {
        print!("{}", report::render_text(&report));
    }

    if report.free_failures > 0 {
        log::warn!("{} handle(s) could not be freed", report.free_failures);
    }
    ExitCode::from(report.exit_code())
}
