// src/report.rs

//! Console rendering of a `SessionReport`.
//!
//! Human output keeps the long-standing `ROP ...:` line format so existing
//! scrapers keep working. Diagnostics never go here; they go through `log`.

use serde::Serialize;
use std::fmt::Write;

use crate::session::{RopInfo, SessionReport, Termination, UnitOutcome};

/// Render the human-readable report.
pub fn render_text(report: &SessionReport) -> String {
    let mut out = String::new();

    for unit in report.units.iter().filter(|u| u.registered()) {
        let _ = writeln!(out, "--- Processing GPU {} {} ---", unit.index, unit.path.display());
        match &unit.outcome {
            UnitOutcome::Processed(info) => {
                if let Some(name) = &info.name {
                    let _ = writeln!(out, "Name: {name}");
                }
                let _ = writeln!(out, "ROP unit count: {}", info.rop.unit_count);
                let _ = writeln!(out, "ROP operations factor: {}", info.rop.operations_factor);
                let _ = writeln!(out, "ROP operations count: {}", info.rop.operations_count);
            }
            // The failure itself was already logged.
            UnitOutcome::Failed(_) | UnitOutcome::Unregistered(_) => {}
        }
    }

    match &report.termination {
        Termination::Exhausted { unit: 0, path } => {
            let _ = writeln!(out, "No NVIDIA devices found ({} missing).", path.display());
        }
        // Not a finished enumeration; no device count.
        Termination::Halted { unit, path } => {
            let _ = writeln!(out, "Enumeration stopped at GPU {} ({}).", unit, path.display());
        }
        Termination::Aborted => {}
        Termination::Exhausted { .. } | Termination::Limit => {
            let _ = writeln!(out, "Found {} NVIDIA device(s).", report.registered());
        }
    }
    out
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    timestamp: String,
    exit_code: u8,
    termination: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    free_failures: usize,
    units: Vec<JsonUnit<'a>>,
}

#[derive(Debug, Serialize)]
struct JsonUnit<'a> {
    index: u32,
    path: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rop: Option<RopInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn termination_label(t: &Termination) -> &'static str {
    match t {
        Termination::Exhausted { .. } => "exhausted",
        Termination::Limit => "limit",
        Termination::Halted { .. } => "halted",
        Termination::Aborted => "aborted",
    }
}

/// Render the report as one pretty-printed JSON document.
pub fn render_json(report: &SessionReport) -> serde_json::Result<String> {
    let units = report
        .units
        .iter()
        .map(|u| {
            let (status, name, rop, error) = match &u.outcome {
                UnitOutcome::Processed(info) => ("ok", info.name.as_deref(), Some(info.rop), None),
                UnitOutcome::Failed(e) => ("failed", None, None, Some(e.to_string())),
                UnitOutcome::Unregistered(e) => ("unregistered", None, None, Some(e.to_string())),
            };
            JsonUnit { index: u.index, path: u.path.display().to_string(), status, name, rop, error }
        })
        .collect();

    let doc = JsonReport {
        timestamp: chrono::Local::now().to_rfc3339(),
        exit_code: report.exit_code(),
        termination: termination_label(&report.termination),
        error: report.fatal.as_ref().map(ToString::to_string),
        free_failures: report.free_failures,
        units,
    };
    serde_json::to_string_pretty(&doc)
}
