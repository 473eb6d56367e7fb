// src/session/mod.rs

//! Resource session: one control channel, one client, N units.
//!
//! 1. Open the control channel
//! 2. Allocate the root client
//! 3. For each unit: register → device → (name) → subdevice → ROP query →
//!    reap unit handles newest first → close the unit channel
//! 4. Free the client, close the control channel
//!
//! Steps 1–2 failing abort the run. A unit failing after registration only
//! costs that unit. A unit that cannot be registered for any reason other
//! than a missing node stops enumeration, so permission or driver problems
//! are not mistaken for "no more devices".

pub mod allocator;
pub mod handles;
pub mod query;
pub mod reaper;
pub mod registrar;

use std::path::PathBuf;

use log::Level;

use crate::config::{Breadth, Config};
use crate::names::NameLookup;
use crate::rm::{RmDriver, RmError, RmTransport};
use crate::rop_log;

pub use handles::{HandleId, HandleTable};
pub use query::RopInfo;

/// Knobs that vary between the single-unit, multi-unit and named variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub breadth: Breadth,
    /// Shown when the name lookup misses.
    pub placeholder: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { breadth: Breadth::All, placeholder: "Unknown".into() }
    }
}

impl From<&Config> for SessionConfig {
    fn from(cfg: &Config) -> Self {
        Self { breadth: cfg.enumeration.breadth, placeholder: cfg.names.placeholder.clone() }
    }
}

/// What one unit produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitInfo {
    /// `None` when name lookup is disabled.
    pub name: Option<String>,
    pub rop: RopInfo,
}

#[derive(Debug)]
pub enum UnitOutcome {
    Processed(UnitInfo),
    /// Registered, then an allocation or the query failed.
    Failed(RmError),
    /// Open or registration failed. Enumeration stopped at this unit.
    Unregistered(RmError),
}

#[derive(Debug)]
pub struct UnitReport {
    pub index: u32,
    pub path: PathBuf,
    pub outcome: UnitOutcome,
}

impl UnitReport {
    pub fn registered(&self) -> bool {
        !matches!(self.outcome, UnitOutcome::Unregistered(_))
    }
}

/// Why enumeration ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The node for unit `unit` does not exist.
    Exhausted { unit: u32, path: PathBuf },
    /// The configured breadth was reached.
    Limit,
    /// Unit `unit` exists but could not be opened or registered.
    Halted { unit: u32, path: PathBuf },
    /// Control channel or client allocation failed; nothing was probed.
    Aborted,
}

#[derive(Debug)]
pub struct SessionReport {
    /// Session-scope failure (control channel, client allocation).
    pub fatal: Option<RmError>,
    pub units: Vec<UnitReport>,
    pub termination: Termination,
    /// Free requests that failed during teardown. Logged, never fatal.
    pub free_failures: usize,
}

impl SessionReport {
    fn aborted(e: RmError) -> Self {
        Self { fatal: Some(e), units: Vec::new(), termination: Termination::Aborted, free_failures: 0 }
    }

    /// Units whose registration succeeded.
    pub fn registered(&self) -> usize {
        self.units.iter().filter(|u| u.registered()).count()
    }

    pub fn processed(&self) -> usize {
        self.units.iter().filter(|u| matches!(u.outcome, UnitOutcome::Processed(_))).count()
    }

    /// At least one unit processed, and nothing failed.
    pub fn succeeded(&self) -> bool {
        self.fatal.is_none()
            && self.processed() > 0
            && self.units.iter().all(|u| matches!(u.outcome, UnitOutcome::Processed(_)))
    }

    pub fn exit_code(&self) -> u8 {
        if self.succeeded() { 0 } else { 1 }
    }
}

/// Run one session against `driver`.
///
/// `names` is scoped state owned by the caller (e.g. an initialised NVML
/// instance); `None` disables names entirely.
pub fn run<D: RmDriver>(
    driver: &D,
    names: Option<&mut dyn NameLookup>,
    cfg: &SessionConfig,
) -> SessionReport {
    let mut ctl = match driver.open_control() {
        Ok(ctl) => ctl,
        Err(e) => {
            rop_log!(Level::Error, "session", "{}", e);
            return SessionReport::aborted(e);
        }
    };

    let mut handles = HandleTable::new();
    let client = match allocator::allocate_client(&mut ctl, &mut handles) {
        Ok(client) => client,
        Err(e) => {
            rop_log!(Level::Error, "session", "{}", e);
            // The control channel closes as `ctl` drops.
            return SessionReport::aborted(e);
        }
    };
    rop_log!(Level::Info, "session", "client handle 0x{:x}", handles.raw(client));

    let mut session = Session { ctl, handles, client, names, cfg, free_failures: 0 };
    let (units, termination) = session.enumerate();
    let free_failures = session.finish();

    SessionReport { fatal: None, units, termination, free_failures }
}

struct Session<'n, 'c, T: RmTransport> {
    ctl: T,
    handles: HandleTable,
    client: HandleId,
    names: Option<&'n mut dyn NameLookup>,
    cfg: &'c SessionConfig,
    free_failures: usize,
}

impl<T: RmTransport> Session<'_, '_, T> {
    fn enumerate(&mut self) -> (Vec<UnitReport>, Termination) {
        let mut units = Vec::new();
        let mut index = 0u32;

        loop {
            let path = self.ctl.unit_path(index);

            let unit = match registrar::register_unit(&mut self.ctl, index) {
                Ok(unit) => unit,
                Err(e) if e.is_unit_not_found() => {
                    rop_log!(Level::Debug, "session", "enumeration done at GPU {}", index);
                    return (units, Termination::Exhausted { unit: index, path });
                }
                Err(e) => {
                    rop_log!(Level::Error, "session", "GPU {}: {}", index, e);
                    units.push(UnitReport { index, path: path.clone(), outcome: UnitOutcome::Unregistered(e) });
                    return (units, Termination::Halted { unit: index, path });
                }
            };

            rop_log!(Level::Info, "session", "processing GPU {} ({})", index, path.display());
            let outcome = match self.process_unit(index) {
                Ok(info) => UnitOutcome::Processed(info),
                Err(e) => {
                    rop_log!(Level::Error, "session", "GPU {}: {}", index, e);
                    UnitOutcome::Failed(e)
                }
            };
            self.free_failures += reaper::reap_unit(&mut self.ctl, &mut self.handles, self.client, index);
            // Unit channel closes only after its handles are gone.
            drop(unit);

            units.push(UnitReport { index, path, outcome });

            if self.cfg.breadth == Breadth::First {
                return (units, Termination::Limit);
            }
            index += 1;
        }
    }

    /// Allocate, query; the caller reaps whatever was created.
    fn process_unit(&mut self, index: u32) -> Result<UnitInfo, RmError> {
        let device = allocator::allocate_device(&mut self.ctl, &mut self.handles, self.client, index)?;

        let placeholder = &self.cfg.placeholder;
        let name = self
            .names
            .as_deref_mut()
            .map(|names| names.name(index).unwrap_or_else(|| placeholder.clone()));

        let subdevice =
            allocator::allocate_subdevice(&mut self.ctl, &mut self.handles, self.client, device, index)?;
        let rop = query::get_rop_info(&mut self.ctl, &self.handles, self.client, subdevice)?;

        Ok(UnitInfo { name, rop })
    }

    /// Free the client and close the control channel, in that order.
    fn finish(self) -> usize {
        let Session { mut ctl, mut handles, client, mut free_failures, .. } = self;
        if !reaper::reap_one(&mut ctl, &mut handles, client, client) {
            free_failures += 1;
        }
        drop(ctl);
        free_failures
    }
}
