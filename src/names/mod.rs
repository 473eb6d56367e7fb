//! Human-readable GPU names.
//!
//! The RM handle protocol has no cheap name query, so names come from a
//! side channel (NVML). The lookup is optional and best effort: a miss
//! turns into the configured placeholder and never fails a unit.

pub mod nvml;

use log::Level;

use crate::config::model::NamesConfig;
use crate::rop_log;

pub use nvml::Nvml;

/// Name source keyed by unit index.
pub trait NameLookup {
    fn name(&mut self, unit: u32) -> Option<String>;
}

/// Stand-in when the library could not be loaded; every lookup misses.
#[derive(Debug, Default)]
pub struct Unavailable;

impl NameLookup for Unavailable {
    fn name(&mut self, _unit: u32) -> Option<String> {
        None
    }
}

/// Build the configured lookup. `None` when names are disabled.
///
/// The returned value owns the library's init/shutdown; keep it alive for
/// the whole session and drop it afterwards.
pub fn open(cfg: &NamesConfig) -> Option<Box<dyn NameLookup>> {
    if !cfg.enable {
        return None;
    }
    match Nvml::load(&cfg.library) {
        Ok(nvml) => Some(Box::new(nvml)),
        Err(e) => {
            rop_log!(Level::Warn, "names", "{}; names will show as {:?}", e, cfg.placeholder);
            Some(Box::new(Unavailable))
        }
    }
}
