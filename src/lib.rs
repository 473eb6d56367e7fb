// src/lib.rs
// ────────────────────────────────────────────────────────────────────────────
// Public library entry point.  Re-export everything for both `main.rs` and
// integration tests.

#[doc(hidden)]
pub use log as __log;

mod macros;

pub mod cli;
pub mod config;
pub mod names;
pub mod report;
pub mod rm;
pub mod session;
