/// Logs a record tagged with a session component as its target.
/// Usage:
/// ```rust
/// use log::Level;
/// ropinfo::rop_log!(Level::Debug, "alloc", "device handle 0x{:x}", 0x5c00_0001u32);
/// ropinfo::rop_log!(Level::Warn, "reap", "free skipped");
/// ```
/// With the `fern` format set up in `main.rs` this renders as:
/// [2026-10-18T16:32:10+02:00][DEBUG][alloc][pid=4568] device handle 0x5c000001
#[macro_export]
macro_rules! rop_log {
    ($level:expr, $component:expr, $fmt:expr $(, $($arg:tt)+)?) => {
        $crate::__log::log!(target: $component, $level, $fmt $(, $($arg)+)?)
    };
}
