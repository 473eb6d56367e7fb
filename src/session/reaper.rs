// src/session/reaper.rs

//! Handle teardown. Failures are reported to the caller and logged, never
//! escalated: one stuck free must not keep the rest from being released.

use log::Level;

use crate::rm::{FreeRequest, Operation, RmError, RmTransport};
use crate::rop_log;
use crate::session::handles::{HandleId, HandleTable};

/// Free one handle.
///
/// The record is marked released before the request goes out, so a handle
/// is never sent to the driver twice even if this call fails. Returns
/// `Ok(false)` when the handle had already been released.
pub fn free_handle<T: RmTransport>(
    ctl: &mut T,
    handles: &mut HandleTable,
    client: HandleId,
    target: HandleId,
) -> Result<bool, RmError> {
    if !handles.release(target) {
        return Ok(false);
    }
    if let Some(child) = handles.live_children(target).next() {
        rop_log!(
            Level::Warn,
            "reap",
            "freeing 0x{:x} while child 0x{:x} is still live",
            handles.raw(target),
            handles.raw(child)
        );
    }

    let request = FreeRequest {
        root: handles.raw(client),
        parent: handles.parent_raw(target),
        object: handles.raw(target),
    };
    let reply = ctl.free(&request).map_err(|source| RmError::Transport {
        op: Operation::Free,
        unit: handles.get(target).unit,
        handle: request.object,
        source,
    })?;
    reply
        .into_result()
        .map_err(|status| RmError::FreeFailed { handle: request.object, status })?;

    rop_log!(Level::Debug, "reap", "freed {} handle 0x{:x}", handles.get(target).kind, request.object);
    Ok(true)
}

/// Free every live handle of `unit`, newest first. Returns how many free
/// requests failed; each failure has already been logged.
pub fn reap_unit<T: RmTransport>(
    ctl: &mut T,
    handles: &mut HandleTable,
    client: HandleId,
    unit: u32,
) -> usize {
    let mut failures = 0;
    for id in handles.live_for_unit_newest_first(unit) {
        if !reap_one(ctl, handles, client, id) {
            failures += 1;
        }
    }
    failures
}

/// Free `target`, logging instead of returning the error. `true` on success.
pub fn reap_one<T: RmTransport>(
    ctl: &mut T,
    handles: &mut HandleTable,
    client: HandleId,
    target: HandleId,
) -> bool {
    match free_handle(ctl, handles, client, target) {
        Ok(_) => true,
        Err(e) => {
            rop_log!(Level::Error, "reap", "{}", e);
            false
        }
    }
}
