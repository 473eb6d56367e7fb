// src/session/allocator.rs

//! Handle allocation: client → device → subdevice.
//!
//! Each function takes its parent as a [`HandleId`], so only handles whose
//! own allocation succeeded can be used as parents. New handles enter the
//! table only after both the transport and the RM status report success.

use log::Level;

use crate::rm::abi::{
    NV01_DEVICE_0, NV01_ROOT, NV20_SUBDEVICE_0, Nv0080AllocParameters, Nv2080AllocParameters,
    RawHandle,
};
use crate::rm::{AllocParams, AllocRequest, ObjectKind, Operation, RmError, RmTransport};
use crate::rop_log;
use crate::session::handles::{HandleId, HandleTable};

/// The only subdevice the session ever asks for.
pub const PRIMARY_SUBDEVICE: u32 = 0;

/// Round-trip one allocation and map both failure levels.
fn issue<T: RmTransport>(
    ctl: &mut T,
    kind: ObjectKind,
    unit: Option<u32>,
    request: &AllocRequest,
) -> Result<RawHandle, RmError> {
    let reply = ctl.alloc(request).map_err(|source| RmError::Transport {
        op: Operation::Alloc(kind),
        unit,
        handle: request.parent,
        source,
    })?;
    let handle = reply.into_result().map_err(|status| RmError::AllocationRejected {
        kind,
        unit,
        parent: request.parent,
        status,
    })?;
    rop_log!(Level::Debug, "alloc", "{} handle 0x{:x} (parent 0x{:x})", kind, handle, request.parent);
    Ok(handle)
}

/// Allocate the session's root client. Call once per session.
pub fn allocate_client<T: RmTransport>(
    ctl: &mut T,
    handles: &mut HandleTable,
) -> Result<HandleId, RmError> {
    let request = AllocRequest {
        root: 0,
        parent: 0,
        requested: 0,
        class: NV01_ROOT,
        params: AllocParams::None,
    };
    let raw = issue(ctl, ObjectKind::Client, None, &request)?;
    Ok(handles.insert(ObjectKind::Client, raw, None, None))
}

/// Allocate a device object bound to physical unit `unit`.
pub fn allocate_device<T: RmTransport>(
    ctl: &mut T,
    handles: &mut HandleTable,
    client: HandleId,
    unit: u32,
) -> Result<HandleId, RmError> {
    let client_raw = handles.raw(client);
    let params = Nv0080AllocParameters { device_id: unit, ..Default::default() };
    let request = AllocRequest {
        root: client_raw,
        parent: client_raw,
        requested: 0,
        class: NV01_DEVICE_0,
        params: AllocParams::Device(params),
    };
    let raw = issue(ctl, ObjectKind::Device, Some(unit), &request)?;
    Ok(handles.insert(ObjectKind::Device, raw, Some(client), Some(unit)))
}

/// Allocate the primary subdevice under `device`.
pub fn allocate_subdevice<T: RmTransport>(
    ctl: &mut T,
    handles: &mut HandleTable,
    client: HandleId,
    device: HandleId,
    unit: u32,
) -> Result<HandleId, RmError> {
    let params = Nv2080AllocParameters { sub_device_id: PRIMARY_SUBDEVICE };
    let request = AllocRequest {
        root: handles.raw(client),
        parent: handles.raw(device),
        requested: 0,
        class: NV20_SUBDEVICE_0,
        params: AllocParams::Subdevice(params),
    };
    let raw = issue(ctl, ObjectKind::Subdevice, Some(unit), &request)?;
    Ok(handles.insert(ObjectKind::Subdevice, raw, Some(device), Some(unit)))
}
