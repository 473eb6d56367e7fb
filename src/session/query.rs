// src/session/query.rs

//! Render-output-unit query against a subdevice.

use serde::Serialize;

use crate::rm::abi::{GrGetRopInfoParams, NV2080_CTRL_CMD_GR_GET_ROP_INFO};
use crate::rm::{ControlRequest, Operation, RmError, RmTransport};
use crate::session::handles::{HandleId, HandleTable};

/// ROP figures exactly as the driver reported them. The total is not
/// recomputed or checked against `unit_count * operations_factor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RopInfo {
    pub unit_count: u32,
    pub operations_factor: u32,
    pub operations_count: u32,
}

impl From<GrGetRopInfoParams> for RopInfo {
    fn from(p: GrGetRopInfoParams) -> Self {
        Self {
            unit_count: p.rop_unit_count,
            operations_factor: p.rop_operations_factor,
            operations_count: p.rop_operations_count,
        }
    }
}

pub fn get_rop_info<T: RmTransport>(
    ctl: &mut T,
    handles: &HandleTable,
    client: HandleId,
    subdevice: HandleId,
) -> Result<RopInfo, RmError> {
    let handle = handles.raw(subdevice);
    let cmd = NV2080_CTRL_CMD_GR_GET_ROP_INFO;
    let mut params = GrGetRopInfoParams::default();

    let mut request = ControlRequest {
        client: handles.raw(client),
        object: handle,
        cmd,
        params: bytemuck::bytes_of_mut(&mut params),
    };
    let reply = ctl.control(&mut request).map_err(|source| RmError::Transport {
        op: Operation::Control(cmd),
        unit: handles.get(subdevice).unit,
        handle,
        source,
    })?;
    reply.into_result().map_err(|status| RmError::QueryFailed { cmd, handle, status })?;

    Ok(params.into())
}
