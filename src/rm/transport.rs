// src/rm/transport.rs

//! Request surface of the RM control channel.
//!
//! Session components never touch file descriptors or raw ioctl envelopes;
//! they build one of the typed requests below and hand it to an
//! [`RmTransport`]. The Linux implementation lives in [`super::nvctl`];
//! tests drive the session through a scripted fake.

use std::{io, path::PathBuf};

use crate::rm::abi::{Nv0080AllocParameters, Nv2080AllocParameters, RawHandle};
use crate::rm::error::RmError;
use crate::rm::status::RoundTrip;

/// Class-specific allocation payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocParams {
    /// Root client: no payload, short request layout.
    None,
    Device(Nv0080AllocParameters),
    Subdevice(Nv2080AllocParameters),
}

impl AllocParams {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            AllocParams::None => &[],
            AllocParams::Device(p) => bytemuck::bytes_of(p),
            AllocParams::Subdevice(p) => bytemuck::bytes_of(p),
        }
    }

    /// Value for the `paramsSize` field.
    pub fn size(&self) -> u32 {
        self.as_bytes().len() as u32
    }
}

/// Create-object request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocRequest {
    pub root: RawHandle,
    pub parent: RawHandle,
    /// Zero asks the driver to pick the handle.
    pub requested: RawHandle,
    pub class: u32,
    pub params: AllocParams,
}

/// Free-object request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeRequest {
    pub root: RawHandle,
    pub parent: RawHandle,
    pub object: RawHandle,
}

/// Control request; `params` is both input and output.
#[derive(Debug, PartialEq, Eq)]
pub struct ControlRequest<'a> {
    pub client: RawHandle,
    pub object: RawHandle,
    pub cmd: u32,
    pub params: &'a mut [u8],
}

/// An open control channel.
///
/// All methods take `&mut self`: the channel is session-owned and lent to
/// one component at a time for a single round trip.
pub trait RmTransport {
    /// Per-unit device channel. Dropping it closes the unit descriptor.
    type Unit;

    /// Path of unit `index`, for diagnostics.
    fn unit_path(&self, index: u32) -> PathBuf;

    /// Open the unit's device node read/write.
    fn open_unit(&mut self, index: u32) -> io::Result<Self::Unit>;

    /// Bind `unit` to this control channel.
    fn register_fd(&mut self, unit: &Self::Unit) -> RoundTrip<()>;

    /// On success the reply value is the handle the driver assigned.
    fn alloc(&mut self, request: &AllocRequest) -> RoundTrip<RawHandle>;

    fn free(&mut self, request: &FreeRequest) -> RoundTrip<()>;

    fn control(&mut self, request: &mut ControlRequest<'_>) -> RoundTrip<()>;
}

/// Opens control channels. Exactly one `open_control` per session.
pub trait RmDriver {
    type Channel: RmTransport;

    fn open_control(&self) -> Result<Self::Channel, RmError>;
}
