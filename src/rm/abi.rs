// src/rm/abi.rs

//! # RM ioctl ABI
//!
//! Request layouts and identifiers understood by the NVIDIA kernel module.
//! These are wire contracts: field order, explicit padding and sizes must
//! match the driver's C definitions bit for bit. Layout is pinned by the
//! tests at the bottom of this file.

use bytemuck::{Pod, Zeroable};

/// Server-assigned object handle (`NvHandle`).
pub type RawHandle = u32;

// ───── ioctl escapes ────────────────────────────────────────────────────────

pub const NV_IOCTL_MAGIC: u8 = b'F';
pub const NV_IOCTL_BASE: u8 = 200;
pub const NV_ESC_REGISTER_FD: u8 = NV_IOCTL_BASE + 1;
pub const NV_ESC_RM_CONTROL: u8 = 0x2A;
pub const NV_ESC_RM_ALLOC: u8 = 0x2B;
pub const NV_ESC_RM_FREE: u8 = 0x2C;

// ───── object classes & control commands ───────────────────────────────────

pub const NV01_ROOT: u32 = 0x0;
pub const NV01_DEVICE_0: u32 = 0x80;
pub const NV20_SUBDEVICE_0: u32 = 0x2080;

pub const NV2080_CTRL_CMD_GR_GET_ROP_INFO: u32 = 0x2080_1213;

// Linux `_IOC` encoding (asm-generic: x86_64, aarch64, riscv64).
const IOC_NRBITS: u32 = 8;
const IOC_TYPEBITS: u32 = 8;
const IOC_SIZEBITS: u32 = 14;
const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: u32 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u32 = IOC_SIZESHIFT + IOC_SIZEBITS;
const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

/// `_IOC(_IOC_READ|_IOC_WRITE, 'F', nr, size)`.
pub const fn nv_ioctl_rw(nr: u8, size: usize) -> u32 {
    ((IOC_READ | IOC_WRITE) << IOC_DIRSHIFT)
        | ((NV_IOCTL_MAGIC as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)
        | ((size as u32) << IOC_SIZESHIFT)
}

// ───── request envelopes ────────────────────────────────────────────────────

/// `NVOS21_PARAMETERS`: allocation without a rights mask.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Nvos21Parameters {
    pub h_root: RawHandle,
    pub h_object_parent: RawHandle,
    pub h_object_new: RawHandle,
    pub h_class: u32,
    pub p_alloc_parms: u64,
    pub params_size: u32,
    pub status: u32,
}

/// `NVOS64_PARAMETERS`: allocation with an optional rights mask.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Nvos64Parameters {
    pub h_root: RawHandle,
    pub h_object_parent: RawHandle,
    pub h_object_new: RawHandle,
    pub h_class: u32,
    pub p_alloc_parms: u64,
    pub p_rights_requested: u64,
    pub params_size: u32,
    pub flags: u32,
    pub status: u32,
    pub _pad: u32,
}

/// `NVOS54_PARAMETERS`: control call against an object.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Nvos54Parameters {
    pub h_client: RawHandle,
    pub h_object: RawHandle,
    pub cmd: u32,
    pub flags: u32,
    pub params: u64,
    pub params_size: u32,
    pub status: u32,
}

/// `NVOS00_PARAMETERS`: free an object.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Nvos00Parameters {
    pub h_root: RawHandle,
    pub h_object_parent: RawHandle,
    pub h_object_old: RawHandle,
    pub status: u32,
}

// ───── class-specific payloads ──────────────────────────────────────────────

/// `NV0080_ALLOC_PARAMETERS`; `device_id` selects the physical GPU.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Nv0080AllocParameters {
    pub device_id: u32,
    pub h_client_share: RawHandle,
    pub h_target_client: RawHandle,
    pub h_target_device: RawHandle,
    pub flags: u32,
    pub _pad0: u32,
    pub va_space_size: u64,
    pub va_start_internal: u64,
    pub va_limit_internal: u64,
    pub va_mode: u32,
    pub _pad1: u32,
}

/// `NV2080_ALLOC_PARAMETERS`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Nv2080AllocParameters {
    pub sub_device_id: u32,
}

/// `NV2080_CTRL_GR_GET_ROP_INFO_PARAMS`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct GrGetRopInfoParams {
    pub rop_unit_count: u32,
    pub rop_operations_factor: u32,
    pub rop_operations_count: u32,
}

pub const NV_ESC_RM_ALLOC_SHORT: u32 = nv_ioctl_rw(NV_ESC_RM_ALLOC, size_of::<Nvos21Parameters>());
pub const NV_ESC_RM_ALLOC_RIGHTS: u32 =
    nv_ioctl_rw(NV_ESC_RM_ALLOC, size_of::<Nvos64Parameters>());
pub const NV_ESC_RM_CONTROL_REQ: u32 =
    nv_ioctl_rw(NV_ESC_RM_CONTROL, size_of::<Nvos54Parameters>());
pub const NV_ESC_RM_FREE_REQ: u32 = nv_ioctl_rw(NV_ESC_RM_FREE, size_of::<Nvos00Parameters>());
pub const NV_ESC_REGISTER_FD_REQ: u32 = nv_ioctl_rw(NV_ESC_REGISTER_FD, size_of::<i32>());
