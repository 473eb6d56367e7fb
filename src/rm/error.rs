// src/rm/error.rs

use std::{io, path::PathBuf};
use thiserror::Error;

use crate::rm::abi::RawHandle;
use crate::rm::status::RmStatus;

/// Which RM object an allocation targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Client,
    Device,
    Subdevice,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Client => "client",
            ObjectKind::Device => "device",
            ObjectKind::Subdevice => "subdevice",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request kind, used to label transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    RegisterFd,
    Alloc(ObjectKind),
    Control(u32),
    Free,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::RegisterFd => f.write_str("NV_ESC_REGISTER_FD"),
            Operation::Alloc(kind) => write!(f, "NV_ESC_RM_ALLOC ({kind})"),
            Operation::Control(cmd) => write!(f, "NV_ESC_RM_CONTROL (cmd 0x{cmd:08x})"),
            Operation::Free => f.write_str("NV_ESC_RM_FREE"),
        }
    }
}

/// Why a unit could not be bound to the control channel.
#[derive(Debug, Error)]
pub enum RegistrationFault {
    #[error("ioctl {op} failed: {source}")]
    Transport {
        op: Operation,
        #[source]
        source: io::Error,
    },

    #[error("RM status: {0}")]
    Rejected(RmStatus),
}

/// Everything that can go wrong while talking to the RM.
#[derive(Debug, Error)]
pub enum RmError {
    #[error("cannot open control channel {}: {source}", .path.display())]
    ChannelUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} missing", .path.display())]
    UnitNotFound { unit: u32, path: PathBuf },

    #[error("cannot open {}: {source}", .path.display())]
    UnitUnavailable {
        unit: u32,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("registering {} with the control channel failed: {cause}", .path.display())]
    RegistrationFailed {
        unit: u32,
        path: PathBuf,
        #[source]
        cause: RegistrationFault,
    },

    #[error("failed to allocate {kind} (parent handle 0x{parent:x}), RM status: {status}")]
    AllocationRejected {
        kind: ObjectKind,
        unit: Option<u32>,
        parent: RawHandle,
        status: RmStatus,
    },

    #[error("ioctl {op} failed (handle 0x{handle:x}): {source}")]
    Transport {
        op: Operation,
        unit: Option<u32>,
        handle: RawHandle,
        #[source]
        source: io::Error,
    },

    #[error("query 0x{cmd:08x} failed (subdevice handle 0x{handle:x}), RM status: {status}")]
    QueryFailed {
        cmd: u32,
        handle: RawHandle,
        status: RmStatus,
    },

    #[error("failed to free handle 0x{handle:x}, RM status: {status}")]
    FreeFailed { handle: RawHandle, status: RmStatus },
}

impl RmError {
    /// Enumeration terminator, not a failure.
    pub fn is_unit_not_found(&self) -> bool {
        matches!(self, RmError::UnitNotFound { .. })
    }

}
