// src/rm/nvctl.rs

//! Linux transport: `/dev/nvidiactl` + `/dev/nvidia<N>` via `ioctl(2)`.
//!
//! Both channel types own a `File`, so closing is tied to `Drop` and a
//! descriptor cannot outlive the scope that opened it.

use std::{
    fs::{File, OpenOptions},
    io,
    os::fd::{AsRawFd, RawFd},
    os::unix::fs::OpenOptionsExt,
    path::PathBuf,
};

use bytemuck::{Pod, Zeroable};

use crate::rm::abi::{
    NV_ESC_REGISTER_FD_REQ, NV_ESC_RM_ALLOC_RIGHTS, NV_ESC_RM_ALLOC_SHORT, NV_ESC_RM_CONTROL_REQ,
    NV_ESC_RM_FREE_REQ, Nvos00Parameters, Nvos21Parameters, Nvos54Parameters, Nvos64Parameters,
    RawHandle,
};
use crate::rm::error::RmError;
use crate::rm::status::{Reply, RmStatus, RoundTrip};
use crate::rm::transport::{
    AllocParams, AllocRequest, ControlRequest, FreeRequest, RmDriver, RmTransport,
};

pub const DEFAULT_CONTROL_PATH: &str = "/dev/nvidiactl";
pub const DEFAULT_UNIT_PREFIX: &str = "/dev/nvidia";

/// Where the device nodes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePaths {
    pub control: PathBuf,
    pub unit_prefix: String,
}

impl DevicePaths {
    /// `<prefix><index>`, e.g. `/dev/nvidia0`.
    pub fn unit(&self, index: u32) -> PathBuf {
        PathBuf::from(format!("{}{}", self.unit_prefix, index))
    }
}

impl Default for DevicePaths {
    fn default() -> Self {
        Self {
            control: PathBuf::from(DEFAULT_CONTROL_PATH),
            unit_prefix: DEFAULT_UNIT_PREFIX.to_owned(),
        }
    }
}

/// Opens the real control device.
#[derive(Debug, Clone, Default)]
pub struct NvDriver {
    pub paths: DevicePaths,
}

impl NvDriver {
    pub fn new(paths: DevicePaths) -> Self {
        Self { paths }
    }
}

impl RmDriver for NvDriver {
    type Channel = NvControl;

    fn open_control(&self) -> Result<NvControl, RmError> {
        NvControl::open(self.paths.clone())
    }
}

/// Open `/dev/nvidiactl`.
#[derive(Debug)]
pub struct NvControl {
    file: File,
    paths: DevicePaths,
}

/// Open `/dev/nvidia<N>`; closed on drop.
#[derive(Debug)]
pub struct NvUnit {
    file: File,
    index: u32,
}

impl NvControl {
    pub fn open(paths: DevicePaths) -> Result<Self, RmError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&paths.control)
            .map_err(|source| RmError::ChannelUnavailable {
                path: paths.control.clone(),
                source,
            })?;
        log::debug!("opened control channel {} (fd {})", paths.control.display(), file.as_raw_fd());
        Ok(Self { file, paths })
    }

    fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

/// Issue one read/write ioctl with `arg` as the in/out envelope.
fn ioctl_rw<T: Pod>(fd: RawFd, request: u32, arg: &mut T) -> io::Result<()> {
    // SAFETY: `arg` is a live, exclusively borrowed `repr(C)` value whose size
    // is encoded in `request`; the driver reads and writes only that region
    // plus any buffers the envelope points to, which the caller keeps alive.
    let rc = unsafe { libc::ioctl(fd, request as _, arg as *mut T as *mut libc::c_void) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

impl RmTransport for NvControl {
    type Unit = NvUnit;

    fn unit_path(&self, index: u32) -> PathBuf {
        self.paths.unit(index)
    }

    fn open_unit(&mut self, index: u32) -> io::Result<NvUnit> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_CLOEXEC)
            .open(self.paths.unit(index))?;
        Ok(NvUnit { file, index })
    }

    fn register_fd(&mut self, unit: &NvUnit) -> RoundTrip<()> {
        let mut ctl_fd: i32 = self.fd();
        log::debug!(
            "binding GPU {} (fd {}) to control fd {}",
            unit.index,
            unit.file.as_raw_fd(),
            ctl_fd
        );
        ioctl_rw(unit.file.as_raw_fd(), NV_ESC_REGISTER_FD_REQ, &mut ctl_fd)?;
        Ok(Reply::ok(()))
    }

    fn alloc(&mut self, request: &AllocRequest) -> RoundTrip<RawHandle> {
        if matches!(request.params, AllocParams::None) {
            let mut env = Nvos21Parameters {
                h_root: request.root,
                h_object_parent: request.parent,
                h_object_new: request.requested,
                h_class: request.class,
                ..Zeroable::zeroed()
            };
            ioctl_rw(self.fd(), NV_ESC_RM_ALLOC_SHORT, &mut env)?;
            return Ok(Reply::new(RmStatus(env.status), env.h_object_new));
        }

        // Local copy: the driver may write back into the payload.
        let mut payload = request.params;
        let params_size = payload.size();
        let params_ptr = match &mut payload {
            AllocParams::None => 0,
            AllocParams::Device(p) => p as *mut _ as u64,
            AllocParams::Subdevice(p) => p as *mut _ as u64,
        };

        let mut env = Nvos64Parameters {
            h_root: request.root,
            h_object_parent: request.parent,
            h_object_new: request.requested,
            h_class: request.class,
            p_alloc_parms: params_ptr,
            p_rights_requested: 0,
            params_size,
            ..Zeroable::zeroed()
        };
        ioctl_rw(self.fd(), NV_ESC_RM_ALLOC_RIGHTS, &mut env)?;
        Ok(Reply::new(RmStatus(env.status), env.h_object_new))
    }

    fn free(&mut self, request: &FreeRequest) -> RoundTrip<()> {
        let mut env = Nvos00Parameters {
            h_root: request.root,
            h_object_parent: request.parent,
            h_object_old: request.object,
            status: 0,
        };
        ioctl_rw(self.fd(), NV_ESC_RM_FREE_REQ, &mut env)?;
        Ok(Reply::new(RmStatus(env.status), ()))
    }

    fn control(&mut self, request: &mut ControlRequest<'_>) -> RoundTrip<()> {
        let mut env = Nvos54Parameters {
            h_client: request.client,
            h_object: request.object,
            cmd: request.cmd,
            flags: 0,
            params: request.params.as_mut_ptr() as u64,
            params_size: request.params.len() as u32,
            status: 0,
        };
        ioctl_rw(self.fd(), NV_ESC_RM_CONTROL_REQ, &mut env)?;
        Ok(Reply::new(RmStatus(env.status), ()))
    }
}
