// src/session/registrar.rs

//! Device channel registration.

use std::io::ErrorKind;

use log::Level;

use crate::rm::{Operation, RegistrationFault, RmError, RmTransport};
use crate::rop_log;

/// Open unit `index` and bind it to the control channel.
///
/// `UnitNotFound` means the node does not exist (end of enumeration);
/// every other open failure is `UnitUnavailable`. If the bind fails the
/// unit channel is dropped, and so closed, before the error is returned.
pub fn register_unit<T: RmTransport>(ctl: &mut T, index: u32) -> Result<T::Unit, RmError> {
    let path = ctl.unit_path(index);

    let unit = match ctl.open_unit(index) {
        Ok(unit) => unit,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            rop_log!(Level::Debug, "register", "{} not present", path.display());
            return Err(RmError::UnitNotFound { unit: index, path });
        }
        Err(source) => return Err(RmError::UnitUnavailable { unit: index, path, source }),
    };

    let cause = match ctl.register_fd(&unit) {
        Ok(reply) if reply.status.is_ok() => {
            rop_log!(Level::Debug, "register", "GPU {}: {} registered", index, path.display());
            return Ok(unit);
        }
        Ok(reply) => RegistrationFault::Rejected(reply.status),
        Err(source) => RegistrationFault::Transport { op: Operation::RegisterFd, source },
    };

    drop(unit);
    Err(RmError::RegistrationFailed { unit: index, path, cause })
}
