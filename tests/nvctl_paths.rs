//! Integration tests for the Linux transport's path handling.
//!
//! No NVIDIA driver is needed: temporary files and directories stand in for
//! the device nodes, and ordinary files reject every RM ioctl with ENOTTY.
//!
//! Key responsibilities:
//! - A missing control node is a session-scope failure.
//! - A missing unit node ends enumeration; any other open error does not.
//! - A node that opens but cannot be registered is closed and reported.

use std::{fs, path::Path};

use ropinfo::rm::{DevicePaths, NvControl, NvDriver, Operation, RegistrationFault, RmError};
use ropinfo::session::{self, registrar, SessionConfig, Termination};
use tempfile::{tempdir, NamedTempFile};

fn paths(control: &Path, dir: &Path) -> DevicePaths {
    DevicePaths {
        control: control.to_path_buf(),
        unit_prefix: dir.join("nvidia").display().to_string(),
    }
}

#[test]
fn missing_control_node_is_channel_unavailable() {
    let dir = tempdir().unwrap();
    let ctl = dir.path().join("nvidiactl");

    match NvControl::open(paths(&ctl, dir.path())) {
        Err(RmError::ChannelUnavailable { path, source }) => {
            assert_eq!(path, ctl);
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("expected ChannelUnavailable, got {other:?}"),
    }
}

#[test]
fn missing_unit_node_ends_enumeration() {
    let dir = tempdir().unwrap();
    let ctl_file = NamedTempFile::new_in(dir.path()).unwrap();
    let mut ctl = NvControl::open(paths(ctl_file.path(), dir.path())).unwrap();

    let err = registrar::register_unit(&mut ctl, 0).unwrap_err();
    assert!(err.is_unit_not_found(), "{err:?}");
    assert_eq!(err.to_string(), format!("{} missing", dir.path().join("nvidia0").display()));
}

#[test]
fn unopenable_unit_node_is_not_end_of_enumeration() {
    let dir = tempdir().unwrap();
    let ctl_file = NamedTempFile::new_in(dir.path()).unwrap();
    fs::create_dir(dir.path().join("nvidia0")).unwrap();
    let mut ctl = NvControl::open(paths(ctl_file.path(), dir.path())).unwrap();

    let err = registrar::register_unit(&mut ctl, 0).unwrap_err();
    assert!(matches!(err, RmError::UnitUnavailable { unit: 0, .. }), "{err:?}");
}

#[test]
fn unit_that_rejects_registration_is_reported() {
    let dir = tempdir().unwrap();
    let ctl_file = NamedTempFile::new_in(dir.path()).unwrap();
    fs::write(dir.path().join("nvidia0"), b"").unwrap();
    let mut ctl = NvControl::open(paths(ctl_file.path(), dir.path())).unwrap();

    match registrar::register_unit(&mut ctl, 0) {
        Err(RmError::RegistrationFailed {
            unit,
            cause: RegistrationFault::Transport { op, source },
            ..
        }) => {
            assert_eq!(unit, 0);
            assert_eq!(op, Operation::RegisterFd);
            assert_eq!(source.raw_os_error(), Some(libc::ENOTTY));
        }
        other => panic!("expected RegistrationFailed, got {other:?}"),
    }
}

#[test]
fn session_over_non_driver_node_aborts_at_client() {
    let dir = tempdir().unwrap();
    let ctl_file = NamedTempFile::new_in(dir.path()).unwrap();
    let driver = NvDriver::new(paths(ctl_file.path(), dir.path()));

    let report = session::run(&driver, None, &SessionConfig::default());

    assert_eq!(report.termination, Termination::Aborted);
    assert!(matches!(report.fatal, Some(RmError::Transport { .. })), "{:?}", report.fatal);
    assert_eq!(report.exit_code(), 1);
}
