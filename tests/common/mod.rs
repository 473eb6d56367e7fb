//! Scripted RM driver shared by the integration tests.
//!
//! `FakeDriver` hands out a channel that answers every request from a
//! per-unit script and records the request in a call log. Tests inspect the
//! log after `session::run` returns, once every channel has been dropped.
//!
//! The fake also polices handle use: it remembers which handles it issued
//! and flags any request that names an unknown or already-freed handle.

#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    io,
    path::PathBuf,
    rc::Rc,
};

use ropinfo::rm::abi::{GrGetRopInfoParams, NV01_DEVICE_0, NV01_ROOT, NV20_SUBDEVICE_0, RawHandle};
use ropinfo::rm::{
    AllocParams, AllocRequest, ControlRequest, FreeRequest, Reply, RmDriver, RmError, RmStatus,
    RmTransport, RoundTrip,
};

pub const CLIENT_HANDLE: RawHandle = 0xc1d0_0001;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    OpenControl,
    OpenUnit(u32),
    Register(u32),
    Alloc { class: u32, root: RawHandle, parent: RawHandle, handle: Option<RawHandle> },
    Free { root: RawHandle, parent: RawHandle, object: RawHandle },
    Control { client: RawHandle, object: RawHandle, cmd: u32 },
    CloseUnit(u32),
    CloseControl,
}

/// How opening a unit node behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Present,
    Missing,
    Denied,
}

/// Request whose ioctl itself fails (errno EIO) instead of returning a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Register,
    Device,
    Subdevice,
    Query,
    Free,
}

fn transport_failure() -> io::Error {
    io::Error::from_raw_os_error(libc::EIO)
}

/// Scripted behaviour of one unit.
#[derive(Debug, Clone)]
pub struct UnitScript {
    pub node: Node,
    pub register_status: u32,
    pub device_status: u32,
    pub subdevice_status: u32,
    /// `Err(status)` rejects the ROP query.
    pub query: Result<(u32, u32, u32), u32>,
    /// Applied to every free of this unit's handles.
    pub free_status: u32,
    pub transport_error: Option<Stage>,
}

impl UnitScript {
    pub fn healthy(units: u32, factor: u32, count: u32) -> Self {
        Self {
            node: Node::Present,
            register_status: 0,
            device_status: 0,
            subdevice_status: 0,
            query: Ok((units, factor, count)),
            free_status: 0,
            transport_error: None,
        }
    }

    pub fn missing() -> Self {
        Self { node: Node::Missing, ..Self::healthy(0, 0, 0) }
    }

    pub fn denied() -> Self {
        Self { node: Node::Denied, ..Self::healthy(0, 0, 0) }
    }

    pub fn register_rejected(mut self, status: u32) -> Self {
        self.register_status = status;
        self
    }

    pub fn device_rejected(mut self, status: u32) -> Self {
        self.device_status = status;
        self
    }

    pub fn subdevice_rejected(mut self, status: u32) -> Self {
        self.subdevice_status = status;
        self
    }

    pub fn query_rejected(mut self, status: u32) -> Self {
        self.query = Err(status);
        self
    }

    pub fn free_rejected(mut self, status: u32) -> Self {
        self.free_status = status;
        self
    }

    pub fn transport_fails_at(mut self, stage: Stage) -> Self {
        self.transport_error = Some(stage);
        self
    }

    fn fails_at(&self, stage: Stage) -> bool {
        self.transport_error == Some(stage)
    }
}

#[derive(Debug, Default)]
pub struct State {
    pub calls: Vec<Call>,
    /// Handles issued and not yet freed.
    pub live: HashSet<RawHandle>,
    /// Owning unit of every issued device/subdevice handle.
    pub owner: HashMap<RawHandle, u32>,
    /// Requests that named an unknown or freed handle.
    pub violations: Vec<String>,
    next_handle: RawHandle,
}

impl State {
    fn issue(&mut self, unit: Option<u32>) -> RawHandle {
        let handle = match unit {
            None => CLIENT_HANDLE,
            Some(_) => {
                self.next_handle += 1;
                0x5c00_0000 + self.next_handle
            }
        };
        self.live.insert(handle);
        if let Some(unit) = unit {
            self.owner.insert(handle, unit);
        }
        handle
    }

    fn check_live(&mut self, what: &str, handle: RawHandle) {
        if !self.live.contains(&handle) {
            self.violations.push(format!("{what} names dead handle 0x{handle:x}"));
        }
    }
}

pub struct FakeDriver {
    pub state: Rc<RefCell<State>>,
    pub units: Vec<UnitScript>,
    pub control_missing: bool,
    pub client_status: u32,
}

impl FakeDriver {
    /// Units past the end of `units` are missing.
    pub fn new(units: Vec<UnitScript>) -> Self {
        Self {
            state: Rc::default(),
            units,
            control_missing: false,
            client_status: 0,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn violations(&self) -> Vec<String> {
        self.state.borrow().violations.clone()
    }

    pub fn live(&self) -> usize {
        self.state.borrow().live.len()
    }

    /// Objects freed, in order.
    pub fn freed(&self) -> Vec<RawHandle> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Free { object, .. } => Some(object),
                _ => None,
            })
            .collect()
    }

    /// Handles the driver assigned, in order.
    pub fn allocated(&self) -> Vec<RawHandle> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Alloc { handle, .. } => handle,
                _ => None,
            })
            .collect()
    }
}

impl RmDriver for FakeDriver {
    type Channel = FakeChannel;

    fn open_control(&self) -> Result<FakeChannel, RmError> {
        self.state.borrow_mut().calls.push(Call::OpenControl);
        if self.control_missing {
            return Err(RmError::ChannelUnavailable {
                path: PathBuf::from("/dev/nvidiactl"),
                source: io::Error::from(io::ErrorKind::NotFound),
            });
        }
        Ok(FakeChannel {
            state: Rc::clone(&self.state),
            units: self.units.clone(),
            client_status: self.client_status,
        })
    }
}

pub struct FakeChannel {
    state: Rc<RefCell<State>>,
    units: Vec<UnitScript>,
    client_status: u32,
}

impl FakeChannel {
    fn script(&self, unit: u32) -> UnitScript {
        self.units.get(unit as usize).cloned().unwrap_or_else(UnitScript::missing)
    }
}

impl Drop for FakeChannel {
    fn drop(&mut self) {
        self.state.borrow_mut().calls.push(Call::CloseControl);
    }
}

pub struct FakeUnit {
    index: u32,
    state: Rc<RefCell<State>>,
}

impl Drop for FakeUnit {
    fn drop(&mut self) {
        self.state.borrow_mut().calls.push(Call::CloseUnit(self.index));
    }
}

impl RmTransport for FakeChannel {
    type Unit = FakeUnit;

    fn unit_path(&self, index: u32) -> PathBuf {
        PathBuf::from(format!("/dev/nvidia{index}"))
    }

    fn open_unit(&mut self, index: u32) -> io::Result<FakeUnit> {
        self.state.borrow_mut().calls.push(Call::OpenUnit(index));
        match self.script(index).node {
            Node::Present => Ok(FakeUnit { index, state: Rc::clone(&self.state) }),
            Node::Missing => Err(io::Error::from(io::ErrorKind::NotFound)),
            Node::Denied => Err(io::Error::from(io::ErrorKind::PermissionDenied)),
        }
    }

    fn register_fd(&mut self, unit: &FakeUnit) -> RoundTrip<()> {
        self.state.borrow_mut().calls.push(Call::Register(unit.index));
        if self.script(unit.index).fails_at(Stage::Register) {
            return Err(transport_failure());
        }
        Ok(Reply::new(RmStatus(self.script(unit.index).register_status), ()))
    }

    fn alloc(&mut self, request: &AllocRequest) -> RoundTrip<RawHandle> {
        let mut state = self.state.borrow_mut();

        let (status, unit, broken) = match (request.class, request.params) {
            (NV01_ROOT, AllocParams::None) => (self.client_status, None, false),
            (NV01_DEVICE_0, AllocParams::Device(p)) => {
                state.check_live("device alloc", request.parent);
                let script = self.script(p.device_id);
                (script.device_status, Some(p.device_id), script.fails_at(Stage::Device))
            }
            (NV20_SUBDEVICE_0, AllocParams::Subdevice(_)) => {
                state.check_live("subdevice alloc", request.parent);
                let unit = state.owner.get(&request.parent).copied().unwrap_or(u32::MAX);
                let script = self.script(unit);
                (script.subdevice_status, Some(unit), script.fails_at(Stage::Subdevice))
            }
            (class, params) => panic!("unexpected alloc class 0x{class:x} with {params:?}"),
        };

        if broken {
            state.calls.push(Call::Alloc {
                class: request.class,
                root: request.root,
                parent: request.parent,
                handle: None,
            });
            return Err(transport_failure());
        }

        let handle = (status == 0).then(|| state.issue(unit));
        state.calls.push(Call::Alloc {
            class: request.class,
            root: request.root,
            parent: request.parent,
            handle,
        });
        // A rejected request still writes garbage back.
        Ok(Reply::new(RmStatus(status), handle.unwrap_or(0xdead_beef)))
    }

    fn free(&mut self, request: &FreeRequest) -> RoundTrip<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Free {
            root: request.root,
            parent: request.parent,
            object: request.object,
        });
        state.check_live("free", request.object);
        let script = state.owner.get(&request.object).map(|&unit| self.script(unit));
        if script.as_ref().is_some_and(|s| s.fails_at(Stage::Free)) {
            return Err(transport_failure());
        }
        let status = script.map_or(0, |s| s.free_status);
        if status == 0 {
            state.live.remove(&request.object);
        }
        Ok(Reply::new(RmStatus(status), ()))
    }

    fn control(&mut self, request: &mut ControlRequest<'_>) -> RoundTrip<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Control {
            client: request.client,
            object: request.object,
            cmd: request.cmd,
        });
        state.check_live("control", request.object);
        let unit = state.owner.get(&request.object).copied().unwrap_or(u32::MAX);
        let script = self.script(unit);
        if script.fails_at(Stage::Query) {
            return Err(transport_failure());
        }

        match script.query {
            Ok((units, factor, count)) => {
                let out = GrGetRopInfoParams {
                    rop_unit_count: units,
                    rop_operations_factor: factor,
                    rop_operations_count: count,
                };
                request.params.copy_from_slice(bytemuck::bytes_of(&out));
                Ok(Reply::ok(()))
            }
            Err(status) => Ok(Reply::new(RmStatus(status), ())),
        }
    }
}
