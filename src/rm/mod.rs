//! NVIDIA Resource Manager (RM) client plumbing.
//!
//! - `abi`: wire layouts and identifiers.
//! - `status`: status words and the transport/semantic round-trip type.
//! - `error`: the error taxonomy shared by every session component.
//! - `transport`: the typed request surface (`RmTransport`, `RmDriver`).
//! - `nvctl`: the Linux ioctl implementation of that surface.

pub mod abi;
pub mod error;
pub mod nvctl;
pub mod status;
pub mod transport;

pub use abi::RawHandle;
pub use error::{ObjectKind, Operation, RegistrationFault, RmError};
pub use nvctl::{DevicePaths, NvControl, NvDriver};
pub use status::{Reply, RmStatus, RoundTrip};
pub use transport::{AllocParams, AllocRequest, ControlRequest, FreeRequest, RmDriver, RmTransport};
