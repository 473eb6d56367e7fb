// src/rm/status.rs

//! RM status codes and the two-level outcome of a request round trip.
//!
//! Every RM request can fail twice over: the ioctl itself can fail
//! (transport), or it can complete and carry a non-zero status in the
//! request body (semantic). `RoundTrip<T>` keeps both in one value so each
//! call site checks them together.

use std::{fmt, io};

/// Status word written back by the driver (`NV_STATUS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RmStatus(pub u32);

impl RmStatus {
    pub const OK: RmStatus = RmStatus(0);

    pub fn is_ok(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// A completed round trip: the driver's status plus whatever it wrote back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply<T> {
    pub status: RmStatus,
    pub value: T,
}

impl<T> Reply<T> {
    pub fn ok(value: T) -> Self {
        Self { status: RmStatus::OK, value }
    }

    pub fn new(status: RmStatus, value: T) -> Self {
        Self { status, value }
    }

    /// Semantic check: the value is only trustworthy when the status is zero.
    pub fn into_result(self) -> Result<T, RmStatus> {
        if self.status.is_ok() { Ok(self.value) } else { Err(self.status) }
    }
}

/// Transport outcome wrapping the semantic one.
pub type RoundTrip<T> = io::Result<Reply<T>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonzero_status_hides_value() {
        assert_eq!(Reply::ok(0xC1D0_0001u32).into_result(), Ok(0xC1D0_0001));
        assert_eq!(
            Reply::new(RmStatus(0x1f), 0xdead_beefu32).into_result(),
            Err(RmStatus(0x1f))
        );
    }

    #[test]
    fn status_prints_as_hex() {
        assert_eq!(RmStatus(0x56).to_string(), "0x56");
        assert!(RmStatus::default().is_ok());
    }
}
