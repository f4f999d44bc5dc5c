//! Unified error type for the Urbanite firmware.
//!
//! Follows embedded best practice: a single `Error` enum that every
//! subsystem funnels into, keeping the port boundary's error handling
//! uniform. The FSM core itself never returns `Error` — per the error
//! handling design, a failed guard just keeps the FSM in its current
//! state and the next `fire` retries. `Error` exists only for the port
//! layer, where an invalid peripheral id is a programmer mistake caught
//! once at `init()`.

use core::fmt;

/// Every fallible port-layer operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// `init()` was called with a peripheral id the port layer does not
    /// recognise. Unrecoverable — caught once at boot.
    InvalidPeripheral(&'static str, u32),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPeripheral(kind, id) => {
                write!(f, "invalid {kind} peripheral id: {id}")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
