//! Error types for psramtest-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate and by every bus backend at the trait boundary.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Bus errors
    /// SPI transfer failed
    SpiTransferFailed,
    /// Chip select line could not be driven
    ChipSelectFailed,
    /// A bus operation was attempted outside of a session
    NotSelected,
    /// A session was opened while another one was still active
    AlreadySelected,

    // Signal line errors
    /// An auxiliary output line (timing pulse, status LED, hold) failed
    PinError,

    // Address/size errors
    /// Address does not fit in the 24-bit address field
    AddressOutOfBounds,
    /// Provided buffer is too small for the operation
    BufferTooSmall,
    /// Output and input transfer buffers have different lengths
    BufferSizeMismatch,

    // Console errors
    /// Writing a report line to the console failed
    ConsoleError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpiTransferFailed => write!(f, "SPI transfer failed"),
            Self::ChipSelectFailed => write!(f, "chip select could not be driven"),
            Self::NotSelected => write!(f, "bus operation outside of a session"),
            Self::AlreadySelected => write!(f, "chip select already asserted"),
            Self::PinError => write!(f, "signal line could not be driven"),
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::BufferSizeMismatch => write!(f, "transfer buffers differ in length"),
            Self::ConsoleError => write!(f, "console write failed"),
        }
    }
}

impl From<fmt::Error> for Error {
    fn from(_: fmt::Error) -> Self {
        Self::ConsoleError
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
