//! SPI types and command structures
//!
//! This module provides types for representing PSRAM commands, their
//! address field and the serial opcodes understood by the device.

mod address;
mod command;
pub mod opcodes;

pub use address::AddressWidth;
pub use command::{Command, ReadCommand, MAX_HEADER_LEN};
pub use opcodes::*;
