//! Bus traits and abstractions
//!
//! This module defines the traits every backend implements so the protocol
//! helpers and the sequencer can drive a PSRAM chip without knowing whether
//! the bus is a kernel driver, bit-banged GPIO lines or an emulator.

pub mod bitbang;
mod session;
mod traits;

pub use bitbang::{BitbangBus, BitbangSpiBus};
pub use session::Session;
pub use traits::*;
