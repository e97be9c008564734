//! Protocol implementations
//!
//! This module contains the PSRAM command sequences built on top of the
//! [`SpiBus`](crate::bus::SpiBus) trait.

mod psram;

pub use psram::*;
