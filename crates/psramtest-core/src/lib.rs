//! psramtest-core - Core library for serial PSRAM bring-up
//!
//! This crate provides the bus abstraction, command framing and the
//! diagnostic sequencer used to verify a pseudo-static RAM chip attached
//! over a chip-select-gated serial bus. It is designed to be `no_std`
//! compatible so the same sequencer runs on a host (spidev, GPIO bitbang,
//! in-memory emulator) and on a microcontroller.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`)
//! - `alloc` - Enable boxed bus trait objects
//!
//! # Example
//!
//! ```ignore
//! use psramtest_core::{bus::SpiBus, protocol};
//!
//! fn identify<B: SpiBus>(bus: &mut B) {
//!     match protocol::read_id(bus) {
//!         Ok(id) => println!("MFID 0x{:02X} KGD 0x{:02X}", id.manufacturer, id.kgd),
//!         Err(e) => println!("Read ID failed: {}", e),
//!     }
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod bus;
pub mod error;
pub mod pattern;
pub mod protocol;
pub mod sequencer;
pub mod spi;

pub use error::{Error, Result};
