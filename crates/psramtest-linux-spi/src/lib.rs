//! psramtest-linux-spi - Linux spidev support
//!
//! This crate provides a PSRAM bus backed by the Linux spidev
//! `/dev/spidevX.Y` device interface.
//!
//! # Example
//!
//! ```no_run
//! use psramtest_core::protocol;
//! use psramtest_linux_spi::{LinuxSpi, LinuxSpiConfig};
//!
//! // 33 MHz, mode 0, controller chip-select
//! let config = LinuxSpiConfig::new("/dev/spidev1.0").with_speed(33_000_000);
//! let mut spi = LinuxSpi::open(&config)?;
//!
//! let id = protocol::read_id(&mut spi)?;
//! println!("PSRAM {}", id);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with psramtest CLI
//!
//! ```bash
//! # Kernel chip-select
//! psramtest run -b linux_spi:dev=/dev/spidev1.0
//!
//! # Chip-select, timing pulse and quad hold lines on gpiochip0
//! psramtest run -b linux_spi:dev=/dev/spidev1.0,gpiochip=0,cs=13,pulse=28,io2=16,io3=17
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support enabled (`CONFIG_SPI_SPIDEV`)
//! - Read/write access to `/dev/spidevX.Y`
//! - For GPIO chip-select, a controller driver that honours `SPI_NO_CS`

pub mod device;
pub mod error;

// Re-exports
pub use device::{mode, parse_options, LinuxSpi, LinuxSpiConfig, DEFAULT_SPEED_HZ};
pub use error::{LinuxSpiError, Result};
