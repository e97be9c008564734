//! psramtest-linux-gpio - Linux GPIO support
//!
//! This crate provides the GPIO side of a Linux-hosted PSRAM test rig using
//! the character device interface (gpiocdev):
//!
//! - [`GpioLine`]: a single output line for chip-select, the timing pulse,
//!   the status LED or a held quad-mode line
//! - [`LinuxGpioSpi`]: a bit-banged serial bus for boards without a usable
//!   SPI controller
//!
//! # Example
//!
//! ```no_run
//! use psramtest_core::bus::{BitbangSpiBus, OutputLine};
//! use psramtest_core::protocol;
//! use psramtest_linux_gpio::{GpioLine, LinuxGpioSpi, LinuxGpioSpiConfig};
//!
//! let config = LinuxGpioSpiConfig::new("/dev/gpiochip0", 13, 14, 15, 12);
//! //                                    device          CS  SCK MOSI MISO
//! let mut bus = BitbangSpiBus::new(LinuxGpioSpi::open(&config)?);
//! let mut pulse = GpioLine::open("/dev/gpiochip0", 28, false)?;
//!
//! pulse.pulse()?;
//! let id = protocol::read_id(&mut bus)?;
//! println!("PSRAM {}", id);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel 4.8+ with GPIO character device support (5.5+ for bias)
//! - Access to `/dev/gpiochipN` devices (may require root or udev rules)

pub mod device;
pub mod error;
pub mod line;

// Re-exports
pub use device::{parse_options, LinuxGpioSpi, LinuxGpioSpiConfig};
pub use error::{LinuxGpioError, Result};
pub use line::{chip_path, GpioLine};
