//! Bus trait definitions
//!
//! All traits are blocking. A backend owns the serial link and its
//! chip-select line; auxiliary board lines (timing pulse, status LED, hold
//! lines) are separate [`OutputLine`] values.

use crate::error::Result;

/// Chip-select-gated serial bus
///
/// This trait represents the half of a full-duplex SPI link that the PSRAM
/// diagnostic needs: explicit chip-select control plus write-only and
/// read-only transfers. Reads clock out `0x00` on MOSI.
///
/// `write` and `read` return the number of bytes transferred, which the
/// sequencer prints as the transfer's return code. Callers normally do not
/// call `select`/`deselect` directly; they open a [`Session`](super::Session)
/// which guarantees the release.
///
/// ## Example
///
/// ```ignore
/// impl SpiBus for MySpi {
///     fn select(&mut self) -> Result<()> {
///         self.cs.set_low()
///     }
///
///     fn deselect(&mut self) -> Result<()> {
///         self.cs.set_high()
///     }
///
///     fn write(&mut self, data: &[u8]) -> Result<usize> {
///         self.spi.blocking_write(data).map_err(|_| Error::SpiTransferFailed)?;
///         Ok(data.len())
///     }
///     // ...
/// }
/// ```
pub trait SpiBus {
    /// Assert chip-select (drive it low)
    fn select(&mut self) -> Result<()>;

    /// Release chip-select (drive it high)
    fn deselect(&mut self) -> Result<()>;

    /// Clock out `data`, discarding whatever the device returns
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Clock in `buf.len()` bytes while sending zeros
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Busy-wait for the specified number of microseconds
    fn delay_us(&mut self, us: u32);

    /// Largest transfer the backend performs in one hardware operation
    ///
    /// Purely informational: backends split longer transfers themselves
    /// while chip-select stays asserted.
    fn max_transfer_len(&self) -> usize {
        usize::MAX
    }
}

/// A push-pull output line
pub trait OutputLine {
    /// Drive the line high
    fn set_high(&mut self) -> Result<()>;

    /// Drive the line low
    fn set_low(&mut self) -> Result<()>;

    /// Emit one short high pulse, used as an oscilloscope marker
    fn pulse(&mut self) -> Result<()> {
        self.set_high()?;
        self.set_low()
    }
}

/// Placeholder for a board line that is not wired
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPin;

impl OutputLine for NoPin {
    fn set_high(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_low(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Monotonic microsecond clock used for host-side elapsed-time figures
pub trait Clock {
    /// Microseconds since an arbitrary, fixed origin
    fn now_us(&self) -> u64;
}

/// Clock that never advances, for boards without a timer
#[derive(Debug, Default, Clone, Copy)]
pub struct NoClock;

impl Clock for NoClock {
    fn now_us(&self) -> u64 {
        0
    }
}

/// [`Clock`] backed by `std::time::Instant`
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    /// Create a clock whose origin is now
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

// Blanket impls for boxed trait objects so backends can be chosen at runtime
#[cfg(feature = "alloc")]
impl SpiBus for alloc::boxed::Box<dyn SpiBus + Send> {
    fn select(&mut self) -> Result<()> {
        (**self).select()
    }

    fn deselect(&mut self) -> Result<()> {
        (**self).deselect()
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }

    fn max_transfer_len(&self) -> usize {
        (**self).max_transfer_len()
    }
}

#[cfg(feature = "alloc")]
impl OutputLine for alloc::boxed::Box<dyn OutputLine + Send> {
    fn set_high(&mut self) -> Result<()> {
        (**self).set_high()
    }

    fn set_low(&mut self) -> Result<()> {
        (**self).set_low()
    }

    fn pulse(&mut self) -> Result<()> {
        (**self).pulse()
    }
}
