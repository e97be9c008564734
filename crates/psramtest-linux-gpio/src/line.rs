//! Single GPIO output lines
//!
//! Board signals that are not part of the serial link (chip-select on the
//! spidev backend, the timing pulse pin, the status LED and the quad-mode
//! hold lines) are each requested as one output line.

use crate::error::{LinuxGpioError, Result};

use gpiocdev::line::{Bias, Offset, Value};
use gpiocdev::request::{Config, Request};

use psramtest_core::bus::OutputLine;
use psramtest_core::error::{Error as CoreError, Result as CoreResult};

/// Consumer label shown by `gpioinfo`
pub(crate) const CONSUMER: &str = "psramtest";

/// Device path for a GPIO chip number
pub fn chip_path(chip: u32) -> String {
    format!("/dev/gpiochip{}", chip)
}

/// One requested GPIO output line
pub struct GpioLine {
    request: Request,
    offset: Offset,
}

impl GpioLine {
    /// Request `offset` on `chip` as an output driven to `initial_high`
    pub fn open(chip: &str, offset: Offset, initial_high: bool) -> Result<Self> {
        Self::request(chip, offset, initial_high, false)
    }

    /// Request `offset` as an output held high with the pull-up enabled
    pub fn open_pulled_up(chip: &str, offset: Offset) -> Result<Self> {
        Self::request(chip, offset, true, true)
    }

    fn request(chip: &str, offset: Offset, initial_high: bool, pull_up: bool) -> Result<Self> {
        let mut req_config = Config::default();
        req_config
            .with_line(offset)
            .as_output(level(initial_high));
        if pull_up {
            req_config.with_bias(Bias::PullUp);
        }

        let request = Request::from_config(req_config)
            .on_chip(chip)
            .with_consumer(CONSUMER)
            .request()
            .map_err(LinuxGpioError::LineRequestFailed)?;

        log::debug!(
            "linux_gpio: Requested {} line {} ({}{})",
            chip,
            offset,
            if initial_high { "high" } else { "low" },
            if pull_up { ", pull-up" } else { "" }
        );

        Ok(Self { request, offset })
    }

    /// Line offset on its chip
    pub fn offset(&self) -> Offset {
        self.offset
    }

    fn set(&mut self, high: bool) -> CoreResult<()> {
        self.request
            .set_value(self.offset, level(high))
            .map(|_| ())
            .map_err(|e| {
                log::error!("linux_gpio: Failed to set line {}: {}", self.offset, e);
                CoreError::PinError
            })
    }
}

impl OutputLine for GpioLine {
    fn set_high(&mut self) -> CoreResult<()> {
        self.set(true)
    }

    fn set_low(&mut self) -> CoreResult<()> {
        self.set(false)
    }
}

pub(crate) fn level(high: bool) -> Value {
    if high {
        Value::Active
    } else {
        Value::Inactive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chip_numbers_map_to_device_paths() {
        assert_eq!(chip_path(0), "/dev/gpiochip0");
        assert_eq!(chip_path(4), "/dev/gpiochip4");
    }

    #[test]
    fn levels() {
        assert_eq!(level(true), Value::Active);
        assert_eq!(level(false), Value::Inactive);
    }
}
