//! RP2040 implementations of the psramtest bus traits

use embassy_rp::gpio::{Flex, Output, Pull};
use embassy_rp::peripherals::SPI1;
use embassy_rp::spi::{Blocking, Spi};
use embassy_time::{block_for, Duration, Instant};
use psramtest_core::bus::{Clock, OutputLine, SpiBus};
use psramtest_core::error::{Error, Result};

/// SPI1 with chip-select on a plain GPIO
pub struct PsramBus {
    spi: Spi<'static, SPI1, Blocking>,
    cs: Output<'static>,
}

impl PsramBus {
    pub fn new(spi: Spi<'static, SPI1, Blocking>, cs: Output<'static>) -> Self {
        Self { spi, cs }
    }
}

impl SpiBus for PsramBus {
    fn select(&mut self) -> Result<()> {
        self.cs.set_low();
        Ok(())
    }

    fn deselect(&mut self) -> Result<()> {
        self.cs.set_high();
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.spi
            .blocking_write(data)
            .map_err(|_| Error::SpiTransferFailed)?;
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.spi
            .blocking_read(buf)
            .map_err(|_| Error::SpiTransferFailed)?;
        Ok(buf.len())
    }

    fn delay_us(&mut self, us: u32) {
        block_for(Duration::from_micros(us as u64));
    }
}

/// GPIO output used as the timing pulse pin
pub struct TimingPin(pub Output<'static>);

impl OutputLine for TimingPin {
    fn set_high(&mut self) -> Result<()> {
        self.0.set_high();
        Ok(())
    }

    fn set_low(&mut self) -> Result<()> {
        self.0.set_low();
        Ok(())
    }
}

/// Drive a pin high with its pull-up enabled, as the quad-mode lines need
pub fn hold_high(mut pin: Flex<'static>) -> Flex<'static> {
    pin.set_pull(Pull::Up);
    pin.set_high();
    pin.set_as_output();
    pin
}

/// Microseconds since boot from the embassy time driver
pub struct UptimeClock;

impl Clock for UptimeClock {
    fn now_us(&self) -> u64 {
        Instant::now().as_micros()
    }
}
