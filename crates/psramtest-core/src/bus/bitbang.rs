//! Bitbang SPI bus
//!
//! This module provides a trait for implementing **bitbang-style** buses on
//! top of software-controlled lines (Linux GPIO character device, raw
//! microcontroller pins) and an adapter that turns any such implementation
//! into a [`SpiBus`].
//!
//! Only single-wire mode 0 is supported: data is shifted MSB first, MOSI is
//! set while SCK is low and sampled by the device on the rising edge.
//! Backends with a hardware SPI controller implement [`SpiBus`] directly.

use super::SpiBus;
use crate::error::Result;

/// Trait for low-level bitbang SPI operations
///
/// Line setters are infallible; implementations log failures, matching how
/// a stuck line shows up on a real bus (as corrupted data).
pub trait BitbangBus {
    /// Set chip select (CS is active low, so `active=true` means CS=0)
    fn set_cs(&mut self, active: bool);

    /// Set clock line value
    fn set_sck(&mut self, high: bool);

    /// Set MOSI line value
    fn set_mosi(&mut self, high: bool);

    /// Get MISO line value
    fn get_miso(&self) -> bool;

    /// Delay for half a clock period
    fn half_period_delay(&self);

    /// Busy-wait for the specified number of microseconds
    fn delay_us(&mut self, us: u32);

    /// Optional: Set SCK and MOSI atomically (optimization)
    ///
    /// Default implementation calls `set_sck` then `set_mosi`.
    fn set_sck_set_mosi(&mut self, sck: bool, mosi: bool) {
        self.set_sck(sck);
        self.set_mosi(mosi);
    }

    /// Optional: Set SCK and get MISO atomically (optimization)
    ///
    /// Default implementation calls `set_sck` then `get_miso`.
    fn set_sck_get_miso(&mut self, sck: bool) -> bool {
        self.set_sck(sck);
        self.get_miso()
    }
}

/// Write a byte (MSB first)
pub fn write_byte<M: BitbangBus + ?Sized>(master: &mut M, byte: u8) {
    for i in (0..8).rev() {
        let bit = (byte >> i) & 1 != 0;
        master.set_sck_set_mosi(false, bit);
        master.half_period_delay();
        master.set_sck(true);
        master.half_period_delay();
    }
}

/// Read a byte (MSB first) while holding MOSI low
pub fn read_byte<M: BitbangBus + ?Sized>(master: &mut M) -> u8 {
    let mut byte = 0u8;
    for _ in 0..8 {
        master.set_sck_set_mosi(false, false);
        master.half_period_delay();
        byte <<= 1;
        if master.set_sck_get_miso(true) {
            byte |= 1;
        }
        master.half_period_delay();
    }
    byte
}

/// [`SpiBus`] adapter over a [`BitbangBus`]
pub struct BitbangSpiBus<M> {
    master: M,
}

impl<M: BitbangBus> BitbangSpiBus<M> {
    /// Wrap a bitbang implementation
    pub fn new(master: M) -> Self {
        Self { master }
    }

    /// Access the underlying lines
    pub fn inner(&self) -> &M {
        &self.master
    }

    /// Unwrap the underlying lines
    pub fn into_inner(self) -> M {
        self.master
    }
}

impl<M: BitbangBus> SpiBus for BitbangSpiBus<M> {
    fn select(&mut self) -> Result<()> {
        self.master.set_sck(false);
        self.master.set_cs(true);
        self.master.half_period_delay();
        Ok(())
    }

    fn deselect(&mut self) -> Result<()> {
        self.master.set_sck(false);
        self.master.half_period_delay();
        self.master.set_cs(false);
        self.master.half_period_delay();
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        for &byte in data {
            write_byte(&mut self.master, byte);
        }
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        for byte in buf.iter_mut() {
            *byte = read_byte(&mut self.master);
        }
        Ok(buf.len())
    }

    fn delay_us(&mut self, us: u32) {
        self.master.delay_us(us);
    }
}
