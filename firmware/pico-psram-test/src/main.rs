//! Serial PSRAM bring-up firmware for Raspberry Pi Pico
//!
//! Runs the psramtest sequencer against an ESP-PSRAM64-class device on
//! SPI1 and prints the results over defmt-rtt.
//!
//! ## Pin Assignments
//!
//! | Pin   | Function                          |
//! |-------|-----------------------------------|
//! | GP12  | SPI1 RX (MISO)                    |
//! | GP13  | CS (GPIO, active low)             |
//! | GP14  | SPI1 SCK                          |
//! | GP15  | SPI1 TX (MOSI)                    |
//! | GP16  | IO2, held high                    |
//! | GP17  | IO3, held high                    |
//! | GP25  | LED                               |
//! | GP28  | Timing pulse (oscilloscope)       |

#![no_std]
#![no_main]

mod board;
mod console;

use defmt::{error, info};
use embassy_executor::Spawner;
use embassy_rp::gpio::{Flex, Level, Output};
use embassy_rp::spi::{self, Spi};
use embassy_time::Timer;
use psramtest_core::sequencer::{Board, Mode, Sequencer, SequencerConfig, DEFAULT_BULK_LEN};
use static_cell::ConstStaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::board::{hold_high, PsramBus, TimingPin, UptimeClock};
use crate::console::RttConsole;

/// SPI clock; the device has run at 62 MHz on this board
const SPI_FREQUENCY_HZ: u32 = 33_000_000;

/// Routine to run, there is no host to pick one at startup
const MODE: Mode = Mode::ReadWrite;

static OUT_BUF: ConstStaticCell<[u8; DEFAULT_BULK_LEN]> =
    ConstStaticCell::new([0; DEFAULT_BULK_LEN]);
static IN_BUF: ConstStaticCell<[u8; DEFAULT_BULK_LEN]> =
    ConstStaticCell::new([0; DEFAULT_BULK_LEN]);

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_rp::init(Default::default());

    // Chip-select starts deasserted
    let cs = Output::new(p.PIN_13, Level::High);

    let mut config = spi::Config::default();
    config.frequency = SPI_FREQUENCY_HZ;
    let spi = Spi::new_blocking(p.SPI1, p.PIN_14, p.PIN_15, p.PIN_12, config);

    // Quad-mode lines must not float while the device is in SPI mode
    let _io2 = hold_high(Flex::new(p.PIN_16));
    let _io3 = hold_high(Flex::new(p.PIN_17));

    let _led = Output::new(p.PIN_25, Level::High);
    let timing = TimingPin(Output::new(p.PIN_28, Level::Low));

    // Give the debug probe time to attach before the banner
    Timer::after_secs(2).await;
    info!("pico-psram-test: SPI1 at {} Hz", SPI_FREQUENCY_HZ);

    let board = Board::new(PsramBus::new(spi, cs), timing, UptimeClock);
    let config = SequencerConfig::new().with_mode(MODE);
    let mut sequencer = match Sequencer::new(board, config, OUT_BUF.take(), IN_BUF.take()) {
        Ok(sequencer) => sequencer,
        Err(e) => {
            error!("pico-psram-test: {}", defmt::Display2Format(&e));
            return;
        }
    };

    let mut console = RttConsole::default();
    if let Err(e) = sequencer.run(&mut console, None) {
        error!("pico-psram-test: sequencer stopped: {}", defmt::Display2Format(&e));
    }
}
