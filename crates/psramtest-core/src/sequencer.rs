//! Transaction sequencer
//!
//! The sequencer runs the fixed diagnostic routine against a PSRAM chip in a
//! loop and prints a line-oriented report to any [`core::fmt::Write`]
//! console:
//!
//! 1. once at startup: power-up delay, then RESET_ENABLE + RESET
//! 2. per iteration, depending on [`Mode`]:
//!    - `Identify`: READ_ID followed by two single-byte reads
//!    - `ReadWrite`: a 4-byte write/read-back, then the bulk round trip over
//!      the transfer buffers with timing pulses around each direction
//! 3. sleep for the configured interval and repeat
//!
//! Bus return codes and data mismatches are printed, never acted upon. Only
//! a failing console write ends a run early.

use core::fmt::{self, Write};

use heapless::Vec;

use crate::bus::{Clock, OutputLine, Session, SpiBus};
use crate::error::{Error, Result};
use crate::pattern::{self, Mismatch};
use crate::protocol;
use crate::spi::{opcodes, AddressWidth, Command, ReadCommand};

/// Bytes written and read back by the small round trip
pub const SMALL_PATTERN: [u8; 4] = [0xAA, 0xBB, 0xCC, 0xDD];

/// Default bulk transfer buffer length
pub const DEFAULT_BULK_LEN: usize = 32 * 1024;

/// Default pause between iterations
pub const DEFAULT_INTERVAL_MS: u32 = 2000;

/// Default delay before the initial reset
pub const DEFAULT_POWER_UP_DELAY_US: u32 = 200;

/// Default pause between the bulk write and the bulk read
pub const DEFAULT_SETTLE_US: u32 = 100;

/// Longest single-transfer frame: header plus the small pattern
const SMALL_FRAME_LEN: usize = 8;

/// Diagnostic routine run in each iteration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Identification query only
    Identify,
    /// Small write/read-back followed by the bulk round trip
    #[default]
    ReadWrite,
}

impl Mode {
    /// Name as used on the command line
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Identify => "identify",
            Self::ReadWrite => "read-write",
        }
    }
}

/// When the RESET_ENABLE + RESET pair is sent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ResetPolicy {
    /// Never reset the device
    Never,
    /// Reset once after the power-up delay
    #[default]
    Once,
    /// Reset at the start of every iteration
    EveryIteration,
}

/// Sequencer settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencerConfig {
    /// Routine to run
    pub mode: Mode,
    /// Command used for every read-back
    pub read_command: ReadCommand,
    /// Device address all transfers start at
    pub address: u32,
    /// Pause between iterations in milliseconds
    pub interval_ms: u32,
    /// Delay before the initial reset in microseconds
    pub power_up_delay_us: u32,
    /// Pause between bulk write and bulk read in microseconds
    pub settle_us: u32,
    /// Reset repetition
    pub reset_policy: ResetPolicy,
    /// Cap on printed mismatch lines (`None` prints all)
    pub max_mismatch_lines: Option<usize>,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            read_command: ReadCommand::default(),
            address: 0,
            interval_ms: DEFAULT_INTERVAL_MS,
            power_up_delay_us: DEFAULT_POWER_UP_DELAY_US,
            settle_us: DEFAULT_SETTLE_US,
            reset_policy: ResetPolicy::default(),
            max_mismatch_lines: None,
        }
    }
}

impl SequencerConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the routine
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the read-back command
    pub fn with_read_command(mut self, command: ReadCommand) -> Self {
        self.read_command = command;
        self
    }

    /// Set the start address
    pub fn with_address(mut self, address: u32) -> Self {
        self.address = address;
        self
    }

    /// Set the pause between iterations
    pub fn with_interval_ms(mut self, ms: u32) -> Self {
        self.interval_ms = ms;
        self
    }

    /// Set the power-up delay
    pub fn with_power_up_delay_us(mut self, us: u32) -> Self {
        self.power_up_delay_us = us;
        self
    }

    /// Set the pause between bulk write and bulk read
    pub fn with_settle_us(mut self, us: u32) -> Self {
        self.settle_us = us;
        self
    }

    /// Set the reset policy
    pub fn with_reset_policy(mut self, policy: ResetPolicy) -> Self {
        self.reset_policy = policy;
        self
    }

    /// Cap the number of printed mismatch lines
    pub fn with_max_mismatch_lines(mut self, max: Option<usize>) -> Self {
        self.max_mismatch_lines = max;
        self
    }
}

/// Hardware handles used by the sequencer
pub struct Board<B, P, C> {
    /// Chip-select-gated bus to the PSRAM
    pub bus: B,
    /// Spare line pulsed around bulk transfers
    pub timing: P,
    /// Host-side clock for elapsed-time figures
    pub clock: C,
}

impl<B, P, C> Board<B, P, C> {
    /// Collect the handles into a board
    pub fn new(bus: B, timing: P, clock: C) -> Self {
        Self { bus, timing, clock }
    }
}

/// Outcome of one bulk round trip
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkReport {
    /// Transfer length in bytes
    pub len: usize,
    /// Number of differing bytes
    pub mismatches: usize,
    /// Host-side duration of the write session
    pub write_us: u64,
    /// Host-side duration of the read session
    pub read_us: u64,
}

impl BulkReport {
    /// Whether every byte survived the round trip
    pub fn passed(&self) -> bool {
        self.mismatches == 0
    }
}

/// Outcome of one iteration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IterationSummary {
    /// Zero-based iteration number
    pub iteration: u64,
    /// MFID and KGD bytes (identify mode)
    pub signature: Option<[u8; 2]>,
    /// Bytes read back by the small round trip (read-write mode)
    pub small_readback: Option<[u8; 4]>,
    /// Bulk round trip result (read-write mode, non-empty buffers)
    pub bulk: Option<BulkReport>,
    /// Number of bus operations that returned an error
    pub transfer_errors: usize,
}

impl IterationSummary {
    /// No bus errors and no data mismatch
    ///
    /// The identification signature is informational and not considered.
    pub fn passed(&self) -> bool {
        self.transfer_errors == 0
            && self.small_readback.map_or(true, |bytes| bytes == SMALL_PATTERN)
            && self.bulk.map_or(true, |bulk| bulk.passed())
    }
}

/// Totals over a bounded run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Iterations executed
    pub iterations: u64,
    /// Iterations that did not pass
    pub failed: u64,
}

/// The diagnostic loop
pub struct Sequencer<'buf, B, P, C> {
    board: Board<B, P, C>,
    config: SequencerConfig,
    out_buf: &'buf [u8],
    in_buf: &'buf mut [u8],
    iteration: u64,
    /// Failures before the first iteration, charged to it
    startup_errors: usize,
}

impl<'buf, B: SpiBus, P: OutputLine, C: Clock> Sequencer<'buf, B, P, C> {
    /// Create a sequencer over caller-owned transfer buffers
    ///
    /// `out_buf` is filled with the `index mod 256` pattern and `in_buf` is
    /// cleared. Both must have the same length; a zero length disables the
    /// bulk round trip.
    pub fn new(
        board: Board<B, P, C>,
        config: SequencerConfig,
        out_buf: &'buf mut [u8],
        in_buf: &'buf mut [u8],
    ) -> Result<Self> {
        if out_buf.len() != in_buf.len() {
            return Err(Error::BufferSizeMismatch);
        }
        let end = config.address as u64 + out_buf.len().max(SMALL_PATTERN.len()) as u64;
        if end > AddressWidth::ThreeByte.max_size() as u64 {
            return Err(Error::AddressOutOfBounds);
        }

        pattern::fill(out_buf);
        in_buf.fill(0);

        Ok(Self {
            board,
            config,
            out_buf,
            in_buf,
            iteration: 0,
            startup_errors: 0,
        })
    }

    /// The active configuration
    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    /// The pattern written by the bulk round trip
    pub fn out_buf(&self) -> &[u8] {
        self.out_buf
    }

    /// The data read back by the last bulk round trip
    pub fn in_buf(&self) -> &[u8] {
        self.in_buf
    }

    /// Mutable access to the hardware handles
    pub fn board_mut(&mut self) -> &mut Board<B, P, C> {
        &mut self.board
    }

    /// Release the hardware handles
    pub fn into_board(self) -> Board<B, P, C> {
        self.board
    }

    /// Print the banner, wait out the power-up delay and apply the reset policy
    pub fn start<W: Write>(&mut self, out: &mut W) -> Result<()> {
        writeln!(out, "PSRAM test running...")?;
        log::info!(
            "sequencer: mode {}, read-back with {}, bulk length {} bytes",
            self.config.mode.name(),
            self.config.read_command.name(),
            self.out_buf.len()
        );

        let delay_us = self.config.power_up_delay_us.max(opcodes::POWER_UP_DELAY_US);
        if delay_us != self.config.power_up_delay_us {
            log::warn!(
                "sequencer: power-up delay {} us is below the device minimum, using {} us",
                self.config.power_up_delay_us,
                delay_us
            );
        }
        self.board.bus.delay_us(delay_us);

        if self.config.reset_policy == ResetPolicy::Once && self.reset(out)?.is_err() {
            log::warn!("sequencer: startup reset failed");
            self.startup_errors += 1;
        }
        Ok(())
    }

    /// Run one iteration of the configured routine
    pub fn run_iteration<W: Write>(&mut self, out: &mut W) -> Result<IterationSummary> {
        let mut summary = IterationSummary {
            iteration: self.iteration,
            transfer_errors: core::mem::take(&mut self.startup_errors),
            ..Default::default()
        };
        self.iteration += 1;
        log::debug!("sequencer: iteration {}", summary.iteration);

        if self.config.reset_policy == ResetPolicy::EveryIteration && self.reset(out)?.is_err() {
            summary.transfer_errors += 1;
        }

        match self.config.mode {
            Mode::Identify => self.identify(out, &mut summary)?,
            Mode::ReadWrite => {
                self.small_round_trip(out, &mut summary)?;
                if !self.out_buf.is_empty() {
                    self.bulk_round_trip(out, &mut summary)?;
                }
            }
        }
        Ok(summary)
    }

    /// Run `iterations` iterations, or forever if `None`
    ///
    /// Calls [`start`](Self::start) first and sleeps the configured interval
    /// between iterations.
    pub fn run<W: Write>(&mut self, out: &mut W, iterations: Option<u64>) -> Result<RunSummary> {
        self.start(out)?;

        let mut totals = RunSummary::default();
        loop {
            if iterations.is_some_and(|n| totals.iterations >= n) {
                break;
            }
            if totals.iterations > 0 {
                self.sleep_ms(self.config.interval_ms);
            }

            let summary = self.run_iteration(out)?;
            totals.iterations += 1;
            if !summary.passed() {
                totals.failed += 1;
            }
        }
        Ok(totals)
    }

    fn reset<W: Write>(&mut self, out: &mut W) -> Result<Result<usize>> {
        let result = protocol::reset(&mut self.board.bus);
        writeln!(out, "Reset returned: {}", Code(&result))?;
        Ok(result)
    }

    fn identify<W: Write>(&mut self, out: &mut W, summary: &mut IterationSummary) -> Result<()> {
        let header = Command::read_id().header()?;
        let Some(mut session) = open(&mut self.board.bus, out, summary)? else {
            return Ok(());
        };

        let wr = session.write(&header);
        tally(summary, &wr);
        writeln!(out, "Write returned: {}", Code(&wr))?;

        let mut signature = [0u8; 2];
        let mut complete = true;
        for byte in signature.iter_mut() {
            let mut result = [0u8; 1];
            let rr = session.read(&mut result);
            tally(summary, &rr);
            complete &= rr.is_ok();
            writeln!(
                out,
                "Read result is {}, returned: 0x{:02X}",
                Code(&rr),
                result[0]
            )?;
            *byte = result[0];
        }
        close(session, out, summary)?;

        let verdict = if signature == [opcodes::MFID_ESP_PSRAM, opcodes::KGD_PASS] {
            "matches"
        } else {
            "does not match"
        };
        writeln!(
            out,
            "ID signature 0x{:02X} 0x{:02X} {} expected 0x{:02X} 0x{:02X}",
            signature[0],
            signature[1],
            verdict,
            opcodes::MFID_ESP_PSRAM,
            opcodes::KGD_PASS
        )?;
        if complete {
            summary.signature = Some(signature);
        }
        Ok(())
    }

    fn small_round_trip<W: Write>(
        &mut self,
        out: &mut W,
        summary: &mut IterationSummary,
    ) -> Result<()> {
        let address = self.config.address;
        let command = self.config.read_command;
        let frame: Vec<u8, SMALL_FRAME_LEN> = Command::write(address).frame(&SMALL_PATTERN)?;
        let header = command.command(address).header()?;

        if let Some(mut session) = open(&mut self.board.bus, out, summary)? {
            let wr = session.write(&frame);
            tally(summary, &wr);
            writeln!(out, "Write returned: {}", Code(&wr))?;
            close(session, out, summary)?;
        }

        let Some(mut session) = open(&mut self.board.bus, out, summary)? else {
            return Ok(());
        };
        let wr = session.write(&header);
        tally(summary, &wr);
        writeln!(out, "Write returned: {}", Code(&wr))?;

        if let Err(e) = protocol::skip_wait_states(&mut session, command) {
            summary.transfer_errors += 1;
            writeln!(out, "Wait-state read failed: {}", e)?;
        }

        let mut result = [0u8; 4];
        let rr = session.read(&mut result);
        tally(summary, &rr);
        writeln!(
            out,
            "Read result is {}, returned: 0x{:08X} (bytes {:02X} {:02X} {:02X} {:02X})",
            Code(&rr),
            u32::from_le_bytes(result),
            result[0],
            result[1],
            result[2],
            result[3]
        )?;
        close(session, out, summary)?;

        if rr.is_ok() {
            summary.small_readback = Some(result);
        }
        Ok(())
    }

    fn bulk_round_trip<W: Write>(
        &mut self,
        out: &mut W,
        summary: &mut IterationSummary,
    ) -> Result<()> {
        let address = self.config.address;
        let command = self.config.read_command;
        let len = self.out_buf.len();
        let header = Command::write(address).header()?;
        self.in_buf.fill(0);

        self.pulse();
        let start = self.board.clock.now_us();
        let wr = match open(&mut self.board.bus, out, summary)? {
            Some(mut session) => {
                let result = match session.write(&header) {
                    Ok(_) => session.write(self.out_buf),
                    Err(e) => Err(e),
                };
                close(session, out, summary)?;
                Some(result)
            }
            None => None,
        };
        let write_us = self.board.clock.now_us().saturating_sub(start);
        self.pulse();

        self.board.bus.delay_us(self.config.settle_us);

        self.pulse();
        let start = self.board.clock.now_us();
        let rr = match open(&mut self.board.bus, out, summary)? {
            Some(mut session) => {
                let result = match protocol::begin_read(&mut session, command, address) {
                    Ok(_) => session.read(self.in_buf),
                    Err(e) => Err(e),
                };
                close(session, out, summary)?;
                Some(result)
            }
            None => None,
        };
        let read_us = self.board.clock.now_us().saturating_sub(start);
        self.pulse();

        if let Some(wr) = wr {
            tally(summary, &wr);
            writeln!(
                out,
                "Bulk write returned: {} ({} bytes in {} us, {})",
                Code(&wr),
                len,
                write_us,
                Rate { len, us: write_us }
            )?;
        }
        if let Some(rr) = rr {
            tally(summary, &rr);
            writeln!(
                out,
                "Bulk read returned: {} ({} bytes in {} us, {})",
                Code(&rr),
                len,
                read_us,
                Rate { len, us: read_us }
            )?;
        }

        let cap = self.config.max_mismatch_lines.unwrap_or(usize::MAX);
        let mut mismatches = 0usize;
        for Mismatch {
            index,
            expected,
            actual,
        } in pattern::mismatches(self.out_buf, self.in_buf)
        {
            if mismatches < cap {
                writeln!(
                    out,
                    "Mismatch at 0x{:06X}: wrote 0x{:02X}, read 0x{:02X}",
                    index, expected, actual
                )?;
            }
            mismatches += 1;
        }
        if mismatches > cap {
            writeln!(out, "... {} more mismatches not shown", mismatches - cap)?;
        }

        if mismatches == 0 {
            writeln!(out, "Bulk test PASSED ({} bytes)", len)?;
        } else {
            log::warn!("sequencer: {} of {} bytes differ", mismatches, len);
            writeln!(out, "Bulk test FAILED: {} of {} bytes differ", mismatches, len)?;
        }

        summary.bulk = Some(BulkReport {
            len,
            mismatches,
            write_us,
            read_us,
        });
        Ok(())
    }

    fn pulse(&mut self) {
        if let Err(e) = self.board.timing.pulse() {
            log::warn!("sequencer: timing pulse failed: {}", e);
        }
    }

    fn sleep_ms(&mut self, ms: u32) {
        let mut remaining = ms as u64 * 1000;
        while remaining > 0 {
            let chunk = remaining.min(1_000_000);
            self.board.bus.delay_us(chunk as u32);
            remaining -= chunk;
        }
    }
}

/// Open a session, reporting a failed select on the console
fn open<'b, B: SpiBus + ?Sized, W: Write>(
    bus: &'b mut B,
    out: &mut W,
    summary: &mut IterationSummary,
) -> Result<Option<Session<'b, B>>> {
    match Session::begin(bus) {
        Ok(session) => Ok(Some(session)),
        Err(e) => {
            summary.transfer_errors += 1;
            writeln!(out, "Select failed: {}", e)?;
            Ok(None)
        }
    }
}

/// Close a session, reporting a failed release on the console
fn close<B: SpiBus + ?Sized, W: Write>(
    session: Session<'_, B>,
    out: &mut W,
    summary: &mut IterationSummary,
) -> Result<()> {
    if let Err(e) = session.end() {
        summary.transfer_errors += 1;
        writeln!(out, "Release failed: {}", e)?;
    }
    Ok(())
}

fn tally(summary: &mut IterationSummary, result: &Result<usize>) {
    if result.is_err() {
        summary.transfer_errors += 1;
    }
}

/// Transfer return code as printed on the console
struct Code<'a>(&'a Result<usize>);

impl fmt::Display for Code<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Ok(n) => write!(f, "0x{:04X}", n),
            Err(e) => write!(f, "error ({})", e),
        }
    }
}

/// Throughput in KiB/s, integer arithmetic only
struct Rate {
    len: usize,
    us: u64,
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.us == 0 {
            return write!(f, "rate n/a");
        }
        write!(f, "{} KiB/s", self.len as u64 * 1_000_000 / 1024 / self.us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{NoClock, NoPin};
    use std::string::{String, ToString};

    /// Bus that accepts every transfer and reads back zeros
    #[derive(Default)]
    struct Blank {
        selected: bool,
        delayed_us: u64,
    }

    impl SpiBus for Blank {
        fn select(&mut self) -> Result<()> {
            self.selected = true;
            Ok(())
        }

        fn deselect(&mut self) -> Result<()> {
            self.selected = false;
            Ok(())
        }

        fn write(&mut self, data: &[u8]) -> Result<usize> {
            Ok(data.len())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            buf.fill(0);
            Ok(buf.len())
        }

        fn delay_us(&mut self, us: u32) {
            self.delayed_us += us as u64;
        }
    }

    /// Bus whose chip-select cannot be driven
    struct Dead;

    impl SpiBus for Dead {
        fn select(&mut self) -> Result<()> {
            Err(Error::ChipSelectFailed)
        }

        fn deselect(&mut self) -> Result<()> {
            Ok(())
        }

        fn write(&mut self, _data: &[u8]) -> Result<usize> {
            Err(Error::NotSelected)
        }

        fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
            Err(Error::NotSelected)
        }

        fn delay_us(&mut self, _us: u32) {}
    }

    fn board<B>(bus: B) -> Board<B, NoPin, NoClock> {
        Board::new(bus, NoPin, NoClock)
    }

    #[test]
    fn default_config() {
        let config = SequencerConfig::default();
        assert_eq!(config.mode, Mode::ReadWrite);
        assert_eq!(config.read_command, ReadCommand::FastRead);
        assert_eq!(config.reset_policy, ResetPolicy::Once);
        assert_eq!(config.interval_ms, 2000);
        assert_eq!(config.power_up_delay_us, 200);
        assert_eq!(config.address, 0);
    }

    #[test]
    fn unequal_buffers_are_rejected() {
        let mut out_buf = [0u8; 16];
        let mut in_buf = [0u8; 8];
        let result = Sequencer::new(
            board(Blank::default()),
            SequencerConfig::default(),
            &mut out_buf,
            &mut in_buf,
        );
        assert!(matches!(result, Err(Error::BufferSizeMismatch)));
    }

    #[test]
    fn transfers_past_24_bits_are_rejected() {
        let mut out_buf = [0u8; 16];
        let mut in_buf = [0u8; 16];
        let config = SequencerConfig::new().with_address(0xFF_FFF8);
        let result = Sequencer::new(board(Blank::default()), config, &mut out_buf, &mut in_buf);
        assert!(matches!(result, Err(Error::AddressOutOfBounds)));
    }

    #[test]
    fn new_fills_pattern() {
        let mut out_buf = [0u8; 300];
        let mut in_buf = [0xAAu8; 300];
        let seq = Sequencer::new(
            board(Blank::default()),
            SequencerConfig::default(),
            &mut out_buf,
            &mut in_buf,
        )
        .unwrap();
        assert_eq!(seq.out_buf()[299], 43);
        assert!(seq.in_buf().iter().all(|&b| b == 0));
    }

    #[test]
    fn start_prints_banner_and_reset() {
        let mut out = String::new();
        let mut seq = Sequencer::new(
            board(Blank::default()),
            SequencerConfig::default(),
            &mut [],
            &mut [],
        )
        .unwrap();
        seq.start(&mut out).unwrap();
        assert_eq!(out, "PSRAM test running...\nReset returned: 0x0002\n");
        assert_eq!(seq.into_board().bus.delayed_us, 200);
    }

    #[test]
    fn power_up_delay_has_a_floor() {
        let mut out = String::new();
        let config = SequencerConfig::new().with_power_up_delay_us(20);
        let mut seq = Sequencer::new(board(Blank::default()), config, &mut [], &mut []).unwrap();
        seq.start(&mut out).unwrap();
        assert_eq!(seq.into_board().bus.delayed_us, 150);
    }

    /// Bus that rejects the reset pair and accepts everything else
    #[derive(Default)]
    struct NoReset(Blank);

    impl SpiBus for NoReset {
        fn select(&mut self) -> Result<()> {
            self.0.select()
        }

        fn deselect(&mut self) -> Result<()> {
            self.0.deselect()
        }

        fn write(&mut self, data: &[u8]) -> Result<usize> {
            if data.first() == Some(&opcodes::RESET_ENABLE) {
                return Err(Error::SpiTransferFailed);
            }
            self.0.write(data)
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            self.0.read(buf)
        }

        fn delay_us(&mut self, us: u32) {
            self.0.delay_us(us)
        }
    }

    #[test]
    fn failed_startup_reset_fails_first_iteration() {
        let mut out = String::new();
        let config = SequencerConfig::new().with_mode(Mode::Identify);
        let mut seq =
            Sequencer::new(board(NoReset::default()), config, &mut [], &mut []).unwrap();
        let totals = seq.run(&mut out, Some(2)).unwrap();
        assert!(out.contains("Reset returned: error (SPI transfer failed)"));
        assert_eq!(totals, RunSummary { iterations: 2, failed: 1 });
    }

    #[test]
    fn never_policy_skips_reset() {
        let mut out = String::new();
        let config = SequencerConfig::new().with_reset_policy(ResetPolicy::Never);
        let mut seq = Sequencer::new(board(Blank::default()), config, &mut [], &mut []).unwrap();
        seq.start(&mut out).unwrap();
        assert_eq!(out, "PSRAM test running...\n");
    }

    #[test]
    fn identify_prints_return_codes() {
        let mut out = String::new();
        let config = SequencerConfig::new().with_mode(Mode::Identify);
        let mut seq = Sequencer::new(board(Blank::default()), config, &mut [], &mut []).unwrap();
        let summary = seq.run_iteration(&mut out).unwrap();
        assert_eq!(
            out,
            "Write returned: 0x0004\n\
             Read result is 0x0001, returned: 0x00\n\
             Read result is 0x0001, returned: 0x00\n\
             ID signature 0x00 0x00 does not match expected 0x0D 0x5D\n"
        );
        assert_eq!(summary.signature, Some([0, 0]));
        assert!(summary.passed());
    }

    #[test]
    fn bus_errors_are_printed_not_fatal() {
        let mut out = String::new();
        let mut out_buf = [0u8; 4];
        let mut in_buf = [0u8; 4];
        let mut seq = Sequencer::new(
            board(Dead),
            SequencerConfig::default(),
            &mut out_buf,
            &mut in_buf,
        )
        .unwrap();
        let totals = seq.run(&mut out, Some(2)).unwrap();
        assert_eq!(totals, RunSummary { iterations: 2, failed: 2 });
        assert!(out.contains("Reset returned: error (chip select could not be driven)"));
        assert!(out.contains("Select failed: chip select could not be driven"));
        assert!(out.contains("Bulk test FAILED: 3 of 4 bytes differ"));
    }

    #[test]
    fn run_sleeps_between_iterations_only() {
        let mut out = String::new();
        let config = SequencerConfig::new()
            .with_mode(Mode::Identify)
            .with_interval_ms(2000);
        let mut seq = Sequencer::new(board(Blank::default()), config, &mut [], &mut []).unwrap();
        seq.run(&mut out, Some(3)).unwrap();
        // power-up delay plus two intervals
        assert_eq!(seq.into_board().bus.delayed_us, 200 + 2 * 2_000_000);
    }

    #[test]
    fn zero_iterations_only_starts() {
        let mut out = String::new();
        let mut seq = Sequencer::new(
            board(Blank::default()),
            SequencerConfig::default(),
            &mut [],
            &mut [],
        )
        .unwrap();
        let totals = seq.run(&mut out, Some(0)).unwrap();
        assert_eq!(totals.iterations, 0);
        assert!(!out.contains("Write returned"));
    }

    #[test]
    fn rate_formatting() {
        assert_eq!(Rate { len: 32768, us: 1000 }.to_string(), "32000 KiB/s");
        assert_eq!(Rate { len: 32768, us: 0 }.to_string(), "rate n/a");
        assert_eq!(Code(&Ok(8)).to_string(), "0x0008");
        assert_eq!(
            Code(&Err(Error::NotSelected)).to_string(),
            "error (bus operation outside of a session)"
        );
    }
}
