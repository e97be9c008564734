//! psramtest-dummy - In-memory PSRAM emulator for testing
//!
//! This crate provides a dummy bus backend that emulates an
//! ESP-PSRAM64-class serial PSRAM in memory. It models the device the way
//! the wire sees it: every byte clocked on MOSI advances a small command
//! state machine and produces one byte on MISO. All bus activity is
//! recorded so tests can assert on framing and session boundaries.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use psramtest_core::bus::{OutputLine, SpiBus};
use psramtest_core::error::{Error, Result};
use psramtest_core::spi::opcodes;

/// Configuration for the dummy PSRAM
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Manufacturer ID returned by READ_ID
    pub manufacturer_id: u8,
    /// Known-good-die byte returned by READ_ID
    pub kgd: u8,
    /// EID bytes following MFID and KGD
    pub eid: [u8; 6],
    /// Memory size in bytes; addresses wrap at this boundary
    pub size: usize,
    /// Wait-state bytes clocked after a FAST_READ address
    pub fast_read_wait_bytes: usize,
    /// Content of every cell at power-up
    pub fill: u8,
    /// Record every bus operation in the trace
    pub record_trace: bool,
    /// Make `delay_us` actually sleep
    pub realtime: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            manufacturer_id: opcodes::MFID_ESP_PSRAM,
            kgd: opcodes::KGD_PASS,
            eid: [0x4B, 0x17, 0x2E, 0x91, 0x05, 0x63],
            size: opcodes::DEVICE_SIZE,
            fast_read_wait_bytes: 1,
            fill: 0x00,
            record_trace: true,
            realtime: false,
        }
    }
}

/// MISO value while a FAST_READ wait state is clocked
pub const WAIT_STATE_BYTE: u8 = 0xFF;

/// One recorded bus operation
#[cfg(feature = "alloc")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// Chip-select asserted
    Select,
    /// Bytes clocked out by a write transfer
    Write(Vec<u8>),
    /// Length of a read transfer
    Read(usize),
    /// Chip-select released
    Deselect,
    /// Blocking delay in microseconds
    Delay(u32),
}

/// Where the device is within the current command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Chip-select released
    Idle,
    /// Next byte is an opcode
    Opcode,
    /// Collecting the 3 address bytes
    Address { opcode: u8, collected: u8 },
    /// Clocking FAST_READ wait states
    Wait { remaining: usize },
    /// Transferring data for the current command
    Data { opcode: u8 },
    /// Returning identification bytes
    Id { index: usize },
    /// Unknown command, remaining bytes are ignored
    Ignore,
}

/// Dummy PSRAM bus
///
/// Emulates the device, its chip-select line and the serial link in memory.
#[cfg(feature = "alloc")]
pub struct DummyPsram {
    config: DummyConfig,
    data: Vec<u8>,
    phase: Phase,
    address: usize,
    reset_armed: bool,
    reset_count: usize,
    trace: Vec<BusEvent>,
}

#[cfg(feature = "alloc")]
impl DummyPsram {
    /// Create a new dummy PSRAM with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![config.fill; config.size];
        Self {
            config,
            data,
            phase: Phase::Idle,
            address: 0,
            reset_armed: false,
            reset_count: 0,
            trace: Vec::new(),
        }
    }

    /// Create a new dummy PSRAM with default configuration (8 MiB, one wait state)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Get a reference to the memory contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the memory contents
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Whether chip-select is currently asserted
    pub fn is_selected(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// Number of executed RESET commands
    pub fn reset_count(&self) -> usize {
        self.reset_count
    }

    /// Recorded bus operations
    pub fn trace(&self) -> &[BusEvent] {
        &self.trace
    }

    /// Take the recorded bus operations, leaving the trace empty
    pub fn take_trace(&mut self) -> Vec<BusEvent> {
        core::mem::take(&mut self.trace)
    }

    fn record(&mut self, event: impl FnOnce() -> BusEvent) {
        if self.config.record_trace {
            self.trace.push(event());
        }
    }

    /// Bytes written in each session, one entry per select/deselect pair
    pub fn written_per_session(&self) -> Vec<Vec<u8>> {
        let mut sessions = Vec::new();
        for event in &self.trace {
            match event {
                BusEvent::Select => sessions.push(Vec::new()),
                BusEvent::Write(bytes) => {
                    if let Some(current) = sessions.last_mut() {
                        current.extend_from_slice(bytes);
                    }
                }
                _ => {}
            }
        }
        sessions
    }

    /// Clock one byte through the device, returning the MISO byte
    fn clock_byte(&mut self, mosi: u8) -> u8 {
        match self.phase {
            Phase::Idle => 0x00,
            Phase::Opcode => {
                self.phase = self.decode_opcode(mosi);
                0x00
            }
            Phase::Address { opcode, collected } => {
                self.address = (self.address << 8) | mosi as usize;
                let collected = collected + 1;
                self.phase = if collected < 3 {
                    Phase::Address { opcode, collected }
                } else {
                    self.address %= self.data.len();
                    self.after_address(opcode)
                };
                0x00
            }
            Phase::Wait { remaining } => {
                self.phase = if remaining > 1 {
                    Phase::Wait {
                        remaining: remaining - 1,
                    }
                } else {
                    Phase::Data {
                        opcode: opcodes::FAST_READ,
                    }
                };
                WAIT_STATE_BYTE
            }
            Phase::Data { opcode } => {
                let miso = if opcode == opcodes::WRITE {
                    self.data[self.address] = mosi;
                    0x00
                } else {
                    self.data[self.address]
                };
                self.address = (self.address + 1) % self.data.len();
                miso
            }
            Phase::Id { index } => {
                self.phase = Phase::Id { index: index + 1 };
                match index {
                    0 => self.config.manufacturer_id,
                    1 => self.config.kgd,
                    i => self.config.eid.get(i - 2).copied().unwrap_or(0x00),
                }
            }
            Phase::Ignore => 0x00,
        }
    }

    fn decode_opcode(&mut self, opcode: u8) -> Phase {
        if opcode != opcodes::RESET {
            self.reset_armed = false;
        }
        match opcode {
            opcodes::WRITE | opcodes::READ | opcodes::FAST_READ | opcodes::READ_ID => {
                self.address = 0;
                Phase::Address {
                    opcode,
                    collected: 0,
                }
            }
            opcodes::RESET_ENABLE => {
                self.reset_armed = true;
                Phase::Opcode
            }
            opcodes::RESET => {
                if self.reset_armed {
                    self.reset_armed = false;
                    self.reset_count += 1;
                    log::debug!("dummy: device reset");
                } else {
                    log::debug!("dummy: RESET without RESET_ENABLE ignored");
                }
                Phase::Opcode
            }
            _ => {
                log::debug!("dummy: unknown opcode 0x{:02X}", opcode);
                Phase::Ignore
            }
        }
    }

    fn after_address(&self, opcode: u8) -> Phase {
        match opcode {
            opcodes::READ_ID => Phase::Id { index: 0 },
            opcodes::FAST_READ if self.config.fast_read_wait_bytes > 0 => Phase::Wait {
                remaining: self.config.fast_read_wait_bytes,
            },
            _ => Phase::Data { opcode },
        }
    }
}

#[cfg(feature = "alloc")]
impl SpiBus for DummyPsram {
    fn select(&mut self) -> Result<()> {
        if self.is_selected() {
            return Err(Error::AlreadySelected);
        }
        self.phase = Phase::Opcode;
        self.record(|| BusEvent::Select);
        Ok(())
    }

    fn deselect(&mut self) -> Result<()> {
        if !self.is_selected() {
            return Err(Error::NotSelected);
        }
        self.phase = Phase::Idle;
        self.record(|| BusEvent::Deselect);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        if !self.is_selected() {
            return Err(Error::NotSelected);
        }
        for &byte in data {
            self.clock_byte(byte);
        }
        self.record(|| BusEvent::Write(data.to_vec()));
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.is_selected() {
            return Err(Error::NotSelected);
        }
        for byte in buf.iter_mut() {
            *byte = self.clock_byte(0x00);
        }
        self.record(|| BusEvent::Read(buf.len()));
        Ok(buf.len())
    }

    fn delay_us(&mut self, us: u32) {
        #[cfg(feature = "std")]
        if self.config.realtime {
            std::thread::sleep(std::time::Duration::from_micros(us as u64));
        }
        self.record(|| BusEvent::Delay(us));
    }
}

/// Dummy output line that remembers its level and counts pulses
#[derive(Debug, Default, Clone)]
pub struct DummyLine {
    high: bool,
    rising_edges: usize,
}

impl DummyLine {
    /// Create a line that starts low
    pub fn new() -> Self {
        Self::default()
    }

    /// Current level
    pub fn is_high(&self) -> bool {
        self.high
    }

    /// Number of low-to-high transitions seen
    pub fn rising_edges(&self) -> usize {
        self.rising_edges
    }
}

impl OutputLine for DummyLine {
    fn set_high(&mut self) -> Result<()> {
        if !self.high {
            self.rising_edges += 1;
        }
        self.high = true;
        Ok(())
    }

    fn set_low(&mut self) -> Result<()> {
        self.high = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psramtest_core::bus::{NoClock, Session};
    use psramtest_core::protocol;
    use psramtest_core::sequencer::{
        Board, Mode, ResetPolicy, Sequencer, SequencerConfig, SMALL_PATTERN,
    };
    use psramtest_core::spi::ReadCommand;

    fn sequencer<'a>(
        psram: DummyPsram,
        config: SequencerConfig,
        out_buf: &'a mut [u8],
        in_buf: &'a mut [u8],
    ) -> Sequencer<'a, DummyPsram, DummyLine, NoClock> {
        Sequencer::new(
            Board::new(psram, DummyLine::new(), NoClock),
            config,
            out_buf,
            in_buf,
        )
        .unwrap()
    }

    #[test]
    fn test_read_id() {
        let mut psram = DummyPsram::new_default();
        let id = protocol::read_id(&mut psram).unwrap();
        assert!(id.is_expected());
        assert_eq!(id.eid, psram.config().eid);
        assert_eq!(psram.written_per_session(), [vec![0x9F, 0, 0, 0]]);
    }

    #[test]
    fn test_reset_in_one_session() {
        let mut psram = DummyPsram::new_default();
        protocol::reset(&mut psram).unwrap();
        assert_eq!(psram.reset_count(), 1);
        assert_eq!(
            psram.trace(),
            [
                BusEvent::Select,
                BusEvent::Write(vec![0x66, 0x99]),
                BusEvent::Deselect
            ]
        );
    }

    #[test]
    fn test_reset_enable_carries_into_next_session() {
        let mut psram = DummyPsram::new_default();
        for opcode in [opcodes::RESET_ENABLE, opcodes::RESET] {
            let mut session = Session::begin(&mut psram).unwrap();
            session.write(&[opcode]).unwrap();
            session.end().unwrap();
        }
        assert_eq!(psram.reset_count(), 1);
    }

    #[test]
    fn test_reset_requires_enable() {
        let mut psram = DummyPsram::new_default();
        let mut session = Session::begin(&mut psram).unwrap();
        session.write(&[opcodes::RESET]).unwrap();
        session.end().unwrap();
        assert_eq!(psram.reset_count(), 0);
    }

    #[test]
    fn test_address_is_big_endian() {
        let mut psram = DummyPsram::new_default();
        protocol::write(&mut psram, 0x12_3456, &[0x11, 0x22]).unwrap();
        assert_eq!(&psram.data()[0x12_3456..0x12_3458], &[0x11, 0x22]);
        assert_eq!(
            psram.written_per_session(),
            [vec![0x02, 0x12, 0x34, 0x56, 0x11, 0x22]]
        );

        let mut buf = [0u8; 2];
        protocol::read(&mut psram, ReadCommand::Read, 0x12_3456, &mut buf).unwrap();
        assert_eq!(buf, [0x11, 0x22]);
        protocol::read(&mut psram, ReadCommand::FastRead, 0x12_3456, &mut buf).unwrap();
        assert_eq!(buf, [0x11, 0x22]);

        let sessions = psram.written_per_session();
        assert_eq!(sessions[1], [0x03, 0x12, 0x34, 0x56]);
        assert_eq!(sessions[2], [0x0B, 0x12, 0x34, 0x56]);
    }

    #[test]
    fn test_address_wraps_at_device_size() {
        let mut psram = DummyPsram::new(DummyConfig {
            size: 1024,
            ..Default::default()
        });
        protocol::write(&mut psram, 1022, &[1, 2, 3, 4]).unwrap();
        assert_eq!(&psram.data()[1022..], &[1, 2]);
        assert_eq!(&psram.data()[..2], &[3, 4]);
    }

    #[test]
    fn test_trace_can_be_disabled() {
        let mut psram = DummyPsram::new(DummyConfig {
            record_trace: false,
            ..Default::default()
        });
        protocol::write(&mut psram, 0, &[0xAA]).unwrap();
        psram.delay_us(10);
        assert!(psram.trace().is_empty());
        assert_eq!(psram.data()[0], 0xAA);
    }

    #[test]
    fn test_untraced_bulk_write_lands_in_memory() {
        let mut psram = DummyPsram::new(DummyConfig {
            record_trace: false,
            ..Default::default()
        });
        let block: Vec<u8> = (0..4096u32).map(|i| i as u8).collect();
        protocol::write(&mut psram, 0x100, &block).unwrap();
        assert!(psram.trace().is_empty());
        assert_eq!(&psram.data()[0x100..0x100 + block.len()], &block[..]);
    }

    #[test]
    fn test_small_write_then_fast_read() {
        let mut psram = DummyPsram::new_default();

        let mut session = Session::begin(&mut psram).unwrap();
        let written = session
            .write(&[0x02, 0, 0, 0, 0xAA, 0xBB, 0xCC, 0xDD])
            .unwrap();
        session.end().unwrap();
        assert_eq!(written, 8);

        let mut session = Session::begin(&mut psram).unwrap();
        session.write(&[0x0B, 0, 0, 0]).unwrap();
        let mut dummy = [0u8; 1];
        session.read(&mut dummy).unwrap();
        let mut result = [0u8; 4];
        session.read(&mut result).unwrap();
        session.end().unwrap();

        assert_eq!(dummy, [WAIT_STATE_BYTE]);
        assert_eq!(result, SMALL_PATTERN);
        assert_eq!(u32::from_le_bytes(result), 0xDDCC_BBAA);
    }

    #[test]
    fn test_skipping_wait_state_shifts_data() {
        let mut psram = DummyPsram::new_default();
        protocol::write(&mut psram, 0, &SMALL_PATTERN).unwrap();

        let mut session = Session::begin(&mut psram).unwrap();
        session.write(&[0x0B, 0, 0, 0]).unwrap();
        let mut result = [0u8; 4];
        session.read(&mut result).unwrap();
        session.end().unwrap();

        assert_eq!(result, [WAIT_STATE_BYTE, 0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_misuse_is_reported() {
        let mut psram = DummyPsram::new_default();
        assert_eq!(psram.write(&[0x02]), Err(Error::NotSelected));
        assert_eq!(psram.read(&mut [0u8; 1]), Err(Error::NotSelected));
        assert_eq!(psram.deselect(), Err(Error::NotSelected));
        psram.select().unwrap();
        assert_eq!(psram.select(), Err(Error::AlreadySelected));
    }

    #[test]
    fn test_bulk_round_trip_matches_pattern() {
        let mut out_buf = vec![0u8; 4096];
        let mut in_buf = vec![0u8; 4096];
        let config = SequencerConfig::new().with_address(0x1000);
        let mut seq = sequencer(DummyPsram::new_default(), config, &mut out_buf, &mut in_buf);

        let mut out = String::new();
        seq.start(&mut out).unwrap();
        let summary = seq.run_iteration(&mut out).unwrap();

        assert!(summary.passed());
        assert_eq!(summary.small_readback, Some(SMALL_PATTERN));
        assert_eq!(summary.bulk.map(|b| b.mismatches), Some(0));
        assert!(seq.out_buf().iter().enumerate().all(|(i, &b)| b == i as u8));
        assert_eq!(seq.in_buf(), seq.out_buf());

        let board = seq.into_board();
        assert_eq!(&board.bus.data()[0x1000..0x2000], &out_buf[..]);
        assert_eq!(board.timing.rising_edges(), 4);
        assert!(!board.timing.is_high());
    }

    #[test]
    fn test_sessions_are_symmetric() {
        let mut out_buf = [0u8; 256];
        let mut in_buf = [0u8; 256];
        let config = SequencerConfig::new().with_reset_policy(ResetPolicy::EveryIteration);
        let mut seq = sequencer(DummyPsram::new_default(), config, &mut out_buf, &mut in_buf);

        let mut out = String::new();
        seq.run(&mut out, Some(3)).unwrap();

        let psram = seq.into_board().bus;
        assert_eq!(psram.reset_count(), 3);
        assert!(!psram.is_selected());

        let mut selected = false;
        let mut sessions = 0;
        for event in psram.trace() {
            match event {
                BusEvent::Select => {
                    assert!(!selected, "nested select");
                    selected = true;
                    sessions += 1;
                }
                BusEvent::Deselect => {
                    assert!(selected, "release without select");
                    selected = false;
                }
                BusEvent::Write(_) | BusEvent::Read(_) => assert!(selected),
                BusEvent::Delay(_) => assert!(!selected),
            }
        }
        // reset, small write, small read, bulk write, bulk read
        assert_eq!(sessions, 3 * 5);
    }

    #[test]
    fn test_read_write_report() {
        let mut out_buf = [0u8; 64];
        let mut in_buf = [0u8; 64];
        let mut seq = sequencer(
            DummyPsram::new_default(),
            SequencerConfig::default(),
            &mut out_buf,
            &mut in_buf,
        );

        let mut out = String::new();
        let totals = seq.run(&mut out, Some(1)).unwrap();
        assert_eq!(totals.failed, 0);
        assert_eq!(
            out,
            "PSRAM test running...\n\
             Reset returned: 0x0002\n\
             Write returned: 0x0008\n\
             Write returned: 0x0004\n\
             Read result is 0x0004, returned: 0xDDCCBBAA (bytes AA BB CC DD)\n\
             Bulk write returned: 0x0040 (64 bytes in 0 us, rate n/a)\n\
             Bulk read returned: 0x0040 (64 bytes in 0 us, rate n/a)\n\
             Bulk test PASSED (64 bytes)\n"
        );
    }

    #[test]
    fn test_read_write_without_bulk_buffers() {
        let mut seq = sequencer(
            DummyPsram::new_default(),
            SequencerConfig::default(),
            &mut [],
            &mut [],
        );

        let mut out = String::new();
        seq.start(&mut out).unwrap();
        let summary = seq.run_iteration(&mut out).unwrap();
        assert!(!out.contains("Bulk"), "{}", out);
        assert!(summary.bulk.is_none());
        assert_eq!(summary.small_readback, Some(SMALL_PATTERN));
        assert!(summary.passed());
    }

    #[test]
    fn test_identify_report() {
        let config = SequencerConfig::new().with_mode(Mode::Identify);
        let mut seq = sequencer(DummyPsram::new_default(), config, &mut [], &mut []);

        let mut out = String::new();
        seq.run(&mut out, Some(1)).unwrap();
        assert_eq!(
            out,
            "PSRAM test running...\n\
             Reset returned: 0x0002\n\
             Write returned: 0x0004\n\
             Read result is 0x0001, returned: 0x0D\n\
             Read result is 0x0001, returned: 0x5D\n\
             ID signature 0x0D 0x5D matches expected 0x0D 0x5D\n"
        );
    }

    #[test]
    fn test_plain_read_command() {
        let mut out_buf = [0u8; 128];
        let mut in_buf = [0u8; 128];
        let config = SequencerConfig::new().with_read_command(ReadCommand::Read);
        let mut seq = sequencer(DummyPsram::new_default(), config, &mut out_buf, &mut in_buf);

        let mut out = String::new();
        seq.start(&mut out).unwrap();
        assert!(seq.run_iteration(&mut out).unwrap().passed());

        let sessions = seq.into_board().bus.written_per_session();
        // reset, small write, small read
        assert_eq!(sessions[2], [0x03, 0, 0, 0]);
    }

    #[test]
    fn test_wait_state_mismatch_fails_bulk() {
        let psram = DummyPsram::new(DummyConfig {
            fast_read_wait_bytes: 2,
            ..Default::default()
        });
        let mut out_buf = [0u8; 64];
        let mut in_buf = [0u8; 64];
        let config = SequencerConfig::new().with_max_mismatch_lines(Some(2));
        let mut seq = sequencer(psram, config, &mut out_buf, &mut in_buf);

        let mut out = String::new();
        seq.start(&mut out).unwrap();
        let summary = seq.run_iteration(&mut out).unwrap();

        assert!(!summary.passed());
        assert_eq!(summary.small_readback, Some([WAIT_STATE_BYTE, 0xAA, 0xBB, 0xCC]));
        assert!(out.contains("returned: 0xCCBBAAFF (bytes FF AA BB CC)\n"));
        assert!(out.contains(
            "Mismatch at 0x000000: wrote 0x00, read 0xFF\n\
             Mismatch at 0x000001: wrote 0x01, read 0x00\n\
             ... 62 more mismatches not shown\n\
             Bulk test FAILED: 64 of 64 bytes differ\n"
        ));
    }

    #[test]
    fn test_dummy_line_counts_pulses() {
        let mut line = DummyLine::new();
        line.pulse().unwrap();
        line.pulse().unwrap();
        line.set_high().unwrap();
        line.set_high().unwrap();
        assert_eq!(line.rising_edges(), 3);
        assert!(line.is_high());
    }
}
