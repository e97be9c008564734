//! Serial PSRAM protocol implementation
//!
//! Each function runs exactly one chip-select session. Addresses are sent
//! as three big-endian bytes right after the opcode; data follows in the
//! same session. The device auto-increments the address for every data byte
//! and needs no write enable or busy polling.

use core::fmt;

use crate::bus::{Session, SpiBus};
use crate::error::{Error, Result};
use crate::spi::{opcodes, Command, ReadCommand, MAX_HEADER_LEN};

/// Number of EID bytes following MFID and KGD in the READ_ID response
pub const EID_LEN: usize = 6;

/// Identification data returned by READ_ID
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceId {
    /// Manufacturer ID (MFID)
    pub manufacturer: u8,
    /// Known-good-die marker (KGD)
    pub kgd: u8,
    /// Device-unique EID bytes
    pub eid: [u8; EID_LEN],
}

impl DeviceId {
    /// Whether MFID and KGD match the expected `0x0D 0x5D` signature
    pub fn is_expected(&self) -> bool {
        self.manufacturer == opcodes::MFID_ESP_PSRAM && self.kgd == opcodes::KGD_PASS
    }

    /// Whether the device reports a failed factory test
    pub fn is_failed_die(&self) -> bool {
        self.kgd == opcodes::KGD_FAIL
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MFID 0x{:02X}, KGD 0x{:02X}, EID", self.manufacturer, self.kgd)?;
        for byte in self.eid {
            write!(f, " {:02X}", byte)?;
        }
        Ok(())
    }
}

/// Send RESET_ENABLE followed by RESET in one session
///
/// The device gives no acknowledgement. Returns the number of bytes sent.
pub fn reset<B: SpiBus + ?Sized>(bus: &mut B) -> Result<usize> {
    let mut session = Session::begin(bus)?;
    let sent = session.write(&[opcodes::RESET_ENABLE, opcodes::RESET])?;
    session.end()?;
    Ok(sent)
}

/// Read the device identification
pub fn read_id<B: SpiBus + ?Sized>(bus: &mut B) -> Result<DeviceId> {
    let header = Command::read_id().header()?;
    let mut buf = [0u8; 2 + EID_LEN];

    let mut session = Session::begin(bus)?;
    session.write(&header)?;
    session.read(&mut buf)?;
    session.end()?;

    let mut eid = [0u8; EID_LEN];
    eid.copy_from_slice(&buf[2..]);
    Ok(DeviceId {
        manufacturer: buf[0],
        kgd: buf[1],
        eid,
    })
}

/// Write `data` starting at `address`
///
/// Header and payload go out as two transfers within one session. Returns
/// the number of payload bytes written.
pub fn write<B: SpiBus + ?Sized>(bus: &mut B, address: u32, data: &[u8]) -> Result<usize> {
    let header = Command::write(address).header()?;

    let mut session = Session::begin(bus)?;
    session.write(&header)?;
    let written = session.write(data)?;
    session.end()?;
    Ok(written)
}

/// Read `buf.len()` bytes starting at `address` using `command`
///
/// Returns the number of data bytes read (wait-state bytes excluded).
pub fn read<B: SpiBus + ?Sized>(
    bus: &mut B,
    command: ReadCommand,
    address: u32,
    buf: &mut [u8],
) -> Result<usize> {
    let mut session = Session::begin(bus)?;
    begin_read(&mut session, command, address)?;
    let read = session.read(buf)?;
    session.end()?;
    Ok(read)
}

/// Send a read header inside an open session and consume its wait states
///
/// After this returns, the next byte read from the session is the byte at
/// `address`. Returns the header write's byte count.
pub fn begin_read<B: SpiBus + ?Sized>(
    session: &mut Session<'_, B>,
    command: ReadCommand,
    address: u32,
) -> Result<usize> {
    let header = command.command(address).header()?;
    let sent = session.write(&header)?;
    skip_wait_states(session, command)?;
    Ok(sent)
}

/// Clock out and discard the wait-state bytes required by `command`
pub fn skip_wait_states<B: SpiBus + ?Sized>(
    session: &mut Session<'_, B>,
    command: ReadCommand,
) -> Result<()> {
    let mut wait = [0u8; MAX_HEADER_LEN];
    let count = command.wait_bytes();
    if count > wait.len() {
        return Err(Error::BufferTooSmall);
    }
    if count > 0 {
        session.read(&mut wait[..count])?;
    }
    Ok(())
}
