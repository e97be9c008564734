//! PSRAM command framing

use heapless::Vec;

use super::{opcodes, AddressWidth};
use crate::error::{Error, Result};

/// Longest command header: opcode plus a 3-byte address
pub const MAX_HEADER_LEN: usize = 4;

/// Opcode and address of a single PSRAM command
///
/// A command does not own its payload: the header is clocked out first and
/// payload or read data follow within the same bus session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Command {
    /// The opcode byte
    pub opcode: u8,

    /// Address (if any)
    pub address: Option<u32>,

    /// Address width
    pub address_width: AddressWidth,
}

impl Command {
    /// Create a command with no address (e.g., RESET_ENABLE, RESET)
    pub const fn simple(opcode: u8) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
        }
    }

    /// Create a command with a 3-byte address
    pub const fn with_address(opcode: u8, address: u32) -> Self {
        Self {
            opcode,
            address: Some(address),
            address_width: AddressWidth::ThreeByte,
        }
    }

    /// WRITE starting at `address`
    pub const fn write(address: u32) -> Self {
        Self::with_address(opcodes::WRITE, address)
    }

    /// READ starting at `address`
    pub const fn read(address: u32) -> Self {
        Self::with_address(opcodes::READ, address)
    }

    /// FAST_READ starting at `address`
    pub const fn fast_read(address: u32) -> Self {
        Self::with_address(opcodes::FAST_READ, address)
    }

    /// READ_ID, whose address field carries three don't-care bytes
    pub const fn read_id() -> Self {
        Self::with_address(opcodes::READ_ID, 0)
    }

    /// Number of header bytes (opcode + address)
    pub fn header_len(&self) -> usize {
        1 + self.address_width.bytes() as usize
    }

    /// Encode opcode and address into `buf`, returning the header length
    pub fn encode_header(&self, buf: &mut [u8]) -> Result<usize> {
        let len = self.header_len();
        if buf.len() < len {
            return Err(Error::BufferTooSmall);
        }
        buf[0] = self.opcode;
        if let Some(address) = self.address {
            self.address_width.encode(address, &mut buf[1..len])?;
        }
        Ok(len)
    }

    /// The encoded header as a fixed-capacity vector
    pub fn header(&self) -> Result<Vec<u8, MAX_HEADER_LEN>> {
        let mut buf = [0u8; MAX_HEADER_LEN];
        let len = self.encode_header(&mut buf)?;
        Vec::from_slice(&buf[..len]).map_err(|_| Error::BufferTooSmall)
    }

    /// Header followed by `payload` in one frame, for single-transfer writes
    pub fn frame<const N: usize>(&self, payload: &[u8]) -> Result<Vec<u8, N>> {
        let mut frame: Vec<u8, N> =
            Vec::from_slice(&self.header()?).map_err(|_| Error::BufferTooSmall)?;
        frame
            .extend_from_slice(payload)
            .map_err(|_| Error::BufferTooSmall)?;
        Ok(frame)
    }
}

/// The read command used for read-back
///
/// Both are supported by the device; they differ only in whether a
/// wait-state byte must be clocked before data is valid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ReadCommand {
    /// READ (0x03): data follows the address immediately
    Read,
    /// FAST_READ (0x0B): one wait-state byte follows the address
    #[default]
    FastRead,
}

impl ReadCommand {
    /// Opcode sent for this read command
    pub const fn opcode(&self) -> u8 {
        match self {
            Self::Read => opcodes::READ,
            Self::FastRead => opcodes::FAST_READ,
        }
    }

    /// Number of throwaway bytes to read before the first valid data byte
    pub const fn wait_bytes(&self) -> usize {
        match self {
            Self::Read => 0,
            Self::FastRead => 1,
        }
    }

    /// The command for a read starting at `address`
    pub const fn command(&self, address: u32) -> Command {
        Command::with_address(self.opcode(), address)
    }

    /// Short human-readable name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::FastRead => "FAST_READ",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_header_is_opcode_then_big_endian_address() {
        let header = Command::write(0x01_0203).header().unwrap();
        assert_eq!(header.as_slice(), &[opcodes::WRITE, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn read_and_fast_read_share_framing() {
        for (cmd, opcode) in [
            (Command::read(0xAB_CDEF), opcodes::READ),
            (Command::fast_read(0xAB_CDEF), opcodes::FAST_READ),
        ] {
            assert_eq!(cmd.header_len(), 4);
            assert_eq!(cmd.header().unwrap().as_slice(), &[opcode, 0xAB, 0xCD, 0xEF]);
        }
    }

    #[test]
    fn read_id_sends_three_dont_care_bytes() {
        let header = Command::read_id().header().unwrap();
        assert_eq!(header.as_slice(), &[opcodes::READ_ID, 0, 0, 0]);
    }

    #[test]
    fn simple_command_has_no_address() {
        let header = Command::simple(opcodes::RESET_ENABLE).header().unwrap();
        assert_eq!(header.as_slice(), &[opcodes::RESET_ENABLE]);
    }

    #[test]
    fn small_write_frame() {
        let frame: Vec<u8, 8> = Command::write(0).frame(&[0xAA, 0xBB, 0xCC, 0xDD]).unwrap();
        assert_eq!(
            frame.as_slice(),
            &[0x02, 0x00, 0x00, 0x00, 0xAA, 0xBB, 0xCC, 0xDD]
        );
    }

    #[test]
    fn frame_too_small_is_an_error() {
        let frame: Result<Vec<u8, 6>> = Command::write(0).frame(&[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(frame, Err(Error::BufferTooSmall));
    }

    #[test]
    fn wait_bytes_per_read_command() {
        assert_eq!(ReadCommand::Read.wait_bytes(), 0);
        assert_eq!(ReadCommand::FastRead.wait_bytes(), 1);
        assert_eq!(ReadCommand::default(), ReadCommand::FastRead);
        assert_eq!(ReadCommand::Read.command(0x10).opcode, opcodes::READ);
    }
}
