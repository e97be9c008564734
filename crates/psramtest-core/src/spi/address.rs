//! Address width types

use crate::error::{Error, Result};

/// Address width for PSRAM commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressWidth {
    /// No address phase
    #[default]
    None,
    /// 3-byte (24-bit) address, big-endian
    ThreeByte,
}

impl AddressWidth {
    /// Returns the number of address bytes
    pub const fn bytes(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::ThreeByte => 3,
        }
    }

    /// Returns the maximum addressable size in bytes
    pub const fn max_size(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::ThreeByte => 16 * 1024 * 1024, // 16 MiB
        }
    }

    /// Encode an address into bytes, most significant byte first
    ///
    /// Fails if the address does not fit in the field.
    pub fn encode(&self, address: u32, buf: &mut [u8]) -> Result<()> {
        match self {
            Self::None => Ok(()),
            Self::ThreeByte => {
                if address >= self.max_size() {
                    return Err(Error::AddressOutOfBounds);
                }
                if buf.len() < 3 {
                    return Err(Error::BufferTooSmall);
                }
                buf[0] = (address >> 16) as u8;
                buf[1] = (address >> 8) as u8;
                buf[2] = address as u8;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_byte_is_big_endian() {
        let mut buf = [0u8; 3];
        AddressWidth::ThreeByte.encode(0x12_3456, &mut buf).unwrap();
        assert_eq!(buf, [0x12, 0x34, 0x56]);
    }

    #[test]
    fn rejects_address_beyond_24_bits() {
        let mut buf = [0u8; 3];
        assert_eq!(
            AddressWidth::ThreeByte.encode(0x0100_0000, &mut buf),
            Err(Error::AddressOutOfBounds)
        );
    }

    #[test]
    fn none_writes_nothing() {
        let mut buf = [0xAAu8; 3];
        AddressWidth::None.encode(0x12_3456, &mut buf).unwrap();
        assert_eq!(buf, [0xAA; 3]);
        assert_eq!(AddressWidth::None.bytes(), 0);
    }
}
