//! Test pattern generation and comparison

/// Fill `buf` with the incrementing pattern `index mod 256`
pub fn fill(buf: &mut [u8]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte = i as u8;
    }
}

/// A byte that did not survive the round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    /// Offset into the transfer buffer
    pub index: usize,
    /// Byte that was written
    pub expected: u8,
    /// Byte that was read back
    pub actual: u8,
}

/// Iterate over every differing position of two equally long buffers
///
/// If the lengths differ, only the common prefix is compared.
pub fn mismatches<'a>(
    expected: &'a [u8],
    actual: &'a [u8],
) -> impl Iterator<Item = Mismatch> + 'a {
    expected
        .iter()
        .zip(actual)
        .enumerate()
        .filter(|(_, (e, a))| e != a)
        .map(|(index, (&expected, &actual))| Mismatch {
            index,
            expected,
            actual,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    #[test]
    fn pattern_wraps_every_256_bytes() {
        let mut buf = [0xEEu8; 600];
        fill(&mut buf);
        assert!(buf.iter().enumerate().all(|(i, &b)| b == (i % 256) as u8));
        assert_eq!(buf[255], 0xFF);
        assert_eq!(buf[256], 0x00);
        assert_eq!(buf[599], (599 % 256) as u8);
    }

    #[test]
    fn identical_buffers_have_no_mismatches() {
        let mut a = [0u8; 64];
        fill(&mut a);
        assert_eq!(mismatches(&a, &a).count(), 0);
    }

    #[test]
    fn reports_each_differing_byte() {
        let mut expected = [0u8; 8];
        fill(&mut expected);
        let mut actual = expected;
        actual[2] = 0x42;
        actual[7] = 0x00;

        let found: Vec<_> = mismatches(&expected, &actual).collect();
        assert_eq!(
            found,
            [
                Mismatch {
                    index: 2,
                    expected: 2,
                    actual: 0x42
                },
                Mismatch {
                    index: 7,
                    expected: 7,
                    actual: 0
                },
            ]
        );
    }
}
