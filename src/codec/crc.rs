//! CRC-16/CCITT-FALSE checksum.
//!
//! Polynomial `0x1021`, initial value `0xFFFF`, no input or output
//! reflection, no final XOR. The check value for `"123456789"` is `0x29B1`.

/// Initial register value.
pub const CRC16_INIT: u16 = 0xFFFF;

/// Generator polynomial.
pub const CRC16_POLY: u16 = 0x1021;

const TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0_u16; 256];
    let mut i = 0;
    while i < 256 {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "i < 256 so the shifted value fits in u16"
        )]
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 == 0 {
                crc << 1
            } else {
                (crc << 1) ^ CRC16_POLY
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Incremental CRC-16 computation.
///
/// Lets the checksum span several non-contiguous slices, such as a header
/// rebuilt with its CRC field zeroed followed by the body still sitting in
/// the receive buffer.
#[derive(Clone, Copy, Debug)]
pub struct Crc16(u16);

impl Crc16 {
    /// Start a new computation.
    #[must_use]
    pub const fn new() -> Self { Self(CRC16_INIT) }

    /// Feed `bytes` into the checksum.
    pub fn update(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            let index = usize::from(self.0.to_be_bytes()[0] ^ byte);
            self.0 = (self.0 << 8) ^ TABLE[index];
        }
    }

    /// Final checksum value.
    #[must_use]
    pub const fn finish(self) -> u16 { self.0 }
}

impl Default for Crc16 {
    fn default() -> Self { Self::new() }
}

/// Compute the checksum of a single contiguous slice.
#[must_use]
pub fn crc16(bytes: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update(bytes);
    crc.finish()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    /// Bitwise reference implementation used to cross-check the table.
    fn crc16_bitwise(bytes: &[u8]) -> u16 {
        let mut crc = CRC16_INIT;
        for &byte in bytes {
            crc ^= u16::from(byte) << 8;
            for _ in 0..8 {
                crc = if crc & 0x8000 == 0 {
                    crc << 1
                } else {
                    (crc << 1) ^ CRC16_POLY
                };
            }
        }
        crc
    }

    #[test]
    fn matches_catalogue_check_value() {
        assert_eq!(crc16(b"123456789"), 0x29B1);
    }

    #[test]
    fn empty_input_yields_initial_value() {
        assert_eq!(crc16(&[]), CRC16_INIT);
    }

    #[rstest]
    #[case(&b"hello world"[..])]
    #[case(&[0x00, 0xFF, 0x10, 0x21][..])]
    #[case(&b"{\"page\":1}"[..])]
    fn table_agrees_with_bitwise_reference(#[case] input: &[u8]) {
        assert_eq!(crc16(input), crc16_bitwise(input));
    }

    #[test]
    fn incremental_updates_match_one_shot() {
        let data = b"split across several updates";
        let mut crc = Crc16::new();
        crc.update(&data[..5]);
        crc.update(&data[5..17]);
        crc.update(&data[17..]);
        assert_eq!(crc.finish(), crc16(data));
    }
}
