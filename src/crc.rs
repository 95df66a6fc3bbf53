//! Dallas/Maxim CRC8 (polynomial x^8 + x^5 + x^4 + 1, reflected as `0x8C`).

use crate::Error;
use core::fmt::Debug;

/// Continue a CRC8 over `data`, starting from `crc`.
pub fn compute_partial_crc8(crc: u8, data: &[u8]) -> u8 {
    let mut crc = crc;
    for byte in data.iter() {
        let mut byte = *byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0x00 {
                crc ^= 0x8C;
            }
            byte >>= 1;
        }
    }
    crc
}

pub fn compute_crc8(data: &[u8]) -> u8 {
    compute_partial_crc8(0, data)
}

/// Check `data` against a received checksum.
///
/// Returns `Error::CrcMismatch(computed, received)` when they differ.
pub fn ensure_correct_crc8<E: Debug>(data: &[u8], crc8: u8) -> Result<(), Error<E>> {
    let computed = compute_crc8(data);
    if computed != crc8 {
        Err(Error::CrcMismatch(computed, crc8))
    } else {
        Ok(())
    }
}
