use byteorder::{ByteOrder, LittleEndian};

/// Length of the temperature and pressure trimming block at `0x88`
pub const TEMP_PRESS_LEN: usize = 24;
/// Length of the humidity trimming block at `0xE1`
pub const HUMIDITY_LEN: usize = 7;

/// Factory trimming parameters, unique to every chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationTable {
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,
    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,
    pub dig_h1: u8,
    pub dig_h2: i16,
    pub dig_h3: u8,
    pub dig_h4: i16,
    pub dig_h5: i16,
    pub dig_h6: i8,
}

impl CalibrationTable {
    /// Decode the bursts read at `0x88` and `0xE1` plus `dig_h1` from `0xA1`.
    pub fn from_registers(
        temp_press: &[u8; TEMP_PRESS_LEN],
        dig_h1: u8,
        humidity: &[u8; HUMIDITY_LEN],
    ) -> Self {
        let p = |index: usize| LittleEndian::read_i16(&temp_press[6 + 2 * index..]);

        // H4 and H5 are 12 bit values sharing the nibbles of 0xE5
        let e4 = humidity[3] as i8 as i16;
        let e5 = humidity[4] as i16;
        let e6 = humidity[5] as i8 as i16;

        CalibrationTable {
            dig_t1: LittleEndian::read_u16(&temp_press[0..]),
            dig_t2: LittleEndian::read_i16(&temp_press[2..]),
            dig_t3: LittleEndian::read_i16(&temp_press[4..]),
            dig_p1: LittleEndian::read_u16(&temp_press[6..]),
            dig_p2: p(1),
            dig_p3: p(2),
            dig_p4: p(3),
            dig_p5: p(4),
            dig_p6: p(5),
            dig_p7: p(6),
            dig_p8: p(7),
            dig_p9: p(8),
            dig_h1,
            dig_h2: LittleEndian::read_i16(&humidity[0..]),
            dig_h3: humidity[2],
            dig_h4: (e4 << 4) | (e5 & 0x0F),
            dig_h5: (e6 << 4) | (e5 >> 4),
            dig_h6: humidity[6] as i8,
        }
    }
}
