use byteorder::{ByteOrder, LittleEndian};
use embedded_hal::delay::DelayNs;

use crate::crc::{compute_crc8, ensure_correct_crc8};
use crate::{Command as RomCommand, Driver, Error, Event, IoWire, Observer, OpCode};

/// Family code in the first ROM byte
pub const FAMILY_CODE: u8 = 0x28;

/// Worst case 12 bit conversion, one poll per millisecond
pub const CONVERSION_POLL_LIMIT: u16 = 750;

#[derive(Clone, Copy, Debug)]
#[repr(u8)]
pub enum Command {
    Convert = 0x44,
    WriteScratchpad = 0x4e,
    ReadScratchpad = 0xBE,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}

/// Configuration register values, named by the resolution in degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MeasureResolution {
    TC8 = 0b0001_1111,
    TC4 = 0b0011_1111,
    TC2 = 0b0101_1111,
    #[default]
    TC = 0b0111_1111,
}

impl MeasureResolution {
    /// Decode the configuration byte, bits 5 and 6 select the resolution
    pub fn from_config(config: u8) -> Self {
        match (config >> 5) & 0b11 {
            0b00 => MeasureResolution::TC8,
            0b01 => MeasureResolution::TC4,
            0b10 => MeasureResolution::TC2,
            _ => MeasureResolution::TC,
        }
    }
}

/// The 9 byte scratchpad as clocked out of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Scratchpad([u8; 9]);

impl From<[u8; 9]> for Scratchpad {
    fn from(raw: [u8; 9]) -> Self {
        Scratchpad(raw)
    }
}

impl Scratchpad {
    pub fn as_bytes(&self) -> &[u8; 9] {
        &self.0
    }

    pub fn crc(&self) -> u8 {
        self.0[8]
    }

    pub fn is_valid(&self) -> bool {
        compute_crc8(&self.0[..8]) == self.crc()
    }

    pub fn validate<E: core::fmt::Debug>(&self) -> Result<(), Error<E>> {
        ensure_correct_crc8(&self.0[..8], self.crc())
    }

    /// Raw reading in 1/16 °C; the lowest bits are undefined below 12 bit resolution
    pub fn raw_temperature(&self) -> i16 {
        LittleEndian::read_i16(&self.0[0..2])
    }

    pub fn temperature(&self) -> f32 {
        f32::from(self.raw_temperature()) / 16_f32
    }

    /// High and low alarm thresholds
    pub fn alarm_thresholds(&self) -> (i8, i8) {
        (self.0[2] as i8, self.0[3] as i8)
    }

    pub fn resolution(&self) -> MeasureResolution {
        MeasureResolution::from_config(self.0[4])
    }
}

/// A single DS18B20 on a single-drop bus, addressed with Skip ROM
#[derive(Debug, Clone, Copy, Default)]
pub struct Ds18b20 {
    resolution: MeasureResolution,
}

impl Ds18b20 {
    pub fn new(resolution: MeasureResolution) -> Self {
        Ds18b20 { resolution }
    }

    pub fn resolution(&self) -> MeasureResolution {
        self.resolution
    }

    /// Check presence and write the resolution, both alarm thresholds are cleared
    pub fn initialize<W: IoWire, O: Observer>(
        &self,
        driver: &mut Driver<W, O>,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<W::Error>> {
        driver.reset_skip_write_only(
            delay,
            &[
                Command::WriteScratchpad.op_code(),
                0x00,
                0x00,
                self.resolution as u8,
            ],
        )
    }

    /// Start a conversion and poll until the device releases the wire.
    ///
    /// Returns the milliseconds waited.
    pub fn trigger_conversion<W: IoWire, O: Observer>(
        &self,
        driver: &mut Driver<W, O>,
        delay: &mut impl DelayNs,
    ) -> Result<u16, Error<W::Error>> {
        driver.reset_skip_write_only(delay, &[Command::Convert.op_code()])?;
        for elapsed_ms in 0..CONVERSION_POLL_LIMIT {
            if driver.read_bit(delay)? {
                driver.notify(Event::ConversionDone { elapsed_ms });
                return Ok(elapsed_ms);
            }
            delay.delay_ms(1);
        }
        driver.notify(Event::ConversionTimeout);
        Err(Error::ConversionTimeout)
    }

    /// Clock out the scratchpad without checking it
    pub fn read_scratchpad<W: IoWire, O: Observer>(
        &self,
        driver: &mut Driver<W, O>,
        delay: &mut impl DelayNs,
    ) -> Result<Scratchpad, Error<W::Error>> {
        let mut scratchpad = [0u8; 9];
        driver.reset_skip_write_read(
            delay,
            &[Command::ReadScratchpad.op_code()],
            &mut scratchpad[..],
        )?;
        Ok(Scratchpad(scratchpad))
    }

    /// Read the last conversion result, discarded on checksum mismatch
    pub fn read_temperature<W: IoWire, O: Observer>(
        &self,
        driver: &mut Driver<W, O>,
        delay: &mut impl DelayNs,
    ) -> Result<f32, Error<W::Error>> {
        let scratchpad = self.read_scratchpad(driver, delay)?;
        if let Err(error) = scratchpad.validate() {
            if let Error::CrcMismatch(computed, expected) = error {
                driver.notify(Event::CrcMismatch { computed, expected });
            }
            return Err(error);
        }
        driver.notify(Event::Temperature(scratchpad.raw_temperature()));
        Ok(scratchpad.temperature())
    }

    pub fn measure<W: IoWire, O: Observer>(
        &self,
        driver: &mut Driver<W, O>,
        delay: &mut impl DelayNs,
    ) -> Result<f32, Error<W::Error>> {
        self.trigger_conversion(driver, delay)?;
        self.read_temperature(driver, delay)
    }

    /// Read the ROM code of the only device on the wire
    pub fn read_rom<W: IoWire, O: Observer>(
        driver: &mut Driver<W, O>,
        delay: &mut impl DelayNs,
    ) -> Result<[u8; 8], Error<W::Error>> {
        let mut rom = [0u8; 8];
        driver.reset_write_read(delay, &[RomCommand::ReadRom.op_code()], &mut rom)?;
        ensure_correct_crc8(&rom[..7], rom[7])?;
        if rom[0] != FAMILY_CODE {
            return Err(Error::FamilyCodeMismatch(FAMILY_CODE, rom[0]));
        }
        Ok(rom)
    }
}

/// Split raw value to two parts: integer and fraction N
/// Original value may be calculated as: integer + fraction/10000
pub fn split_temp(temperature: i16) -> (i16, i16) {
    if temperature >= 0 {
        (temperature >> 4, (temperature & 0xF) * 625)
    } else {
        let abs = temperature.unsigned_abs();
        (-((abs >> 4) as i16), -625 * (abs & 0xF) as i16)
    }
}
