//! BME280 combined pressure, temperature and humidity sensor on I2C.
//!
//! Typical use: [`Bme280::init`] once, then [`Bme280::measure`] whenever a
//! reading is needed (after [`Bme280::trigger`] in forced mode).

use byteorder::{BigEndian, ByteOrder};
use core::fmt::Debug;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::{Error, Event, Observer};

pub mod calibration;
pub mod compensation;
pub mod config;

pub use calibration::CalibrationTable;
pub use compensation::{Measurement, TFine};
pub use config::{Filter, MeasurementTiming, Mode, Oversampling, SensorConfig, Standby};

use calibration::{HUMIDITY_LEN, TEMP_PRESS_LEN};

/// SDO tied to GND
pub const PRIMARY_ADDRESS: u8 = 0x76;
/// SDO tied to VDDIO
pub const SECONDARY_ADDRESS: u8 = 0x77;

pub const CHIP_ID: u8 = 0x60;
/// Chip ids of the BMP280 samples and production parts
pub const BMP280_CHIP_IDS: [u8; 2] = [0x56, 0x58];
pub const SOFT_RESET: u8 = 0xB6;
/// Power-on time after a soft reset
pub const STARTUP_DELAY_MS: u32 = 2;
/// Status polls, one per millisecond, covering the longest conversion
pub const MAX_STATUS_POLLS: u16 = 150;

const STATUS_MEASURING: u8 = 0x08;
const STATUS_IM_UPDATE: u8 = 0x01;

#[derive(Clone, Copy, Debug)]
#[repr(u8)]
enum Register {
    CalibTempPress = 0x88,
    CalibH1 = 0xA1,
    ChipId = 0xD0,
    Reset = 0xE0,
    CalibHumidity = 0xE1,
    CtrlHum = 0xF2,
    Status = 0xF3,
    CtrlMeas = 0xF4,
    Config = 0xF5,
    Data = 0xF7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipId {
    Recognized,
    WrongSensorDetected(u8),
    Corrupt(u8),
}

impl From<u8> for ChipId {
    fn from(id: u8) -> Self {
        match id {
            CHIP_ID => ChipId::Recognized,
            id if BMP280_CHIP_IDS.contains(&id) => ChipId::WrongSensorDetected(id),
            id => ChipId::Corrupt(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    Idle,
    Measuring,
    CopyingNvm,
    MeasuringAndCopying,
    /// A reserved bit is set
    Corrupt(u8),
}

impl From<u8> for Status {
    fn from(raw: u8) -> Self {
        if raw & !(STATUS_MEASURING | STATUS_IM_UPDATE) != 0 {
            return Status::Corrupt(raw);
        }
        match (raw & STATUS_MEASURING != 0, raw & STATUS_IM_UPDATE != 0) {
            (false, false) => Status::Idle,
            (true, false) => Status::Measuring,
            (false, true) => Status::CopyingNvm,
            (true, true) => Status::MeasuringAndCopying,
        }
    }
}

/// Uncompensated ADC values of one conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSample {
    /// 20 bit
    pub pressure: u32,
    /// 20 bit
    pub temperature: u32,
    pub humidity: u16,
}

impl RawSample {
    /// Decode the burst starting at `press_msb`
    pub fn from_registers(data: &[u8; 8]) -> Self {
        let adc20 = |msb: u8, lsb: u8, xlsb: u8| {
            (u32::from(msb) << 12) | (u32::from(lsb) << 4) | (u32::from(xlsb) >> 4)
        };
        RawSample {
            pressure: adc20(data[0], data[1], data[2]),
            temperature: adc20(data[3], data[4], data[5]),
            humidity: BigEndian::read_u16(&data[6..]),
        }
    }
}

pub struct Bme280<I2C, O = ()> {
    i2c: I2C,
    address: u8,
    calibration: Option<CalibrationTable>,
    /// Last mode written to `ctrl_meas`
    mode: Mode,
    observer: O,
}

impl<I2C: I2c> Bme280<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self::with_observer(i2c, address, ())
    }
}

impl<E: Debug, I2C: I2c<Error = E>, O: Observer> Bme280<I2C, O> {
    pub fn with_observer(i2c: I2C, address: u8, observer: O) -> Self {
        Bme280 {
            i2c,
            address,
            calibration: None,
            mode: Mode::Sleep,
            observer,
        }
    }

    /// Give back the bus and the observer
    pub fn release(self) -> (I2C, O) {
        (self.i2c, self.observer)
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// The table read by the last [`Bme280::load_calibration`]
    pub fn calibration(&self) -> Option<&CalibrationTable> {
        self.calibration.as_ref()
    }

    /// Identify, reset, load the trimming values and apply `config`
    pub fn init(
        &mut self,
        delay: &mut impl DelayNs,
        config: &SensorConfig,
    ) -> Result<(), Error<E>> {
        match self.identify()? {
            ChipId::Recognized => {}
            ChipId::WrongSensorDetected(id) => return Err(Error::WrongSensor(id)),
            ChipId::Corrupt(id) => return Err(Error::CorruptChipId(id)),
        }
        self.soft_reset()?;
        delay.delay_ms(STARTUP_DELAY_MS);
        self.wait_until_ready(delay, MAX_STATUS_POLLS)?;
        self.load_calibration()?;
        self.configure(config)
    }

    pub fn identify(&mut self) -> Result<ChipId, Error<E>> {
        let id = self.read_register(Register::ChipId)?;
        self.observer.notify(Event::ChipId(id));
        Ok(ChipId::from(id))
    }

    /// Does not wait, give the chip [`STARTUP_DELAY_MS`] before talking to it again
    pub fn soft_reset(&mut self) -> Result<(), Error<E>> {
        self.write_register(Register::Reset, SOFT_RESET)?;
        self.mode = Mode::Sleep;
        self.observer.notify(Event::SoftReset);
        Ok(())
    }

    pub fn load_calibration(&mut self) -> Result<CalibrationTable, Error<E>> {
        let mut temp_press = [0u8; TEMP_PRESS_LEN];
        self.read_registers(Register::CalibTempPress, &mut temp_press)?;
        let dig_h1 = self.read_register(Register::CalibH1)?;
        let mut humidity = [0u8; HUMIDITY_LEN];
        self.read_registers(Register::CalibHumidity, &mut humidity)?;

        let table = CalibrationTable::from_registers(&temp_press, dig_h1, &humidity);
        self.calibration = Some(table);
        self.observer.notify(Event::CalibrationLoaded);
        Ok(table)
    }

    /// `ctrl_hum` only takes effect after a write to `ctrl_meas`, so it goes first
    pub fn configure(&mut self, config: &SensorConfig) -> Result<(), Error<E>> {
        self.update_register(Register::CtrlHum, |current| config.ctrl_hum(current))?;
        self.update_register(Register::CtrlMeas, |current| config.ctrl_meas(current))?;
        self.mode = config.mode;
        self.update_register(Register::Config, |current| config.config(current))
    }

    pub fn read_config(&mut self) -> Result<SensorConfig, Error<E>> {
        let ctrl_hum = self.read_register(Register::CtrlHum)?;
        let ctrl_meas = self.read_register(Register::CtrlMeas)?;
        let config = self.read_register(Register::Config)?;
        Ok(SensorConfig::from_registers(ctrl_hum, ctrl_meas, config))
    }

    pub fn set_mode(&mut self, mode: Mode) -> Result<(), Error<E>> {
        self.update_register(Register::CtrlMeas, |current| {
            config::MODE.set(current, mode as u8)
        })?;
        self.mode = mode;
        Ok(())
    }

    /// Start a single conversion, the chip falls back to sleep afterwards
    pub fn trigger(&mut self) -> Result<(), Error<E>> {
        self.set_mode(Mode::Forced)
    }

    pub fn poll_status(&mut self) -> Result<Status, Error<E>> {
        let raw = self.read_register(Register::Status)?;
        self.observer.notify(Event::Status(raw));
        Ok(Status::from(raw))
    }

    /// Poll the status once per millisecond until neither a conversion nor
    /// an NVM copy is running. Returns the number of waits.
    pub fn wait_until_ready(
        &mut self,
        delay: &mut impl DelayNs,
        max_polls: u16,
    ) -> Result<u16, Error<E>> {
        self.wait_while(delay, max_polls, |status| status != Status::Idle)
    }

    fn wait_while(
        &mut self,
        delay: &mut impl DelayNs,
        max_polls: u16,
        busy: impl Fn(Status) -> bool,
    ) -> Result<u16, Error<E>> {
        for polls in 0..max_polls {
            match self.poll_status()? {
                Status::Corrupt(raw) => return Err(Error::CorruptStatus(raw)),
                status if busy(status) => delay.delay_ms(1),
                _ => return Ok(polls),
            }
        }
        Err(Error::StatusTimeout)
    }

    pub fn read_raw(&mut self) -> Result<RawSample, Error<E>> {
        let mut data = [0u8; 8];
        self.read_registers(Register::Data, &mut data)?;
        let raw = RawSample::from_registers(&data);
        self.observer.notify(Event::RawSample {
            pressure: raw.pressure,
            temperature: raw.temperature,
            humidity: raw.humidity,
        });
        Ok(raw)
    }

    pub fn compensate(&mut self, raw: &RawSample) -> Result<Measurement, Error<E>> {
        let table = self.calibration.ok_or(Error::InvalidCalibration)?;
        let measurement = table.compensate(raw);
        self.observer.notify(Event::Measurement {
            temperature: measurement.temperature,
            pressure: measurement.pressure,
            humidity: measurement.humidity,
        });
        Ok(measurement)
    }

    /// Wait for the running conversion and compensate its result.
    ///
    /// In normal mode the data registers are shadowed, so only a running NVM
    /// copy delays the read.
    pub fn measure(&mut self, delay: &mut impl DelayNs) -> Result<Measurement, Error<E>> {
        if self.mode == Mode::Normal {
            self.wait_while(delay, MAX_STATUS_POLLS, |status| {
                matches!(status, Status::CopyingNvm | Status::MeasuringAndCopying)
            })?;
        } else {
            self.wait_until_ready(delay, MAX_STATUS_POLLS)?;
        }
        let raw = self.read_raw()?;
        self.compensate(&raw)
    }

    fn read_register(&mut self, register: Register) -> Result<u8, Error<E>> {
        let mut value = [0u8];
        self.read_registers(register, &mut value)?;
        Ok(value[0])
    }

    fn read_registers(&mut self, register: Register, dst: &mut [u8]) -> Result<(), Error<E>> {
        self.i2c.write_read(self.address, &[register as u8], dst)?;
        Ok(())
    }

    fn write_register(&mut self, register: Register, value: u8) -> Result<(), Error<E>> {
        self.i2c.write(self.address, &[register as u8, value])?;
        self.observer.notify(Event::RegisterWritten {
            register: register as u8,
            value,
        });
        Ok(())
    }

    fn update_register(
        &mut self,
        register: Register,
        update: impl FnOnce(u8) -> u8,
    ) -> Result<(), Error<E>> {
        let current = self.read_register(register)?;
        self.write_register(register, update(current))
    }
}
