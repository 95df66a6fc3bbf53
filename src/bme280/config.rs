//! Measurement settings and the datasheet timing model.

use crate::register::Field;

pub(crate) const OSRS_H: Field = Field::new(0x07, 0);
pub(crate) const OSRS_T: Field = Field::new(0xE0, 5);
pub(crate) const OSRS_P: Field = Field::new(0x1C, 2);
pub(crate) const MODE: Field = Field::new(0x03, 0);
pub(crate) const T_SB: Field = Field::new(0xE0, 5);
pub(crate) const FILTER: Field = Field::new(0x1C, 2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Oversampling {
    Skip = 0b000,
    X1 = 0b001,
    X2 = 0b010,
    X4 = 0b011,
    X8 = 0b100,
    X16 = 0b101,
}

impl Oversampling {
    pub fn factor(&self) -> u8 {
        match self {
            Oversampling::Skip => 0,
            Oversampling::X1 => 1,
            Oversampling::X2 => 2,
            Oversampling::X4 => 4,
            Oversampling::X8 => 8,
            Oversampling::X16 => 16,
        }
    }

    /// Codes above `0b101` also select x16
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => Oversampling::Skip,
            0b001 => Oversampling::X1,
            0b010 => Oversampling::X2,
            0b011 => Oversampling::X4,
            0b100 => Oversampling::X8,
            _ => Oversampling::X16,
        }
    }
}

/// IIR filter coefficient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Filter {
    Off = 0b000,
    X2 = 0b001,
    X4 = 0b010,
    X8 = 0b011,
    X16 = 0b100,
}

impl Filter {
    /// Samples needed to reach 75 % of a step input
    pub fn step_response_samples(&self) -> u8 {
        match self {
            Filter::Off => 1,
            Filter::X2 => 2,
            Filter::X4 => 5,
            Filter::X8 => 11,
            Filter::X16 => 22,
        }
    }

    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => Filter::Off,
            0b001 => Filter::X2,
            0b010 => Filter::X4,
            0b011 => Filter::X8,
            _ => Filter::X16,
        }
    }
}

/// Inactive period between conversions in normal mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Standby {
    Ms0_5 = 0b000,
    Ms62_5 = 0b001,
    Ms125 = 0b010,
    Ms250 = 0b011,
    Ms500 = 0b100,
    Ms1000 = 0b101,
    Ms10 = 0b110,
    Ms20 = 0b111,
}

impl Standby {
    pub fn millis(&self) -> f32 {
        match self {
            Standby::Ms0_5 => 0.5,
            Standby::Ms62_5 => 62.5,
            Standby::Ms125 => 125.0,
            Standby::Ms250 => 250.0,
            Standby::Ms500 => 500.0,
            Standby::Ms1000 => 1000.0,
            Standby::Ms10 => 10.0,
            Standby::Ms20 => 20.0,
        }
    }

    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => Standby::Ms0_5,
            0b001 => Standby::Ms62_5,
            0b010 => Standby::Ms125,
            0b011 => Standby::Ms250,
            0b100 => Standby::Ms500,
            0b101 => Standby::Ms1000,
            0b110 => Standby::Ms10,
            _ => Standby::Ms20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Mode {
    Sleep = 0b00,
    Forced = 0b01,
    Normal = 0b11,
}

impl Mode {
    /// Both `0b01` and `0b10` mean forced
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Mode::Sleep,
            0b11 => Mode::Normal,
            _ => Mode::Forced,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorConfig {
    pub temperature_oversampling: Oversampling,
    pub pressure_oversampling: Oversampling,
    pub humidity_oversampling: Oversampling,
    pub filter: Filter,
    pub standby: Standby,
    pub mode: Mode,
}

impl Default for SensorConfig {
    /// Continuous sampling tuned for slow moving pipe conditions
    fn default() -> Self {
        SensorConfig {
            temperature_oversampling: Oversampling::X2,
            pressure_oversampling: Oversampling::X16,
            humidity_oversampling: Oversampling::X1,
            filter: Filter::X16,
            standby: Standby::Ms0_5,
            mode: Mode::Normal,
        }
    }
}

/// Estimated conversion timing, see datasheet appendix B
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MeasurementTiming {
    pub typical_ms: f32,
    pub max_ms: f32,
    pub output_data_rate_hz: f32,
    pub iir_step_response_ms: f32,
}

impl SensorConfig {
    pub(crate) fn ctrl_hum(&self, current: u8) -> u8 {
        OSRS_H.set(current, self.humidity_oversampling as u8)
    }

    pub(crate) fn ctrl_meas(&self, current: u8) -> u8 {
        let value = OSRS_T.set(current, self.temperature_oversampling as u8);
        let value = OSRS_P.set(value, self.pressure_oversampling as u8);
        MODE.set(value, self.mode as u8)
    }

    pub(crate) fn config(&self, current: u8) -> u8 {
        let value = T_SB.set(current, self.standby as u8);
        FILTER.set(value, self.filter as u8)
    }

    pub fn from_registers(ctrl_hum: u8, ctrl_meas: u8, config: u8) -> Self {
        SensorConfig {
            temperature_oversampling: Oversampling::from_bits(OSRS_T.get(ctrl_meas)),
            pressure_oversampling: Oversampling::from_bits(OSRS_P.get(ctrl_meas)),
            humidity_oversampling: Oversampling::from_bits(OSRS_H.get(ctrl_hum)),
            filter: Filter::from_bits(FILTER.get(config)),
            standby: Standby::from_bits(T_SB.get(config)),
            mode: Mode::from_bits(MODE.get(ctrl_meas)),
        }
    }

    pub fn timing(&self) -> MeasurementTiming {
        let os_t = f32::from(self.temperature_oversampling.factor());
        let os_p = f32::from(self.pressure_oversampling.factor());
        let os_h = f32::from(self.humidity_oversampling.factor());

        let mut typical_ms = 1.0 + 2.0 * os_t;
        let mut max_ms = 1.25 + 2.3 * os_t;
        // pressure and humidity add their setup time only when enabled
        if self.pressure_oversampling != Oversampling::Skip {
            typical_ms += 2.0 * os_p + 0.5;
            max_ms += 2.3 * os_p + 0.575;
        }
        if self.humidity_oversampling != Oversampling::Skip {
            typical_ms += 2.0 * os_h + 0.5;
            max_ms += 2.3 * os_h + 0.575;
        }

        let output_data_rate_hz = match self.mode {
            Mode::Normal => 1000.0 / (max_ms + self.standby.millis()),
            Mode::Forced | Mode::Sleep => 1000.0 / max_ms,
        };
        let iir_step_response_ms =
            1000.0 * f32::from(self.filter.step_response_samples()) / output_data_rate_hz;

        MeasurementTiming {
            typical_ms,
            max_ms,
            output_data_rate_hz,
            iir_step_response_ms,
        }
    }
}
