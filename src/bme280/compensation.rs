//! Bosch fixed-point compensation, 32-bit integer variants.
//!
//! Intermediate values follow the reference C code, which relies on two's
//! complement wrap-around of `int32_t`/`uint32_t`, hence the wrapping operations.

use super::calibration::CalibrationTable;
use super::RawSample;

/// Fine resolution temperature shared by the pressure and humidity formulas.
///
/// Only produced by [`CalibrationTable::compensate_temperature`] so it always
/// belongs to a sample of the same table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TFine(i32);

impl TFine {
    pub fn value(&self) -> i32 {
        self.0
    }
}

pub const MIN_TEMPERATURE: i32 = -4000;
pub const MAX_TEMPERATURE: i32 = 8500;
/// 100 %RH in Q22.10
pub const MAX_HUMIDITY: u32 = 100 << 10;

/// Compensated reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    /// 0.01 °C
    pub temperature: i32,
    /// Pa
    pub pressure: u32,
    /// %RH in Q22.10
    pub humidity: u32,
}

impl Measurement {
    pub fn celsius(&self) -> f32 {
        self.temperature as f32 / 100.0
    }

    pub fn hectopascal(&self) -> f32 {
        self.pressure as f32 / 100.0
    }

    pub fn relative_humidity(&self) -> f32 {
        self.humidity as f32 / 1024.0
    }
}

impl CalibrationTable {
    /// Temperature in 0.01 °C, clamped to [-40, 85] °C
    pub fn compensate_temperature(&self, raw: &RawSample) -> (i32, TFine) {
        let adc_t = raw.temperature as i32;
        let t1 = i32::from(self.dig_t1);

        let var1 = ((adc_t >> 3).wrapping_sub(t1 << 1)).wrapping_mul(i32::from(self.dig_t2)) >> 11;
        let delta = (adc_t >> 4).wrapping_sub(t1);
        let var2 = ((delta.wrapping_mul(delta) >> 12).wrapping_mul(i32::from(self.dig_t3))) >> 14;
        let t_fine = var1.wrapping_add(var2);

        let temperature = t_fine.wrapping_mul(5).wrapping_add(128) >> 8;
        (
            temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE),
            TFine(t_fine),
        )
    }

    /// Pressure in Pa, 0 when the trimming values give a zero divisor
    pub fn compensate_pressure(&self, raw: &RawSample, t_fine: TFine) -> u32 {
        let adc_p = raw.pressure as i32;

        let var1 = (t_fine.0 >> 1).wrapping_sub(64000);
        let square = (var1 >> 2).wrapping_mul(var1 >> 2);
        let var2 = (square >> 11).wrapping_mul(i32::from(self.dig_p6));
        let var2 = var2.wrapping_add(var1.wrapping_mul(i32::from(self.dig_p5)) << 1);
        let var2 = (var2 >> 2).wrapping_add(i32::from(self.dig_p4) << 16);
        let var1 = ((i32::from(self.dig_p3).wrapping_mul(square >> 13) >> 3)
            .wrapping_add(i32::from(self.dig_p2).wrapping_mul(var1) >> 1))
            >> 18;
        let var1 = 32768_i32.wrapping_add(var1).wrapping_mul(i32::from(self.dig_p1)) >> 15;
        if var1 == 0 {
            return 0;
        }

        let p = (1_048_576_i32.wrapping_sub(adc_p) as u32)
            .wrapping_sub((var2 >> 12) as u32)
            .wrapping_mul(3125);
        let p = if p < 0x8000_0000 {
            (p << 1) / var1 as u32
        } else {
            (p / var1 as u32).wrapping_mul(2)
        };

        let var1 =
            i32::from(self.dig_p9).wrapping_mul(((p >> 3).wrapping_mul(p >> 3) >> 13) as i32) >> 12;
        let var2 = ((p >> 2) as i32).wrapping_mul(i32::from(self.dig_p8)) >> 13;
        let correction = var1
            .wrapping_add(var2)
            .wrapping_add(i32::from(self.dig_p7))
            >> 4;
        (p as i32).wrapping_add(correction) as u32
    }

    /// Relative humidity in %RH, clamped to [0, 100]
    pub fn compensate_humidity(&self, raw: &RawSample, t_fine: TFine) -> f64 {
        let var = f64::from(t_fine.0) - 76800.0;
        let h = (f64::from(raw.humidity)
            - (f64::from(self.dig_h4) * 64.0 + f64::from(self.dig_h5) / 16384.0 * var))
            * (f64::from(self.dig_h2) / 65536.0
                * (1.0
                    + f64::from(self.dig_h6) / 67_108_864.0
                        * var
                        * (1.0 + f64::from(self.dig_h3) / 67_108_864.0 * var)));
        let h = h * (1.0 - f64::from(self.dig_h1) * h / 524_288.0);
        h.clamp(0.0, 100.0)
    }

    /// Relative humidity in Q22.10 %RH, clamped to [0, 102400]
    pub fn compensate_humidity_fixed(&self, raw: &RawSample, t_fine: TFine) -> u32 {
        let adc_h = i32::from(raw.humidity);
        let h1 = i32::from(self.dig_h1);
        let h2 = i32::from(self.dig_h2);
        let h3 = i32::from(self.dig_h3);
        let h4 = i32::from(self.dig_h4);
        let h5 = i32::from(self.dig_h5);
        let h6 = i32::from(self.dig_h6);

        let v = t_fine.0.wrapping_sub(76800);
        let offset = (adc_h << 14)
            .wrapping_sub(h4 << 20)
            .wrapping_sub(h5.wrapping_mul(v))
            .wrapping_add(16384)
            >> 15;
        let scale = ((((v.wrapping_mul(h6) >> 10)
            .wrapping_mul((v.wrapping_mul(h3) >> 11).wrapping_add(32768)))
            >> 10)
            .wrapping_add(2_097_152)
            .wrapping_mul(h2)
            .wrapping_add(8192))
            >> 14;
        let v = offset.wrapping_mul(scale);
        let v = v.wrapping_sub(((((v >> 15).wrapping_mul(v >> 15)) >> 7).wrapping_mul(h1)) >> 4);
        let v = v.clamp(0, 419_430_400);
        (v >> 12) as u32
    }

    pub fn compensate(&self, raw: &RawSample) -> Measurement {
        let (temperature, t_fine) = self.compensate_temperature(raw);
        Measurement {
            temperature,
            pressure: self.compensate_pressure(raw, t_fine),
            humidity: self.compensate_humidity_fixed(raw, t_fine),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bme280::calibration::tests::sample_table;

    /// Allowed gap between the float and fixed humidity paths, in 1/1024 %RH.
    /// The Bosch formulas themselves differ by up to 7.55 over the full adc range.
    const HUMIDITY_TOLERANCE: f64 = 8.0;

    fn raw(pressure: u32, temperature: u32, humidity: u16) -> RawSample {
        RawSample {
            pressure,
            temperature,
            humidity,
        }
    }

    #[test]
    fn datasheet_temperature() {
        let (temperature, t_fine) = sample_table().compensate_temperature(&raw(0, 519888, 0));
        assert_eq!(temperature, 2508);
        assert_eq!(t_fine.value(), 128422);
    }

    #[test]
    fn datasheet_pressure() {
        let table = sample_table();
        let sample = raw(415148, 519888, 0);
        let (_, t_fine) = table.compensate_temperature(&sample);
        assert_eq!(table.compensate_pressure(&sample, t_fine), 100656);
    }

    #[test]
    fn pressure_above_sign_bit_divides_first() {
        let table = sample_table();
        let sample = raw(0, 519888, 0);
        let (_, t_fine) = table.compensate_temperature(&sample);
        assert_eq!(table.compensate_pressure(&sample, t_fine), 173204);
    }

    #[test]
    fn pressure_with_zero_divisor_is_zero() {
        let table = CalibrationTable {
            dig_p1: 0,
            ..sample_table()
        };
        let sample = raw(415148, 519888, 0);
        let (_, t_fine) = table.compensate_temperature(&sample);
        assert_eq!(table.compensate_pressure(&sample, t_fine), 0);
    }

    #[test]
    fn humidity_paths_agree() {
        let table = sample_table();
        for adc_h in [20000, 26000, 30000, 33000, 36000] {
            for adc_t in [450000, 500000, 519888, 560000] {
                let sample = raw(0, adc_t, adc_h);
                let (_, t_fine) = table.compensate_temperature(&sample);
                let fixed = table.compensate_humidity_fixed(&sample, t_fine);
                let float = table.compensate_humidity(&sample, t_fine);
                assert!(
                    (float * 1024.0 - f64::from(fixed)).abs() <= HUMIDITY_TOLERANCE,
                    "adc_h {} adc_t {}: {} vs {}",
                    adc_h,
                    adc_t,
                    fixed,
                    float
                );
            }
        }
    }

    #[test]
    fn humidity_reference_value() {
        let table = sample_table();
        let sample = raw(0, 519888, 30000);
        let (_, t_fine) = table.compensate_temperature(&sample);
        assert_eq!(table.compensate_humidity_fixed(&sample, t_fine), 56317);
        assert!((table.compensate_humidity(&sample, t_fine) - 55.0007).abs() < 0.001);
    }

    #[test]
    fn humidity_is_clamped() {
        let table = sample_table();
        let (_, t_fine) = table.compensate_temperature(&raw(0, 519888, 0));

        assert_eq!(table.compensate_humidity_fixed(&raw(0, 0, 0), t_fine), 0);
        assert_eq!(table.compensate_humidity(&raw(0, 0, 0), t_fine), 0.0);
        assert_eq!(
            table.compensate_humidity_fixed(&raw(0, 0, u16::MAX), t_fine),
            MAX_HUMIDITY
        );
        assert_eq!(table.compensate_humidity(&raw(0, 0, u16::MAX), t_fine), 100.0);
    }

    #[test]
    fn temperature_stays_in_range_for_extreme_tables() {
        let tables = [
            (0, i16::MAX, i16::MAX),
            (u16::MAX, i16::MIN, i16::MIN),
            (0, i16::MIN, i16::MAX),
        ];
        for (dig_t1, dig_t2, dig_t3) in tables {
            let table = CalibrationTable {
                dig_t1,
                dig_t2,
                dig_t3,
                ..sample_table()
            };
            for adc_t in (0..=0xF_FFFF).step_by(4099) {
                let (temperature, _) = table.compensate_temperature(&raw(0, adc_t, 0));
                assert!((MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature));
            }
        }
    }

    #[test]
    fn measurement_units() {
        let measurement = sample_table().compensate(&raw(415148, 519888, 30000));
        assert_eq!(
            measurement,
            Measurement {
                temperature: 2508,
                pressure: 100656,
                humidity: 56317,
            }
        );
        assert!((measurement.celsius() - 25.08).abs() < 1e-4);
        assert!((measurement.hectopascal() - 1006.56).abs() < 1e-2);
        assert!((measurement.relative_humidity() - 54.997).abs() < 1e-3);
    }
}
