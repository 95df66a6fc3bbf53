/// Diagnostic events emitted by the drivers.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Chip id register read
    ChipId(u8),
    SoftReset,
    CalibrationLoaded,
    /// Register written after read-modify-write
    RegisterWritten { register: u8, value: u8 },
    /// Status register read
    Status(u8),
    RawSample {
        pressure: u32,
        temperature: u32,
        humidity: u16,
    },
    /// Compensated BME280 reading: 0.01 °C, Pa, %RH * 1024
    Measurement {
        temperature: i32,
        pressure: u32,
        humidity: u32,
    },
    /// Reset pulse got no answer
    NoPresence,
    /// DS18B20 conversion finished after `elapsed_ms` polls
    ConversionDone { elapsed_ms: u16 },
    ConversionTimeout,
    CrcMismatch { computed: u8, expected: u8 },
    /// DS18B20 raw temperature in 1/16 °C
    Temperature(i16),
}

/// Sink for driver diagnostics.
///
/// `()` discards everything.
pub trait Observer {
    fn notify(&mut self, event: Event);
}

impl Observer for () {
    #[inline(always)]
    fn notify(&mut self, _event: Event) {}
}

impl<O: Observer + ?Sized> Observer for &mut O {
    fn notify(&mut self, event: Event) {
        (**self).notify(event)
    }
}

/// Forwards events to `defmt`, warnings for failures and debug for the rest.
#[cfg(feature = "defmt")]
#[derive(Debug, Default, Clone, Copy)]
pub struct DefmtObserver;

#[cfg(feature = "defmt")]
impl Observer for DefmtObserver {
    fn notify(&mut self, event: Event) {
        match event {
            Event::NoPresence | Event::ConversionTimeout | Event::CrcMismatch { .. } => {
                defmt::warn!("{}", event)
            }
            _ => defmt::debug!("{}", event),
        }
    }
}
