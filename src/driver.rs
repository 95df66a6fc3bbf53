use crate::{Command, Error, Event, IoWire, Observer, OpCode};
use core::fmt::Debug;
use embedded_hal::delay::DelayNs;

/// Reset pulse length, also the minimal recovery after releasing the wire
pub const RESET_PULSE_US: u32 = 480;
/// Time between releasing the wire and sampling the presence pulse
pub const PRESENCE_SAMPLE_US: u32 = 70;

const WRITE_ONE_LOW_US: u32 = 15;
const WRITE_ONE_RELEASE_US: u32 = 65;
const WRITE_ZERO_LOW_US: u32 = 60;
const WRITE_ZERO_RELEASE_US: u32 = 20;
const READ_INIT_US: u32 = 10;
const READ_SAMPLE_US: u32 = 5;
const READ_RECOVERY_US: u32 = 60;

pub struct Driver<W: IoWire, O = ()> {
    io_wire: W,
    observer: O,
}

impl<W: IoWire> Driver<W> {
    pub fn new(io_wire: W) -> Self {
        Self::with_observer(io_wire, ())
    }
}

impl<E: Debug, W: IoWire<Error = E>, O: Observer> Driver<W, O> {
    pub fn with_observer(io_wire: W, observer: O) -> Self {
        Driver { io_wire, observer }
    }

    /// Give back the wire and the observer
    pub fn release(self) -> (W, O) {
        (self.io_wire, self.observer)
    }

    pub(crate) fn notify(&mut self, event: Event) {
        self.observer.notify(event);
    }

    pub fn reset_write_read(
        &mut self,
        delay: &mut impl DelayNs,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error<E>> {
        self.reset(delay)?;
        self.write_bytes(delay, write)?;
        self.read_bytes(delay, read)?;
        Ok(())
    }

    pub fn reset_skip_write_read(
        &mut self,
        delay: &mut impl DelayNs,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error<E>> {
        self.reset(delay)?;
        self.skip(delay)?;
        self.write_bytes(delay, write)?;
        self.read_bytes(delay, read)?;
        Ok(())
    }

    pub fn reset_skip_write_only(
        &mut self,
        delay: &mut impl DelayNs,
        write: &[u8],
    ) -> Result<(), Error<E>> {
        self.reset(delay)?;
        self.skip(delay)?;
        self.write_bytes(delay, write)?;
        Ok(())
    }

    /// Address every device at once, only sound on a single-drop bus
    pub fn skip(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.write_command(delay, Command::SkipRom)?;
        Ok(())
    }

    /// Performs a reset and listens for a presence pulse
    /// Returns Err(WireFault) if the wire seems to be shortened,
    /// Err(DeviceNotFound) if no device answered
    pub fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.set_high()?;
        self.ensure_wire_high(delay)?;

        self.set_low()?;
        delay.delay_us(RESET_PULSE_US);
        self.set_high()?;

        delay.delay_us(PRESENCE_SAMPLE_US);
        let presence = self.is_low()?;
        delay.delay_us(RESET_PULSE_US - PRESENCE_SAMPLE_US);

        if presence {
            Ok(())
        } else {
            self.notify(Event::NoPresence);
            Err(Error::DeviceNotFound)
        }
    }

    pub fn reset_presence(&mut self, delay: &mut impl DelayNs) -> Result<bool, Error<E>> {
        self.reset(delay).map(|_| true).or_else(|error| {
            if matches!(error, Error::DeviceNotFound) {
                Ok(false)
            } else {
                Err(error)
            }
        })
    }

    fn ensure_wire_high(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        for _ in 0..125 {
            if self.is_high()? {
                return Ok(());
            }
            delay.delay_us(2);
        }
        Err(Error::WireFault)
    }

    pub fn read_bytes(&mut self, delay: &mut impl DelayNs, dst: &mut [u8]) -> Result<(), E> {
        for d in dst {
            *d = self.read_byte(delay)?;
        }
        Ok(())
    }

    /// Least significant bit first
    pub fn read_byte(&mut self, delay: &mut impl DelayNs) -> Result<u8, E> {
        let mut byte = 0_u8;
        for _ in 0..8 {
            byte >>= 1;
            if self.read_bit(delay)? {
                byte |= 0x80;
            }
        }
        Ok(byte)
    }

    pub fn read_bit(&mut self, delay: &mut impl DelayNs) -> Result<bool, E> {
        self.set_low()?;
        delay.delay_us(READ_INIT_US);
        self.set_high()?;
        delay.delay_us(READ_SAMPLE_US);
        let val = self.is_high();
        delay.delay_us(READ_RECOVERY_US);
        val
    }

    pub fn write_command(&mut self, delay: &mut impl DelayNs, cmd: impl OpCode) -> Result<(), E> {
        self.write_byte(delay, cmd.op_code())
    }

    pub fn write_bytes(&mut self, delay: &mut impl DelayNs, bytes: &[u8]) -> Result<(), E> {
        for b in bytes {
            self.write_byte(delay, *b)?;
        }
        Ok(())
    }

    /// Least significant bit first
    pub fn write_byte(&mut self, delay: &mut impl DelayNs, byte: u8) -> Result<(), E> {
        let mut byte = byte;
        for _ in 0..8 {
            self.write_bit(delay, (byte & 0x01) == 0x01)?;
            byte >>= 1;
        }
        Ok(())
    }

    pub fn write_bit(&mut self, delay: &mut impl DelayNs, high: bool) -> Result<(), E> {
        self.set_low()?;
        delay.delay_us(if high {
            WRITE_ONE_LOW_US
        } else {
            WRITE_ZERO_LOW_US
        });
        self.set_high()?;
        delay.delay_us(if high {
            WRITE_ONE_RELEASE_US
        } else {
            WRITE_ZERO_RELEASE_US
        });
        Ok(())
    }

    #[inline(always)]
    pub(crate) fn set_high(&mut self) -> Result<(), E> {
        self.io_wire.set_high()
    }

    #[inline(always)]
    pub(crate) fn set_low(&mut self) -> Result<(), E> {
        self.io_wire.set_low()
    }

    #[inline(always)]
    pub(crate) fn is_high(&mut self) -> Result<bool, E> {
        self.io_wire.is_high()
    }

    #[inline(always)]
    pub(crate) fn is_low(&mut self) -> Result<bool, E> {
        self.io_wire.is_low()
    }
}
