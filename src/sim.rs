//! A DS18B20 living on a simulated wire, driven by a shared fake clock.
//!
//! The device decodes slots from how long the master holds the line low,
//! answers read slots by keeping the line low for 45 us and pulls a presence
//! pulse 15..135 us after a reset.

extern crate std;

use crate::crc::compute_crc8;
use crate::IoWire;
use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use embedded_hal::delay::DelayNs;
use std::rc::Rc;
use std::vec::Vec;

const US: u64 = 1_000;

#[derive(Debug, Clone, Default)]
pub struct SimClock(Rc<Cell<u64>>);

impl SimClock {
    pub fn now_ns(&self) -> u64 {
        self.0.get()
    }

    pub fn now_us(&self) -> u64 {
        self.0.get() / US
    }
}

impl DelayNs for SimClock {
    fn delay_ns(&mut self, ns: u32) {
        self.0.set(self.0.get() + u64::from(ns));
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    Rom,
    Function,
    WriteScratchpad(usize),
    Send,
    Converting(u64),
}

#[derive(Debug)]
struct State {
    present: bool,
    shorted: bool,
    rom: [u8; 8],
    scratchpad: [u8; 8],
    temperature: i16,
    conversion_ns: Option<u64>,
    flip_bit: Option<usize>,
    phase: Phase,
    rx: u8,
    rx_bits: u8,
    tx: [u8; 9],
    tx_len: usize,
    tx_bit: usize,
    presence: (u64, u64),
    hold_low_until: u64,
    received: Vec<u8>,
    conversion_polls: usize,
}

#[derive(Debug, Clone)]
pub struct SimDevice(Rc<RefCell<State>>);

impl Default for SimDevice {
    fn default() -> Self {
        let mut rom = [0x28, 0xFF, 0x4C, 0x3A, 0x91, 0x16, 0x04, 0x00];
        rom[7] = compute_crc8(&rom[..7]);
        SimDevice(Rc::new(RefCell::new(State {
            present: true,
            shorted: false,
            rom,
            // power-on value 85 C, TH/TL 0x4B/0x46, 12 bit
            scratchpad: [0x50, 0x05, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10],
            temperature: 0x0191,
            conversion_ns: Some(5_000 * US),
            flip_bit: None,
            phase: Phase::Idle,
            rx: 0,
            rx_bits: 0,
            tx: [0; 9],
            tx_len: 0,
            tx_bit: 0,
            presence: (0, 0),
            hold_low_until: 0,
            received: Vec::new(),
            conversion_polls: 0,
        })))
    }
}

impl SimDevice {
    pub fn absent() -> Self {
        let device = Self::default();
        device.0.borrow_mut().present = false;
        device
    }

    pub fn shorted(self) -> Self {
        self.0.borrow_mut().shorted = true;
        self
    }

    /// Raw temperature reported after the next conversion
    pub fn with_temperature(self, raw: i16) -> Self {
        self.0.borrow_mut().temperature = raw;
        self
    }

    pub fn never_converting(self) -> Self {
        self.0.borrow_mut().conversion_ns = None;
        self
    }

    /// Flip one bit of every transmitted scratchpad
    pub fn with_corrupted_bit(self, bit: usize) -> Self {
        self.0.borrow_mut().flip_bit = Some(bit);
        self
    }

    pub fn with_rom(self, rom: [u8; 8]) -> Self {
        self.0.borrow_mut().rom = rom;
        self
    }

    pub fn rom(&self) -> [u8; 8] {
        self.0.borrow().rom
    }

    /// Every byte written by the master, in order
    pub fn received(&self) -> Vec<u8> {
        self.0.borrow().received.clone()
    }

    /// TH, TL and configuration byte
    pub fn written_config(&self) -> [u8; 3] {
        let state = self.0.borrow();
        [state.scratchpad[2], state.scratchpad[3], state.scratchpad[4]]
    }

    pub fn conversion_polls(&self) -> usize {
        self.0.borrow().conversion_polls
    }

    fn slot_start(&self, now: u64) {
        let mut state = self.0.borrow_mut();
        match state.phase {
            Phase::Send => {
                let bit = state.tx_bit;
                let mut value = state.tx[bit / 8] & (1 << (bit % 8)) != 0;
                if state.flip_bit == Some(bit) && state.tx_len == 9 {
                    value = !value;
                }
                if !value {
                    state.hold_low_until = now + 45 * US;
                }
                state.tx_bit += 1;
                if state.tx_bit == state.tx_len * 8 {
                    state.phase = Phase::Idle;
                }
            }
            Phase::Converting(done_at) => {
                state.conversion_polls += 1;
                if now < done_at {
                    state.hold_low_until = now + 45 * US;
                } else {
                    let [lsb, msb] = state.temperature.to_le_bytes();
                    state.scratchpad[0] = lsb;
                    state.scratchpad[1] = msb;
                    state.phase = Phase::Idle;
                }
            }
            _ => {}
        }
    }

    fn slot_end(&self, now: u64, low_for: u64) {
        if low_for >= 480 * US {
            let mut state = self.0.borrow_mut();
            state.rx = 0;
            state.rx_bits = 0;
            if state.present {
                state.phase = Phase::Rom;
                state.presence = (now + 15 * US, now + 135 * US);
            } else {
                state.phase = Phase::Idle;
            }
            return;
        }

        let byte = {
            let mut state = self.0.borrow_mut();
            if !matches!(
                state.phase,
                Phase::Rom | Phase::Function | Phase::WriteScratchpad(_)
            ) {
                return;
            }
            state.rx >>= 1;
            if low_for < 30 * US {
                state.rx |= 0x80;
            }
            state.rx_bits += 1;
            if state.rx_bits < 8 {
                return;
            }
            state.rx_bits = 0;
            state.rx
        };
        self.on_byte(now, byte);
    }

    fn on_byte(&self, now: u64, byte: u8) {
        let mut state = self.0.borrow_mut();
        state.received.push(byte);
        let next = match (state.phase, byte) {
            (Phase::Rom, 0xCC) => Phase::Function,
            (Phase::Rom, 0x33) => {
                let rom = state.rom;
                state.tx[..8].copy_from_slice(&rom);
                state.tx_len = 8;
                state.tx_bit = 0;
                Phase::Send
            }
            (Phase::Function, 0x44) => {
                let done_at = state.conversion_ns.map_or(u64::MAX, |ns| now + ns);
                Phase::Converting(done_at)
            }
            (Phase::Function, 0xBE) => {
                let scratchpad = state.scratchpad;
                state.tx[..8].copy_from_slice(&scratchpad);
                state.tx[8] = compute_crc8(&scratchpad);
                state.tx_len = 9;
                state.tx_bit = 0;
                Phase::Send
            }
            (Phase::Function, 0x4E) => Phase::WriteScratchpad(0),
            (Phase::WriteScratchpad(index), _) => {
                state.scratchpad[2 + index] = byte;
                if index == 2 {
                    Phase::Idle
                } else {
                    Phase::WriteScratchpad(index + 1)
                }
            }
            _ => Phase::Idle,
        };
        state.phase = next;
    }

    fn pulls_low(&self, now: u64) -> bool {
        let state = self.0.borrow();
        state.shorted
            || (state.present && state.presence.0 <= now && now < state.presence.1)
            || now < state.hold_low_until
    }
}

pub struct SimWire {
    clock: SimClock,
    device: SimDevice,
    driving: bool,
    low_since: u64,
}

impl SimWire {
    pub fn new(clock: SimClock, device: SimDevice) -> Self {
        SimWire {
            clock,
            device,
            driving: false,
            low_since: 0,
        }
    }
}

impl IoWire for SimWire {
    type Error = Infallible;

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.driving && !self.device.pulls_low(self.clock.now_ns()))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        if !self.driving {
            self.driving = true;
            self.low_since = self.clock.now_ns();
            self.device.slot_start(self.low_since);
        }
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if self.driving {
            self.driving = false;
            let now = self.clock.now_ns();
            self.device.slot_end(now, now - self.low_since);
        }
        Ok(())
    }
}
