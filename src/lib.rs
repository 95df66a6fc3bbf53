#![no_std]
#![doc = include_str!("../README.md")]

#[cfg(feature = "bme280")]
pub mod bme280;
mod command;
pub mod crc;
mod driver;
#[cfg(feature = "ds18b20")]
pub mod ds18b20;
mod iowire;
mod observer;
pub mod register;
mod result;
#[cfg(test)]
mod sim;

pub use command::{Command, OpCode};
pub use crc::{compute_crc8, compute_partial_crc8, ensure_correct_crc8};
pub use driver::{Driver, PRESENCE_SAMPLE_US, RESET_PULSE_US};
pub use iowire::IoWire;
#[cfg(feature = "defmt")]
pub use observer::DefmtObserver;
pub use observer::{Event, Observer};
pub use result::Error;
