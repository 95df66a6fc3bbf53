use core::fmt::Debug;

/// Error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E: Sized + Debug> {
    /// Bus transaction did not complete
    Transport(E),
    /// Wire not high
    WireFault,
    /// No presence pulse on the wire
    DeviceNotFound,
    /// A chip of a related family answered (BMP280), carries the id read
    WrongSensor(u8),
    /// Chip id matches no known device
    CorruptChipId(u8),
    /// Reserved status bits set
    CorruptStatus(u8),
    /// Measurement still running after the poll budget
    StatusTimeout,
    /// Compensation requested before the calibration table was loaded
    InvalidCalibration,
    /// Computed and received checksum differ
    CrcMismatch(u8, u8),
    /// Expected and received family code differ
    FamilyCodeMismatch(u8, u8),
    /// Temperature conversion did not finish within 750 polls
    ConversionTimeout,
}

impl<E: Sized + Debug> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::Transport(e)
    }
}
