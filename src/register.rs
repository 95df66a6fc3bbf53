/// A bitfield inside an 8 bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub mask: u8,
    pub shift: u8,
}

impl Field {
    pub const fn new(mask: u8, shift: u8) -> Self {
        Field { mask, shift }
    }

    /// Extract the field value from a register value.
    pub const fn get(&self, register: u8) -> u8 {
        (register & self.mask) >> self.shift
    }

    /// Replace the field in `register` with `value`, keeping every bit outside the mask.
    pub const fn set(&self, register: u8, value: u8) -> u8 {
        (register & !self.mask) | ((value << self.shift) & self.mask)
    }
}
