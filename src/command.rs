pub trait OpCode {
    fn op_code(&self) -> u8;
}

/// ROM level commands, addressed to every device on the wire
#[derive(Clone, Copy, Debug)]
#[repr(u8)]
pub enum Command {
    SkipRom = 0xCC,
    ReadRom = 0x33,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}
