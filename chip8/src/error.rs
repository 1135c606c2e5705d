//! Result and errors.
use std::fmt::{self, Display, Formatter};

use crate::constants::*;

pub type Chip8Result<T> = std::result::Result<T, Chip8Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chip8Error {
    /// Attempt to load a bytecode program that can't fit in memory.
    RomTooLarge { size: usize },
    /// Fontset data is malformed.
    Font(String),
    /// Address arithmetic escaped the VM memory.
    OutOfBounds { address: usize },
    /// Subroutine call nested deeper than the call stack allows.
    StackOverflow,
    /// Return executed without a matching call.
    StackUnderflow,
    /// Instruction word that doesn't decode to a known operation.
    InvalidOpcode { opcode: u16, address: Address },
    /// Configuration value that the VM can't run with.
    InvalidConfig(&'static str),
    Fmt(fmt::Error),
}

impl Display for Chip8Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::RomTooLarge { size } => write!(
                f,
                "program too large for VM memory: {size} bytes, maximum is {MAX_PROGRAM_SIZE}"
            ),
            Self::Font(msg) => write!(f, "font error: {msg}"),
            Self::OutOfBounds { address } => {
                write!(f, "memory access out of bounds: 0x{address:04X}")
            }
            Self::StackOverflow => write!(f, "call stack overflow"),
            Self::StackUnderflow => write!(f, "call stack underflow"),
            Self::InvalidOpcode { opcode, address } => {
                write!(f, "invalid opcode {opcode:04X} at 0x{address:04X}")
            }
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Fmt(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Chip8Error {}

impl From<fmt::Error> for Chip8Error {
    fn from(err: fmt::Error) -> Self {
        Chip8Error::Fmt(err)
    }
}
