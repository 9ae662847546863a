//! Result and errors.
use std::fmt::{self, Display, Formatter};

use crate::constants::Address;

pub type Chip8Result<T> = std::result::Result<T, Chip8Error>;

#[derive(Debug)]
pub enum Chip8Error {
    /// Opcode word does not match any instruction.
    Decode { opcode: u16, address: Address },
    /// Subroutine call with a full call stack.
    StackOverflow { address: Address },
    /// Return with an empty call stack.
    StackUnderflow { address: Address },
    /// Attempt to load a bytecode program that can't fit in memory.
    InvalidProgramLoad { size: usize, capacity: usize },
    /// The VM stopped on a fatal error and needs a fresh program.
    Halted,
    Io(std::io::Error),
    Fmt(fmt::Error),
    Config(String),
}

impl Chip8Error {
    /// Errors that stop the machine until the next program load.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Decode { .. }
                | Self::StackOverflow { .. }
                | Self::StackUnderflow { .. }
                | Self::InvalidProgramLoad { .. }
        )
    }
}

impl Display for Chip8Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode { opcode, address } => {
                write!(f, "unrecognized opcode {opcode:04X} at {address:04X}")
            }
            Self::StackOverflow { address } => write!(f, "call stack overflow at {address:04X}"),
            Self::StackUnderflow { address } => {
                write!(f, "call stack underflow at {address:04X}")
            }
            Self::InvalidProgramLoad { size, capacity } => write!(
                f,
                "program of {size} bytes too large for VM memory ({capacity} bytes available)"
            ),
            Self::Halted => write!(f, "machine is halted, load a program to continue"),
            Self::Io(err) => write!(f, "{}", err),
            Self::Fmt(err) => write!(f, "{}", err),
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Chip8Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Fmt(err) => Some(err),
            _ => None,
        }
    }
}

impl From<fmt::Error> for Chip8Error {
    fn from(err: fmt::Error) -> Self {
        Chip8Error::Fmt(err)
    }
}

impl From<std::io::Error> for Chip8Error {
    fn from(err: std::io::Error) -> Self {
        Chip8Error::Io(err)
    }
}
