use std::fmt;

use crate::state::Address;

/// What went wrong while loading or executing a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FaultKind {
    #[error("memory access out of bounds at {address:#06X}")]
    OutOfBounds { address: usize },

    #[error("stack overflow: call depth exceeds {depth}")]
    StackOverflow { depth: usize },

    #[error("stack underflow: return with an empty call stack")]
    StackUnderflow,

    #[error("unimplemented opcode {0:#06X}")]
    UnimplementedOpcode(u16),

    #[error("ROM is too large ({size} bytes), max size is {max_size} bytes")]
    RomTooLarge { size: usize, max_size: usize },

    #[error("invalid key index {0:#04X}")]
    InvalidKey(u8),
}

/// A fatal fault together with the location it happened at.
///
/// Once a [`Chip8`](crate::chip8::Chip8) has faulted it is halted and every
/// further step reports the same fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub pc: Address,
    pub opcode: Option<u16>,
    pub kind: FaultKind,
}

impl Fault {
    pub fn new(pc: Address, opcode: Option<u16>, kind: FaultKind) -> Self {
        Fault { pc, opcode, kind }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.opcode {
            Some(opcode) => write!(
                f,
                "fault at PC {:#06X} (opcode {:#06X}): {}",
                self.pc, opcode, self.kind
            ),
            None => write!(f, "fault at PC {:#06X}: {}", self.pc, self.kind),
        }
    }
}

impl std::error::Error for Fault {}
