//! A CHIP-8 virtual machine.
//!
//! [`Chip8`] owns the whole machine. A host loads a ROM, calls
//! [`Chip8::step`] at its chosen instruction rate and [`Chip8::tick`] at
//! 60Hz, reads [`Chip8::display`] to present frames and feeds input through
//! [`Chip8::keypad`]. [`emulator::Emulator`] is such a host for the terminal.

pub mod chip8;
pub mod config;
pub mod display;
pub mod emulator;
pub mod error;
pub mod instruction;
pub mod keymap;
pub mod keypad;
pub mod state;

pub use chip8::{Chip8, StepResult};
pub use config::{Quirks, Settings};
pub use error::{Fault, FaultKind};
