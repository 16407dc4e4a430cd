//! This module contains the type aliases used within this crate.

/// An [Address] is a 64 bit address in the MIPS emulator's memory.
pub type Address = u64;

/// A [Step] is the number of instructions the MIPS emulator has executed.
pub type Step = u64;
