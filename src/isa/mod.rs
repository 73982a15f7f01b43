//! Instruction-set primitives.
//!
//! This module provides the leaf types everything else is built from:
//! - [`BitField`] - A contiguous bit range within a 32-bit word
//! - [`CondFlag`] - The M/Z/P/V condition bitmask used for predication
//! - [`OpCode`] - The closed set of operation codes
//! - [`Word`] - The integer held by a register or memory cell

mod bitfield;
mod cond;
mod opcode;

pub use bitfield::BitField;
pub use cond::{CondFlag, ParseFlagError};
pub use opcode::{OpClass, OpCode, ParseOpCodeError};

/// A machine word: the contents of one register or one memory cell.
///
/// Instruction words are unsigned 32-bit patterns; they are stored in
/// memory reinterpreted as `Word` and converted back on fetch.
pub type Word = i32;
