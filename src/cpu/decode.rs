//! Instruction decoder and encoder.
//!
//! Every instruction is one 32-bit word with fixed, disjoint fields
//! (high to low):
//!
//! ```text
//!  31 | 30..26 | 25..22 | 21..18 | 17..14 | 13..10 | 9..0
//! ----+--------+--------+--------+--------+--------+--------
//! rsv | opcode |  cond  | target |  src1  |  src2  | offset
//! ```
//!
//! The offset is a signed 10-bit displacement; everything else is
//! unsigned.

use std::fmt;
use crate::isa::{BitField, CondFlag, OpCode};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Bit 31, unused.
pub const RESERVED_FIELD: BitField = BitField::new(31, 31);
/// Operation code.
pub const OPCODE_FIELD: BitField = BitField::new(26, 30);
/// Predicate.
pub const COND_FIELD: BitField = BitField::new(22, 25);
/// Target register.
pub const TARGET_FIELD: BitField = BitField::new(18, 21);
/// First source register.
pub const SRC1_FIELD: BitField = BitField::new(14, 17);
/// Second source register.
pub const SRC2_FIELD: BitField = BitField::new(10, 13);
/// Signed displacement added to src2.
pub const OFFSET_FIELD: BitField = BitField::new(0, 9);

/// Smallest encodable offset.
pub const OFFSET_MIN: i32 = OFFSET_FIELD.min_signed();
/// Largest encodable offset.
pub const OFFSET_MAX: i32 = OFFSET_FIELD.max_signed();

/// A decoded Duck Machine instruction.
///
/// Executing it computes `src1 <op> (src2 + offset)`, guarded by `cond`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    pub op: OpCode,
    pub cond: CondFlag,
    pub target: u8,
    pub src1: u8,
    pub src2: u8,
    pub offset: i16,
}

impl Instruction {
    /// Build an instruction from its fields.
    pub const fn new(op: OpCode, cond: CondFlag, target: u8, src1: u8, src2: u8, offset: i16) -> Self {
        Self { op, cond, target, src1, src2, offset }
    }

    /// Encode to a 32-bit word. Shorthand for [`encode`].
    pub fn encode(&self) -> u32 {
        encode(self)
    }
}

impl fmt::Display for Instruction {
    /// Renders like assembly source, e.g. `MUL/ZP   r1,r3,r15[42]`.
    /// The predicate is omitted when it is ALWAYS.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)?;
        if self.cond != CondFlag::ALWAYS {
            write!(f, "/{}", self.cond)?;
        }
        write!(
            f,
            "   r{},r{},r{}[{}]",
            self.target, self.src1, self.src2, self.offset
        )
    }
}

/// Decode a 32-bit word into an instruction.
///
/// Fails if the opcode field holds a reserved value. The reserved top
/// bit is ignored.
pub fn decode(word: u32) -> Result<Instruction, DecodeError> {
    let op_bits = OPCODE_FIELD.extract(word);
    let op = OpCode::from_bits(op_bits).ok_or(DecodeError::InvalidOpcode(op_bits))?;

    let cond_bits = COND_FIELD.extract(word);
    let cond = CondFlag::from_bits(cond_bits).ok_or(DecodeError::InvalidCondition(cond_bits))?;

    Ok(Instruction {
        op,
        cond,
        target: TARGET_FIELD.extract(word) as u8,
        src1: SRC1_FIELD.extract(word) as u8,
        src2: SRC2_FIELD.extract(word) as u8,
        offset: OFFSET_FIELD.extract_signed(word) as i16,
    })
}

/// Encode an instruction into a 32-bit word.
///
/// Register numbers and offsets that do not fit their fields are
/// truncated, exactly as [`BitField::insert`] truncates. Callers that
/// need an exact round trip must validate ranges first.
pub fn encode(instr: &Instruction) -> u32 {
    let mut word = 0;
    word = OPCODE_FIELD.insert(instr.op.bits(), word);
    word = COND_FIELD.insert(instr.cond.bits() as u32, word);
    word = TARGET_FIELD.insert(instr.target as u32, word);
    word = SRC1_FIELD.insert(instr.src1 as u32, word);
    word = SRC2_FIELD.insert(instr.src2 as u32, word);
    word = OFFSET_FIELD.insert_signed(instr.offset as i32, word);
    word
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid encoding: opcode {0} is not defined")]
    InvalidOpcode(u32),

    #[error("invalid encoding: condition bits {0:#x} out of range")]
    InvalidCondition(u32),
}
