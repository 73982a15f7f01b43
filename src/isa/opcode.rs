//! Operation codes.

use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The Duck Machine operation codes.
///
/// Value 4 is reserved and does not decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OpCode {
    /// Stop the machine
    Halt = 0,
    /// Register := memory[src1 + src2 + offset]
    Load = 1,
    /// memory[src1 + src2 + offset] := register
    Store = 2,
    /// target := src1 + (src2 + offset)
    Add = 3,
    /// target := src1 - (src2 + offset)
    Sub = 5,
    /// target := src1 * (src2 + offset)
    Mul = 6,
    /// target := floor(src1 / (src2 + offset))
    Div = 7,
}

/// How an opcode affects machine state once the ALU has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    /// Changes the run state only (HALT).
    Control,
    /// ALU computes an address; a register or memory cell is transferred.
    Memory,
    /// ALU computes a value and a condition flag; both are committed.
    Arithmetic,
}

impl OpCode {
    /// Every opcode, in numeric order.
    pub const ALL: [OpCode; 7] = [
        OpCode::Halt,
        OpCode::Load,
        OpCode::Store,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
    ];

    /// Convert a numeric field value to an opcode.
    pub fn from_bits(value: u32) -> Option<Self> {
        match value {
            0 => Some(OpCode::Halt),
            1 => Some(OpCode::Load),
            2 => Some(OpCode::Store),
            3 => Some(OpCode::Add),
            5 => Some(OpCode::Sub),
            6 => Some(OpCode::Mul),
            7 => Some(OpCode::Div),
            _ => None,
        }
    }

    /// Numeric encoding.
    #[inline]
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// Assembly mnemonic.
    pub const fn name(self) -> &'static str {
        match self {
            OpCode::Halt => "HALT",
            OpCode::Load => "LOAD",
            OpCode::Store => "STORE",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
        }
    }

    /// Side-effect class.
    pub const fn class(self) -> OpClass {
        match self {
            OpCode::Halt => OpClass::Control,
            OpCode::Load | OpCode::Store => OpClass::Memory,
            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div => OpClass::Arithmetic,
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OpCode {
    type Err = ParseOpCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OpCode::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| ParseOpCodeError(s.to_string()))
    }
}

/// Unknown opcode mnemonic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown opcode: {0}")]
pub struct ParseOpCodeError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_gap() {
        assert_eq!(OpCode::from_bits(4), None);
        assert_eq!(OpCode::from_bits(8), None);
        for op in OpCode::ALL {
            assert_eq!(OpCode::from_bits(op.bits()), Some(op));
        }
    }

    #[test]
    fn test_mnemonics() {
        for op in OpCode::ALL {
            assert_eq!(op.name().parse::<OpCode>().unwrap(), op);
        }
        assert!("JUMP".parse::<OpCode>().is_err());
        assert!("add".parse::<OpCode>().is_err());
    }

    #[test]
    fn test_classes() {
        assert_eq!(OpCode::Halt.class(), OpClass::Control);
        assert_eq!(OpCode::Store.class(), OpClass::Memory);
        assert_eq!(OpCode::Div.class(), OpClass::Arithmetic);
    }
}
