//! Arithmetic-logic unit.
//!
//! The ALU is a pure function of an opcode and two operands. It never
//! fails: a computational fault such as division by zero comes back as
//! result 0 with the V flag set, and the program decides what to do about
//! it by predicating on V.

use crate::isa::{CondFlag, OpCode, Word};

/// The Duck Machine's single functional unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Alu;

impl Alu {
    pub fn new() -> Self {
        Alu
    }

    /// Apply `op` to `left` and `right`, returning the result and the
    /// condition flag derived from it.
    ///
    /// LOAD and STORE reuse the adder to compute an address. HALT yields 0.
    /// Addition, subtraction and multiplication wrap at 32 bits.
    pub fn apply(&self, op: OpCode, left: Word, right: Word) -> (Word, CondFlag) {
        let result = match op {
            OpCode::Add | OpCode::Load | OpCode::Store => Some(left.wrapping_add(right)),
            OpCode::Sub => Some(left.wrapping_sub(right)),
            OpCode::Mul => Some(left.wrapping_mul(right)),
            OpCode::Div => floor_div(left, right),
            OpCode::Halt => Some(0),
        };

        match result {
            Some(value) => (value, Self::flag_for(value)),
            None => {
                log::warn!("ALU fault: {} {} {}", op, left, right);
                (0, CondFlag::V)
            }
        }
    }

    /// Sign of a successful result as exactly one of M, Z, P.
    pub fn flag_for(value: Word) -> CondFlag {
        match value {
            v if v < 0 => CondFlag::M,
            0 => CondFlag::Z,
            _ => CondFlag::P,
        }
    }
}

/// Integer division rounding toward negative infinity.
///
/// Returns `None` for division by zero and for the one quotient that does
/// not fit in a word (`Word::MIN / -1`).
fn floor_div(left: Word, right: Word) -> Option<Word> {
    let quotient = left.checked_div(right)?;
    let remainder = left % right;
    if remainder != 0 && ((remainder < 0) != (right < 0)) {
        Some(quotient - 1)
    } else {
        Some(quotient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_op() {
        let alu = Alu::new();
        assert_eq!(alu.apply(OpCode::Add, 5, 3), (8, CondFlag::P));
        assert_eq!(alu.apply(OpCode::Add, -5, 3), (-2, CondFlag::M));
        assert_eq!(alu.apply(OpCode::Add, -10, 10), (0, CondFlag::Z));

        assert_eq!(alu.apply(OpCode::Sub, 5, 3), (2, CondFlag::P));
        assert_eq!(alu.apply(OpCode::Sub, 3, 5), (-2, CondFlag::M));
        assert_eq!(alu.apply(OpCode::Sub, 3, 3), (0, CondFlag::Z));

        assert_eq!(alu.apply(OpCode::Mul, 3, 5), (15, CondFlag::P));
        assert_eq!(alu.apply(OpCode::Mul, -3, 5), (-15, CondFlag::M));
        assert_eq!(alu.apply(OpCode::Mul, 0, 22), (0, CondFlag::Z));

        assert_eq!(alu.apply(OpCode::Div, 5, 3), (1, CondFlag::P));
        assert_eq!(alu.apply(OpCode::Div, 3, 4), (0, CondFlag::Z));

        assert_eq!(alu.apply(OpCode::Load, 12, 13), (25, CondFlag::P));
        assert_eq!(alu.apply(OpCode::Store, 27, 13), (40, CondFlag::P));
        assert_eq!(alu.apply(OpCode::Halt, 99, 98), (0, CondFlag::Z));
    }

    #[test]
    fn test_division_floors() {
        let alu = Alu::new();
        assert_eq!(alu.apply(OpCode::Div, 12, -3), (-4, CondFlag::M));
        assert_eq!(alu.apply(OpCode::Div, 7, -2), (-4, CondFlag::M));
        assert_eq!(alu.apply(OpCode::Div, -7, 2), (-4, CondFlag::M));
        assert_eq!(alu.apply(OpCode::Div, -7, -2), (3, CondFlag::P));
        assert_eq!(alu.apply(OpCode::Div, -1, 5), (-1, CondFlag::M));
    }

    #[test]
    fn test_division_by_zero_sets_overflow() {
        let alu = Alu::new();
        for n in [-5, 0, 12, Word::MAX, Word::MIN] {
            assert_eq!(alu.apply(OpCode::Div, n, 0), (0, CondFlag::V));
        }
        assert_eq!(alu.apply(OpCode::Div, Word::MIN, -1), (0, CondFlag::V));
    }

    #[test]
    fn test_addition_wraps() {
        let alu = Alu::new();
        assert_eq!(alu.apply(OpCode::Add, Word::MAX, 1), (Word::MIN, CondFlag::M));
    }
}
