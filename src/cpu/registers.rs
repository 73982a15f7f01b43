//! Duck Machine register file.
//!
//! Sixteen 32-bit registers, `r0` through `r15`:
//! - r0 (`zero`): always reads 0; writes are discarded
//! - r15 (`pc`): the program counter, otherwise an ordinary register

use crate::isa::Word;
use serde::{Serialize, Deserialize};

/// Number of general registers.
pub const NUM_REGISTERS: usize = 16;
/// The always-zero register.
pub const ZERO: u8 = 0;
/// The program counter.
pub const PC: u8 = 15;

/// Look up a register by assembly name: `r0`..`r15`, `zero` or `pc`.
pub fn register_number(name: &str) -> Option<u8> {
    match name {
        "zero" => Some(ZERO),
        "pc" => Some(PC),
        _ => {
            let digits = name.strip_prefix('r')?;
            // Reject forms like "r+1" and "r01" that parse but aren't names
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            if digits.len() > 1 && digits.starts_with('0') {
                return None;
            }
            let n: u8 = digits.parse().ok()?;
            (usize::from(n) < NUM_REGISTERS).then_some(n)
        }
    }
}

/// The register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    cells: [Word; NUM_REGISTERS],
}

impl Registers {
    /// Create a register file with all values zeroed.
    pub fn new() -> Self {
        Self {
            cells: [0; NUM_REGISTERS],
        }
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        self.cells = [0; NUM_REGISTERS];
    }

    /// Read a register. Only the low four bits of `reg` are used.
    #[inline]
    pub fn get(&self, reg: u8) -> Word {
        self.cells[usize::from(reg & 0xF)]
    }

    /// Write a register. Writes to r0 are silently discarded.
    #[inline]
    pub fn put(&mut self, reg: u8, value: Word) {
        let index = usize::from(reg & 0xF);
        if index != usize::from(ZERO) {
            self.cells[index] = value;
        }
    }

    /// Current program counter.
    #[inline]
    pub fn pc(&self) -> Word {
        self.get(PC)
    }

    /// Set the program counter to an absolute address.
    #[inline]
    pub fn jump(&mut self, addr: Word) {
        self.put(PC, addr);
    }

    /// Increment the program counter by 1.
    /// Returns the old value.
    pub fn advance_pc(&mut self) -> Word {
        let old = self.pc();
        self.put(PC, old.wrapping_add(1));
        old
    }

    /// All sixteen values, r0 first.
    pub fn values(&self) -> &[Word; NUM_REGISTERS] {
        &self.cells
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_register_discards_writes() {
        let mut regs = Registers::new();
        for value in [1, -1, 42, Word::MAX] {
            regs.put(ZERO, value);
            assert_eq!(regs.get(ZERO), 0);
        }
    }

    #[test]
    fn test_ordinary_registers() {
        let mut regs = Registers::new();
        for reg in 1..16u8 {
            regs.put(reg, reg as Word * 10);
        }
        for reg in 1..16u8 {
            assert_eq!(regs.get(reg), reg as Word * 10);
        }
    }

    #[test]
    fn test_advance_pc() {
        let mut regs = Registers::new();
        regs.jump(10);

        let old = regs.advance_pc();
        assert_eq!(old, 10);
        assert_eq!(regs.pc(), 11);
        assert_eq!(regs.get(PC), 11);
    }

    #[test]
    fn test_register_names() {
        assert_eq!(register_number("r0"), Some(0));
        assert_eq!(register_number("zero"), Some(0));
        assert_eq!(register_number("r15"), Some(15));
        assert_eq!(register_number("pc"), Some(15));
        assert_eq!(register_number("r16"), None);
        assert_eq!(register_number("r"), None);
        assert_eq!(register_number("r01"), None);
        assert_eq!(register_number("x1"), None);
    }
}
