//! Condition flags.
//!
//! The condition register of the CPU and the predicate field of an
//! instruction share one format, so an instruction is enabled exactly
//! when the two overlap.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::str::FromStr;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// A 4-bit set over {M, Z, P, V}.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CondFlag(u8);

impl CondFlag {
    /// Minus: last result was negative.
    pub const M: CondFlag = CondFlag(1);
    /// Zero: last result was zero.
    pub const Z: CondFlag = CondFlag(2);
    /// Positive: last result was positive.
    pub const P: CondFlag = CondFlag(4);
    /// Overflow: last operation faulted (e.g. division by zero).
    pub const V: CondFlag = CondFlag(8);
    /// Empty set; a predicate of NEVER never executes.
    pub const NEVER: CondFlag = CondFlag(0);
    /// All bits; the default predicate.
    pub const ALWAYS: CondFlag = CondFlag(1 | 2 | 4 | 8);

    /// Single-bit flags in canonical rendering order.
    pub const COMPONENTS: [(CondFlag, char); 4] = [
        (CondFlag::M, 'M'),
        (CondFlag::Z, 'Z'),
        (CondFlag::P, 'P'),
        (CondFlag::V, 'V'),
    ];

    /// Build from raw bits, rejecting anything beyond the four flag bits.
    pub fn from_bits(bits: u32) -> Option<Self> {
        if bits <= Self::ALWAYS.0 as u32 {
            Some(CondFlag(bits as u8))
        } else {
            None
        }
    }

    /// Raw bit value.
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if no bit is set.
    #[inline]
    pub const fn is_never(self) -> bool {
        self.0 == 0
    }

    /// True if any bit of `other` is also set in `self`.
    #[inline]
    pub const fn intersects(self, other: CondFlag) -> bool {
        self.0 & other.0 != 0
    }

    /// Exact alias for this value, if it has one.
    fn alias(self) -> Option<&'static str> {
        match self {
            CondFlag::NEVER => Some("NEVER"),
            CondFlag::ALWAYS => Some("ALWAYS"),
            CondFlag::M => Some("M"),
            CondFlag::Z => Some("Z"),
            CondFlag::P => Some("P"),
            CondFlag::V => Some("V"),
            _ => None,
        }
    }
}

impl BitAnd for CondFlag {
    type Output = CondFlag;

    fn bitand(self, rhs: Self) -> Self::Output {
        CondFlag(self.0 & rhs.0)
    }
}

impl BitOr for CondFlag {
    type Output = CondFlag;

    fn bitor(self, rhs: Self) -> Self::Output {
        CondFlag(self.0 | rhs.0)
    }
}

impl BitOrAssign for CondFlag {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

impl fmt::Display for CondFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.alias() {
            return f.write_str(name);
        }
        for (flag, letter) in CondFlag::COMPONENTS {
            if self.intersects(flag) {
                write!(f, "{}", letter)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CondFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CondFlag({})", self)
    }
}

impl FromStr for CondFlag {
    type Err = ParseFlagError;

    /// Accepts an alias (`NEVER`, `ALWAYS`, `Z`, ...) or any combination of
    /// component letters such as `ZP` or `PM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEVER" => return Ok(CondFlag::NEVER),
            "ALWAYS" => return Ok(CondFlag::ALWAYS),
            "" => return Err(ParseFlagError(s.to_string())),
            _ => {}
        }
        let mut flag = CondFlag::NEVER;
        for c in s.chars() {
            let (bit, _) = CondFlag::COMPONENTS
                .iter()
                .find(|(_, letter)| *letter == c)
                .ok_or_else(|| ParseFlagError(s.to_string()))?;
            flag |= *bit;
        }
        Ok(flag)
    }
}

/// Unknown predicate mnemonic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid condition flags: {0:?}")]
pub struct ParseFlagError(pub String);
