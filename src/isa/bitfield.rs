//! Bit-range extraction and insertion.
//!
//! A [`BitField`] names the bits `low..=high` of a 32-bit word. Every
//! field of an instruction word is described by one of these, and the
//! encoder and decoder are nothing more than a sequence of `insert` and
//! `extract` calls over a table of fields.

use std::fmt;

/// A contiguous, inclusive range of bits within a 32-bit word.
///
/// Bits are numbered from 0 (least significant) to 31.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitField {
    low: u32,
    high: u32,
}

impl BitField {
    /// Create a field covering bits `low..=high`.
    ///
    /// # Panics
    /// Panics if `low > high` or `high > 31`. Field tables are built
    /// from constants, so this fires at compile time for bad layouts.
    pub const fn new(low: u32, high: u32) -> Self {
        assert!(low <= high, "bit field low bit must not exceed high bit");
        assert!(high <= 31, "bit field must fit in a 32-bit word");
        Self { low, high }
    }

    /// Lowest bit of the field.
    #[inline]
    pub const fn low(&self) -> u32 {
        self.low
    }

    /// Highest bit of the field.
    #[inline]
    pub const fn high(&self) -> u32 {
        self.high
    }

    /// Number of bits in the field.
    #[inline]
    pub const fn width(&self) -> u32 {
        self.high - self.low + 1
    }

    /// Mask of `width()` ones, right-aligned.
    #[inline]
    const fn value_mask(&self) -> u32 {
        if self.width() == 32 {
            u32::MAX
        } else {
            (1u32 << self.width()) - 1
        }
    }

    /// Mask selecting the field's bits in position.
    #[inline]
    pub const fn field_mask(&self) -> u32 {
        self.value_mask() << self.low
    }

    /// Extract the field as an unsigned value shifted down to bit 0.
    #[inline]
    pub const fn extract(&self, word: u32) -> u32 {
        (word >> self.low) & self.value_mask()
    }

    /// Extract the field, treating its top bit as a two's-complement sign.
    #[inline]
    pub const fn extract_signed(&self, word: u32) -> i32 {
        let unsigned = self.extract(word);
        let spare = 32 - self.width();
        ((unsigned << spare) as i32) >> spare
    }

    /// Replace the field's bits in `word` with `value`.
    ///
    /// `value` is masked to the field width first, so anything that does
    /// not fit is silently truncated. Bits outside the field are preserved.
    #[inline]
    pub const fn insert(&self, value: u32, word: u32) -> u32 {
        let bits = (value & self.value_mask()) << self.low;
        (word & !self.field_mask()) | bits
    }

    /// Insert a signed value in two's-complement form, truncated to width.
    #[inline]
    pub const fn insert_signed(&self, value: i32, word: u32) -> u32 {
        self.insert(value as u32, word)
    }

    /// Smallest value `extract_signed` can produce.
    pub const fn min_signed(&self) -> i32 {
        if self.width() == 32 {
            i32::MIN
        } else {
            -(1i32 << (self.width() - 1))
        }
    }

    /// Largest value `extract_signed` can produce.
    pub const fn max_signed(&self) -> i32 {
        if self.width() == 32 {
            i32::MAX
        } else {
            (1i32 << (self.width() - 1)) - 1
        }
    }
}

impl fmt::Debug for BitField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitField({}..={})", self.low, self.high)
    }
}
