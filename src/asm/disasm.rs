//! Disassembler for Duck Machine programs.
//!
//! Converts object code back to readable assembly. Words that do not
//! decode are shown as `DATA`.

use crate::cpu::decode::decode;
use crate::isa::Word;

/// Disassemble a single word to text.
pub fn disassemble_word(word: Word) -> String {
    match decode(word as u32) {
        Ok(decoded) => decoded.to_string(),
        Err(_) => format!("DATA {}", word),
    }
}

/// Disassemble a program image, one line per word.
pub fn disassemble(words: &[Word]) -> String {
    let mut output = String::new();
    output.push_str("# Duck Machine disassembly\n");
    output.push_str("# addr       word   instruction\n");

    for (addr, word) in words.iter().enumerate() {
        output.push_str(&format!("{:03}: {:>11}   {}\n", addr, word, disassemble_word(*word)));
    }

    output
}
