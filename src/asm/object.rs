//! Object code file format.
//!
//! An object file is plain text:
//! - One word per line, loaded sequentially from address 0
//! - Decimal (possibly negative) or `0x` hexadecimal
//! - Blank lines are ignored
//!
//! There is no header and no length prefix; end of file is end of program.

use crate::cpu::memory::{Memory, MemoryError};
use crate::isa::Word;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;

/// A loaded program image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectFile {
    /// Words in load order.
    pub words: Vec<Word>,
}

impl ObjectFile {
    pub fn new(words: Vec<Word>) -> Self {
        Self { words }
    }

    /// Get the number of words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Copy the image into `mem` starting at address 0.
    pub fn load_into(&self, mem: &mut Memory) -> Result<(), MemoryError> {
        mem.load_program(0, &self.words)
    }

    /// Render as object file text, one decimal word per line.
    pub fn to_text(&self) -> String {
        self.words.iter().map(|w| format!("{}\n", w)).collect()
    }
}

/// Parse object file text.
pub fn parse_object(text: &str) -> Result<ObjectFile, ObjectError> {
    parse_lines(text.lines().map(|l| Ok(l.to_string())))
}

fn parse_lines<I>(lines: I) -> Result<ObjectFile, ObjectError>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    let mut words = Vec::new();
    for (line_num, line_result) in lines.enumerate() {
        let line = line_result.map_err(|e| ObjectError::IoError(e.to_string()))?;
        let trimmed = line.trim();

        // Skip empty lines
        if trimmed.is_empty() {
            continue;
        }

        words.push(parse_word(trimmed).ok_or_else(|| ObjectError::ParseError {
            line: line_num + 1,
            text: trimmed.to_string(),
        })?);
    }
    Ok(ObjectFile { words })
}

fn parse_word(text: &str) -> Option<Word> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok().map(|v| v as Word),
        None => text.parse().ok(),
    }
}

/// Load an object file from disk.
pub fn load_object<P: AsRef<Path>>(path: P) -> Result<ObjectFile, ObjectError> {
    let file = std::fs::File::open(path.as_ref())
        .map_err(|e| ObjectError::IoError(e.to_string()))?;
    let object = parse_lines(BufReader::new(file).lines())?;
    log::debug!("read {} words from {}", object.len(), path.as_ref().display());
    Ok(object)
}

/// Save a program image to disk.
pub fn save_object<P: AsRef<Path>>(path: P, words: &[Word]) -> Result<(), ObjectError> {
    let mut file = std::fs::File::create(path.as_ref())
        .map_err(|e| ObjectError::IoError(e.to_string()))?;

    for word in words {
        writeln!(file, "{}", word).map_err(|e| ObjectError::IoError(e.to_string()))?;
    }

    Ok(())
}

/// Errors that can occur reading or writing object files.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error on line {line}: '{text}' is not a word")]
    ParseError { line: usize, text: String },
}
