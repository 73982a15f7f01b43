//! Assembler and disassembler for Duck Machine programs.
//!
//! This module provides:
//! - A two-pass assembler (text → program image)
//! - The object code file format
//! - A disassembler (program image → readable text)

pub mod assembler;
pub mod disasm;
pub mod object;

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, disassemble_word};
pub use object::{load_object, parse_object, save_object, ObjectError, ObjectFile};
