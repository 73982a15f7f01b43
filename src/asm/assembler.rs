//! Two-pass assembler for Duck Machine programs.
//!
//! Syntax:
//! ```text
//! # Comment (';' works too)
//! again:  LOAD    r1,x            # r1 = mem[x], PC-relative
//!         SUB     r1,r1,r0[1]     # full form: target,src1,src2[offset]
//!         STORE   r1,x
//!         JUMP/P  again           # ADD/P r15,r0,r15[again - here]
//!         HALT    r0,r0,r0
//! x:      DATA    12
//! ```
//!
//! Pass 1 assigns an address to every line that occupies a word and
//! records labels. Pass 2 resolves label references relative to the
//! referencing instruction's address and encodes each word.

use crate::cpu::decode::{encode, Instruction, OFFSET_MAX, OFFSET_MIN};
use crate::cpu::registers::{register_number, PC, ZERO};
use crate::isa::{CondFlag, OpCode, Word};
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to a program image.
pub fn assemble(source: &str) -> Result<Vec<Word>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// One word-occupying source statement after pass 1.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Stmt {
    /// Literal data word.
    Data(Word),
    /// Fully specified instruction.
    Full(Instruction),
    /// `OP rT,label` or `JUMP label`, resolved in pass 2.
    Ref {
        op: OpCode,
        cond: CondFlag,
        target: u8,
        label: String,
    },
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> address, defining line).
    symbols: HashMap<String, (Word, usize)>,
    /// Statements in address order, with their source line.
    stmts: Vec<(usize, Stmt)>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            stmts: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<Word>, AssemblerError> {
        // Pass 1: Collect labels and parse statements
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: Resolve references and encode
        let words = self
            .stmts
            .iter()
            .enumerate()
            .map(|(addr, (line, stmt))| self.resolve(addr as Word, *line, stmt))
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!("assembled {} words, {} labels", words.len(), self.symbols.len());
        Ok(words)
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove comments
        let line = match line.find(['#', ';']) {
            Some(idx) => &line[..idx],
            None => line,
        };
        let mut line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        // Check for label definition
        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim();
            if !is_label(label) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid label '{}'", label),
                });
            }
            self.define(label, line_num)?;
            line = line[colon_idx + 1..].trim();
            if line.is_empty() {
                return Ok(());
            }
        }

        let stmt = parse_statement(line, line_num)?;
        self.stmts.push((line_num, stmt));
        Ok(())
    }

    fn define(&mut self, label: &str, line_num: usize) -> Result<(), AssemblerError> {
        let addr = self.stmts.len() as Word;
        if let Some(&(_, first)) = self.symbols.get(label) {
            return Err(AssemblerError::DuplicateLabel {
                line: line_num,
                label: label.to_string(),
                first,
            });
        }
        self.symbols.insert(label.to_string(), (addr, line_num));
        Ok(())
    }

    fn resolve(&self, addr: Word, line_num: usize, stmt: &Stmt) -> Result<Word, AssemblerError> {
        let instr = match stmt {
            Stmt::Data(value) => return Ok(*value),
            Stmt::Full(instr) => *instr,
            Stmt::Ref { op, cond, target, label } => {
                let &(label_addr, _) = self.symbols.get(label).ok_or_else(|| {
                    AssemblerError::UndefinedLabel {
                        line: line_num,
                        label: label.clone(),
                    }
                })?;
                let offset = check_offset(label_addr - addr, line_num)?;
                Instruction::new(*op, *cond, *target, ZERO, PC, offset)
            }
        };
        Ok(encode(&instr) as Word)
    }
}

/// Parse everything after the optional label.
fn parse_statement(text: &str, line_num: usize) -> Result<Stmt, AssemblerError> {
    let (mnemonic, operands) = match text.split_once(char::is_whitespace) {
        Some((m, rest)) => (m, rest.trim()),
        None => (text, ""),
    };
    let (name, pred) = match mnemonic.split_once('/') {
        Some((name, pred)) => (name, Some(pred)),
        None => (mnemonic, None),
    };

    if name == "DATA" {
        if pred.is_some() {
            return Err(syntax(line_num, "DATA takes no predicate"));
        }
        return parse_data(operands, line_num).map(Stmt::Data);
    }

    let cond = match pred {
        Some(p) => p.parse::<CondFlag>().map_err(|_| AssemblerError::BadPredicate {
            line: line_num,
            predicate: p.to_string(),
        })?,
        None => CondFlag::ALWAYS,
    };

    let parts: Vec<&str> = if operands.is_empty() {
        Vec::new()
    } else {
        operands.split(',').map(str::trim).collect()
    };

    if name == "JUMP" {
        return match parts.as_slice() {
            [label] if is_label(label) => Ok(Stmt::Ref {
                op: OpCode::Add,
                cond,
                target: PC,
                label: label.to_string(),
            }),
            _ => Err(syntax(line_num, "JUMP expects a single label")),
        };
    }

    let op = name.parse::<OpCode>().map_err(|_| AssemblerError::UnknownOpcode {
        line: line_num,
        mnemonic: name.to_string(),
    })?;

    match parts.as_slice() {
        [target, src1, src2] => {
            let target = parse_register(target, line_num)?;
            let src1 = parse_register(src1, line_num)?;
            let (src2, offset) = parse_src2(src2, line_num)?;
            Ok(Stmt::Full(Instruction::new(op, cond, target, src1, src2, offset)))
        }
        [target, label] if is_label(label) && register_number(label).is_none() => Ok(Stmt::Ref {
            op,
            cond,
            target: parse_register(target, line_num)?,
            label: label.to_string(),
        }),
        _ => Err(syntax(
            line_num,
            &format!("expected '{} rT,rS1,rS2[offset]' or '{} rT,label'", name, name),
        )),
    }
}

/// `rN` or `rN[offset]`.
fn parse_src2(text: &str, line_num: usize) -> Result<(u8, i16), AssemblerError> {
    let Some(open) = text.find('[') else {
        return Ok((parse_register(text, line_num)?, 0));
    };
    let inner = text[open + 1..]
        .strip_suffix(']')
        .ok_or_else(|| syntax(line_num, "unterminated offset"))?;
    let reg = parse_register(text[..open].trim(), line_num)?;
    let offset: i32 = inner
        .trim()
        .parse()
        .map_err(|_| syntax(line_num, &format!("invalid offset '{}'", inner)))?;
    Ok((reg, check_offset(offset, line_num)?))
}

fn parse_register(name: &str, line_num: usize) -> Result<u8, AssemblerError> {
    register_number(name).ok_or_else(|| AssemblerError::BadRegister {
        line: line_num,
        name: name.to_string(),
    })
}

fn parse_data(text: &str, line_num: usize) -> Result<Word, AssemblerError> {
    if text.is_empty() {
        return Ok(0);
    }

    // Check for hex literal
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16)
            .map(|v| v as Word)
            .map_err(|_| syntax(line_num, &format!("invalid hex literal '{}'", text)));
    }

    text.parse::<Word>()
        .map_err(|_| syntax(line_num, &format!("invalid data value '{}'", text)))
}

fn check_offset(offset: i32, line_num: usize) -> Result<i16, AssemblerError> {
    if (OFFSET_MIN..=OFFSET_MAX).contains(&offset) {
        Ok(offset as i16)
    } else {
        Err(AssemblerError::OffsetOutOfRange { line: line_num, offset })
    }
}

/// A label is a letter followed by letters, digits or underscores.
fn is_label(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn syntax(line: usize, message: &str) -> AssemblerError {
    AssemblerError::SyntaxError {
        line,
        message: message.to_string(),
    }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown opcode on line {line}: {mnemonic}")]
    UnknownOpcode { line: usize, mnemonic: String },

    #[error("bad register on line {line}: {name}")]
    BadRegister { line: usize, name: String },

    #[error("bad predicate on line {line}: {predicate}")]
    BadPredicate { line: usize, predicate: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label} (first defined on line {first})")]
    DuplicateLabel { line: usize, label: String, first: usize },

    #[error("offset out of range on line {line}: {offset}")]
    OffsetOutOfRange { line: usize, offset: i32 },
}

impl AssemblerError {
    /// Source line the error was found on (1-based).
    pub fn line(&self) -> usize {
        match self {
            Self::SyntaxError { line, .. }
            | Self::UnknownOpcode { line, .. }
            | Self::BadRegister { line, .. }
            | Self::BadPredicate { line, .. }
            | Self::UndefinedLabel { line, .. }
            | Self::DuplicateLabel { line, .. }
            | Self::OffsetOutOfRange { line, .. } => *line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::decode;

    fn decoded(word: Word) -> Instruction {
        decode(word as u32).unwrap()
    }

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            # Simple test program
            ADD   r1,r0,r0[10]
            SUB/M r2,r1,r3
            STORE r1,r0,r0[511]    ; print
            HALT  r0,r0,r0
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result.len(), 4);
        assert_eq!(decoded(result[0]), Instruction::new(OpCode::Add, CondFlag::ALWAYS, 1, 0, 0, 10));
        assert_eq!(decoded(result[1]), Instruction::new(OpCode::Sub, CondFlag::M, 2, 1, 3, 0));
        assert_eq!(decoded(result[2]).offset, 511);
        assert_eq!(decoded(result[3]).op, OpCode::Halt);
    }

    #[test]
    fn test_assemble_with_labels() {
        let source = r#"
        again:  LOAD   r1,x
                SUB    r1,r1,r0[1]
                STORE  r1,x
                JUMP/P again
        done:
                HALT   r0,r0,r0
        x:      DATA   12
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result.len(), 6);
        // LOAD at 0 refers to x at 5
        assert_eq!(decoded(result[0]), Instruction::new(OpCode::Load, CondFlag::ALWAYS, 1, 0, 15, 5));
        // STORE at 2 refers to x at 5
        assert_eq!(decoded(result[2]), Instruction::new(OpCode::Store, CondFlag::ALWAYS, 1, 0, 15, 3));
        // JUMP at 3 back to 0
        assert_eq!(decoded(result[3]), Instruction::new(OpCode::Add, CondFlag::P, 15, 0, 15, -3));
        assert_eq!(result[5], 12);
    }

    #[test]
    fn test_forward_jump() {
        let result = assemble("JUMP end\nDATA 1\nend: HALT r0,r0,r0\n").unwrap();
        assert_eq!(decoded(result[0]), Instruction::new(OpCode::Add, CondFlag::ALWAYS, 15, 0, 15, 2));
    }

    #[test]
    fn test_assemble_data() {
        let source = r#"
            DATA 42
            DATA -17
            DATA
            DATA 0x1F
            DATA 0xFFFFFFFF
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result, vec![42, -17, 0, 31, -1]);
    }

    #[test]
    fn test_register_aliases() {
        let result = assemble("ADD pc,zero,pc[-1]").unwrap();
        assert_eq!(decoded(result[0]), Instruction::new(OpCode::Add, CondFlag::ALWAYS, 15, 0, 15, -1));
    }

    #[test]
    fn test_predicate_combinations() {
        let result = assemble("ADD/ZP r1,r0,r0\nADD/NEVER r1,r0,r0").unwrap();
        assert_eq!(decoded(result[0]).cond, CondFlag::Z | CondFlag::P);
        assert_eq!(decoded(result[1]).cond, CondFlag::NEVER);
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = assemble("HALT r0,r0,r0\nFROB r1,r2,r3").unwrap_err();
        assert_eq!(err, AssemblerError::UnknownOpcode { line: 2, mnemonic: "FROB".into() });

        let err = assemble("\n\nADD r1,r16,r0").unwrap_err();
        assert_eq!(err.line(), 3);
        assert!(matches!(err, AssemblerError::BadRegister { .. }));

        let err = assemble("ADD/Q r1,r0,r0").unwrap_err();
        assert!(matches!(err, AssemblerError::BadPredicate { line: 1, .. }));
    }

    #[test]
    fn test_undefined_label() {
        let err = assemble("LOAD r1,nowhere").unwrap_err();
        assert_eq!(err, AssemblerError::UndefinedLabel { line: 1, label: "nowhere".into() });
    }

    #[test]
    fn test_labels_are_case_sensitive() {
        assert!(assemble("Top: DATA 1\nJUMP top").is_err());
        assert!(assemble("Top: DATA 1\nJUMP Top").is_ok());
    }

    #[test]
    fn test_duplicate_label() {
        let err = assemble("x: DATA 1\nx: DATA 2").unwrap_err();
        assert_eq!(err, AssemblerError::DuplicateLabel { line: 2, label: "x".into(), first: 1 });
    }

    #[test]
    fn test_offset_range() {
        assert!(assemble("ADD r1,r0,r0[511]").is_ok());
        assert!(assemble("ADD r1,r0,r0[-512]").is_ok());
        assert_eq!(
            assemble("ADD r1,r0,r0[512]").unwrap_err(),
            AssemblerError::OffsetOutOfRange { line: 1, offset: 512 }
        );
    }

    #[test]
    fn test_label_reference_too_far() {
        let mut source = String::from("JUMP far\n");
        for _ in 0..600 {
            source.push_str("DATA 0\n");
        }
        source.push_str("far: HALT r0,r0,r0\n");
        assert!(matches!(
            assemble(&source).unwrap_err(),
            AssemblerError::OffsetOutOfRange { line: 1, offset: 601 }
        ));
    }

    #[test]
    fn test_malformed_lines() {
        assert!(matches!(assemble("ADD r1").unwrap_err(), AssemblerError::SyntaxError { .. }));
        assert!(matches!(assemble("ADD r1,r0,r0[5").unwrap_err(), AssemblerError::SyntaxError { .. }));
        assert!(matches!(assemble("DATA twelve").unwrap_err(), AssemblerError::SyntaxError { .. }));
        assert!(matches!(assemble("9lives: DATA 1").unwrap_err(), AssemblerError::SyntaxError { .. }));
    }
}
