//! The mallard language.
//!
//! A very small language with integers as the only data type. Programs
//! can be run directly by the [`Interpreter`] or compiled by [`compile`]
//! to assembly for the Duck Machine; both should print the same values.

pub mod ast;
pub mod codegen;
pub mod interp;
pub mod lex;
pub mod parse;

pub use ast::{BinOp, Block, Expr, RelOp, Relation, Stmt};
pub use codegen::{generate, CodegenError};
pub use interp::{EvalError, Interpreter};
pub use lex::{LexError, Token};
pub use parse::{parse, ParseError};

use thiserror::Error;

/// Compile mallard source to assembly source lines.
pub fn compile(source: &str) -> Result<Vec<String>, CompileError> {
    let program = parse(source)?;
    Ok(generate(&program)?)
}

/// Errors from [`compile`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("syntax error: {0}")]
    Parse(#[from] ParseError),

    #[error("code generation failed: {0}")]
    Codegen(#[from] CodegenError),
}
