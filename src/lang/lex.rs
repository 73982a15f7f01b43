//! Tokens of the mallard language.
//!
//! Whitespace and `#` comments are skipped. An integer literal may carry a
//! leading minus sign, so `5-3` lexes as `5` followed by `-3`; write
//! `5 - 3` for subtraction.

use crate::isa::Word;
use logos::Logos;
use std::fmt;
use thiserror::Error;

#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"([ \t\r\n\f]+|#[^\n]*)", error = LexError)]
pub enum Token {
    #[token("while")]
    While,
    #[token("do")]
    Do,
    #[token("od")]
    Od,
    #[token("if")]
    If,
    #[token("then")]
    Then,
    #[token("else")]
    Else,
    #[token("fi")]
    Fi,
    #[token("read")]
    Read,
    #[token("print")]
    Print,
    #[token(";")]
    Semi,

    #[regex(r"-?[0-9]+", |lx| lx.slice().parse::<Word>().map_err(|_| LexError::IntOutOfRange))]
    Int(Word),
    #[regex(r"[a-zA-Z_]+", |lx| lx.slice().to_string())]
    Var(String),

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Times,
    #[token("/")]
    Div,
    /// Unary negation.
    #[token("~")]
    Neg,
    /// Absolute value.
    #[token("@")]
    Abs,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    #[token("==")]
    Eq,
    #[token("!=")]
    Ne,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("=")]
    Assign,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::While => "while",
            Token::Do => "do",
            Token::Od => "od",
            Token::If => "if",
            Token::Then => "then",
            Token::Else => "else",
            Token::Fi => "fi",
            Token::Read => "read",
            Token::Print => "print",
            Token::Semi => ";",
            Token::Int(n) => return write!(f, "{}", n),
            Token::Var(name) => return f.write_str(name),
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Times => "*",
            Token::Div => "/",
            Token::Neg => "~",
            Token::Abs => "@",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Eq => "==",
            Token::Ne => "!=",
            Token::Le => "<=",
            Token::Ge => ">=",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::Assign => "=",
        };
        f.write_str(text)
    }
}

/// A token and the 1-based line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

/// Split `source` into tokens.
///
/// On failure, returns the offending line, the text that failed to lex
/// and the reason.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, (usize, String, LexError)> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut scanned = 0;

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        line += source[scanned..span.start].matches('\n').count();
        scanned = span.start;
        match result {
            Ok(token) => tokens.push(Spanned { token, line }),
            Err(e) => return Err((line, lexer.slice().to_string(), e)),
        }
    }

    log::trace!("lexed {} tokens", tokens.len());
    Ok(tokens)
}

/// Reasons a piece of source text is not a token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
pub enum LexError {
    /// A character that starts no token.
    #[default]
    #[error("unrecognized symbol")]
    InvalidSymbol,
    #[error("integer literal does not fit in a word")]
    IntOutOfRange,
}
