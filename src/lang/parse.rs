//! Recursive-descent parser for mallard.
//!
//! ```text
//! program    ::= block END
//! block      ::= { stmt }
//! stmt       ::= (assignment | whilestmt | ifstmt | printstmt) ';'
//! whilestmt  ::= 'while' rel 'do' block 'od'
//! ifstmt     ::= 'if' rel 'then' block ['else' block] 'fi'
//! printstmt  ::= 'print' exp
//! rel        ::= exp ('=='|'!='|'<='|'>='|'<'|'>') exp
//! assignment ::= VAR '=' exp
//! exp        ::= term { ('+'|'-') term }
//! term       ::= primary { ('*'|'/') primary }
//! primary    ::= INT | VAR | 'read' | '~' primary | '@' primary | '(' exp ')'
//! ```

use crate::lang::ast::{BinOp, Block, Expr, RelOp, Relation, Stmt};
use crate::lang::lex::{tokenize, LexError, Spanned, Token};
use thiserror::Error;

/// Parse a whole program.
pub fn parse(source: &str) -> Result<Block, ParseError> {
    let tokens = tokenize(source).map_err(|(line, text, source)| ParseError::Lex { line, text, source })?;
    let mut parser = Parser { tokens, pos: 0 };
    let program = parser.block()?;
    if let Some(extra) = parser.peek_spanned() {
        return Err(ParseError::Unexpected {
            line: extra.line,
            expected: "a statement".into(),
            found: extra.token.to_string(),
        });
    }
    log::debug!("parsed {} top-level statements", program.len());
    Ok(program)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek_spanned(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek(&self) -> Option<&Token> {
        self.peek_spanned().map(|s| &s.token)
    }

    fn take(&mut self, expected: &str) -> Result<Spanned, ParseError> {
        let spanned = self.tokens.get(self.pos).cloned().ok_or_else(|| ParseError::UnexpectedEnd {
            expected: expected.to_string(),
        })?;
        self.pos += 1;
        Ok(spanned)
    }

    fn require(&mut self, token: Token) -> Result<(), ParseError> {
        let expected = format!("'{}'", token);
        let next = self.take(&expected)?;
        if next.token == token {
            Ok(())
        } else {
            Err(ParseError::Unexpected {
                line: next.line,
                expected,
                found: next.token.to_string(),
            })
        }
    }

    fn starts_stmt(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::While | Token::If | Token::Print | Token::Var(_))
        )
    }

    fn block(&mut self) -> Result<Block, ParseError> {
        let mut stmts = Vec::new();
        while self.starts_stmt() {
            stmts.push(self.stmt()?);
        }
        Ok(stmts)
    }

    fn stmt(&mut self) -> Result<Stmt, ParseError> {
        let first = self.take("a statement")?;
        let stmt = match first.token {
            Token::While => {
                let cond = self.relation()?;
                self.require(Token::Do)?;
                let body = self.block()?;
                self.require(Token::Od)?;
                Stmt::While { cond, body }
            }
            Token::If => {
                let cond = self.relation()?;
                self.require(Token::Then)?;
                let then_part = self.block()?;
                let else_part = if self.peek() == Some(&Token::Else) {
                    self.pos += 1;
                    self.block()?
                } else {
                    Vec::new()
                };
                self.require(Token::Fi)?;
                Stmt::If { cond, then_part, else_part }
            }
            Token::Print => Stmt::Print(self.expr()?),
            Token::Var(name) => {
                self.require(Token::Assign)?;
                Stmt::Assign { name, value: self.expr()? }
            }
            other => {
                return Err(ParseError::Unexpected {
                    line: first.line,
                    expected: "a statement".into(),
                    found: other.to_string(),
                })
            }
        };
        self.require(Token::Semi)?;
        Ok(stmt)
    }

    fn relation(&mut self) -> Result<Relation, ParseError> {
        let left = self.expr()?;
        let next = self.take("a comparison")?;
        let op = match next.token {
            Token::Eq => RelOp::Eq,
            Token::Ne => RelOp::Ne,
            Token::Lt => RelOp::Lt,
            Token::Le => RelOp::Le,
            Token::Gt => RelOp::Gt,
            Token::Ge => RelOp::Ge,
            other => {
                return Err(ParseError::Unexpected {
                    line: next.line,
                    expected: "a comparison".into(),
                    found: other.to_string(),
                })
            }
        };
        let right = self.expr()?;
        Ok(Relation { op, left, right })
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.term()?;
            left = Expr::binary(op, left, right);
        }
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.primary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Times) => BinOp::Mul,
                Some(Token::Div) => BinOp::Div,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.primary()?;
            left = Expr::binary(op, left, right);
        }
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let next = self.take("an expression")?;
        match next.token {
            Token::Int(n) => Ok(Expr::Int(n)),
            Token::Var(name) => Ok(Expr::Var(name)),
            Token::Read => Ok(Expr::Read),
            Token::Neg => Ok(Expr::Neg(Box::new(self.primary()?))),
            Token::Abs => Ok(Expr::Abs(Box::new(self.primary()?))),
            Token::LParen => {
                let nested = self.expr()?;
                self.require(Token::RParen)?;
                Ok(nested)
            }
            other => Err(ParseError::Unexpected {
                line: next.line,
                expected: "an expression".into(),
                found: other.to_string(),
            }),
        }
    }
}

/// Errors that can occur while parsing mallard source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: {source} '{text}'")]
    Lex {
        line: usize,
        text: String,
        #[source]
        source: LexError,
    },

    #[error("line {line}: expecting {expected}, found '{found}'")]
    Unexpected {
        line: usize,
        expected: String,
        found: String,
    },

    #[error("unexpected end of input, expecting {expected}")]
    UnexpectedEnd { expected: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Expr {
        Expr::Var(name.to_string())
    }

    #[test]
    fn test_precedence_and_associativity() {
        let program = parse("x = 1 + 2 * 3 - 4 / y;").unwrap();
        assert_eq!(program.len(), 1);
        let Stmt::Assign { name, value } = &program[0] else {
            panic!("expected assignment");
        };
        assert_eq!(name, "x");
        assert_eq!(value.to_string(), "((1 + (2 * 3)) - (4 / y))");
    }

    #[test]
    fn test_unary_and_parens() {
        let program = parse("print @(~x + read);").unwrap();
        assert_eq!(
            program[0],
            Stmt::Print(Expr::Abs(Box::new(Expr::binary(
                BinOp::Add,
                Expr::Neg(Box::new(var("x"))),
                Expr::Read,
            ))))
        );
    }

    #[test]
    fn test_while_and_if() {
        let source = "
            n = read;
            while n > 0 do
                if n == 3 then print n; else print 0; fi;
                n = n - 1;
            od;
        ";
        let program = parse(source).unwrap();
        assert_eq!(program.len(), 2);
        let Stmt::While { cond, body } = &program[1] else {
            panic!("expected while");
        };
        assert_eq!(cond.op, RelOp::Gt);
        assert_eq!(body.len(), 2);
        let Stmt::If { then_part, else_part, .. } = &body[0] else {
            panic!("expected if");
        };
        assert_eq!(then_part.len(), 1);
        assert_eq!(else_part.len(), 1);
    }

    #[test]
    fn test_if_without_else() {
        let program = parse("if x <= 2 then y = 1; fi;").unwrap();
        let Stmt::If { else_part, .. } = &program[0] else {
            panic!("expected if");
        };
        assert!(else_part.is_empty());
    }

    #[test]
    fn test_empty_program() {
        assert_eq!(parse("# nothing here\n").unwrap(), Vec::new());
    }

    #[test]
    fn test_missing_semicolon() {
        assert_eq!(
            parse("x = 1\nprint x;").unwrap_err(),
            ParseError::Unexpected { line: 2, expected: "';'".into(), found: "print".into() }
        );
    }

    #[test]
    fn test_relation_required() {
        let err = parse("while x do od;").unwrap_err();
        assert!(matches!(err, ParseError::Unexpected { line: 1, .. }));
    }

    #[test]
    fn test_trailing_garbage() {
        assert!(matches!(parse("print 1; )").unwrap_err(), ParseError::Unexpected { .. }));
    }

    #[test]
    fn test_unexpected_end() {
        assert!(matches!(parse("print (1 + 2").unwrap_err(), ParseError::UnexpectedEnd { .. }));
    }

    #[test]
    fn test_lex_error_surfaces() {
        assert!(matches!(
            parse("x = 1 $ 2;").unwrap_err(),
            ParseError::Lex { line: 1, source: LexError::InvalidSymbol, .. }
        ));
    }
}
