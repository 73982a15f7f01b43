//! Tree-walking interpreter for mallard.
//!
//! Behaves like the compiled program running on the machine: values are
//! 32-bit words, arithmetic wraps, and division rounds toward negative
//! infinity. Unlike the machine, which turns division by zero into the
//! V flag, the interpreter reports it as an error.

use crate::cpu::Alu;
use crate::isa::{CondFlag, OpCode, Word};
use crate::lang::ast::{BinOp, Block, Expr, Relation, Stmt};
use std::collections::HashMap;
use thiserror::Error;

/// Supplies values for `read`; `None` means input is exhausted.
pub type ReadHook<'io> = Box<dyn FnMut() -> Option<Word> + 'io>;
/// Receives values from `print`.
pub type PrintHook<'io> = Box<dyn FnMut(Word) + 'io>;

/// Interpreter state: one global variable environment plus I/O hooks.
pub struct Interpreter<'io> {
    env: HashMap<String, Word>,
    alu: Alu,
    input: ReadHook<'io>,
    output: PrintHook<'io>,
}

impl<'io> Interpreter<'io> {
    pub fn new(
        input: impl FnMut() -> Option<Word> + 'io,
        output: impl FnMut(Word) + 'io,
    ) -> Self {
        Self {
            env: HashMap::new(),
            alu: Alu::new(),
            input: Box::new(input),
            output: Box::new(output),
        }
    }

    /// Execute every statement of `program` in order.
    pub fn run(&mut self, program: &Block) -> Result<(), EvalError> {
        for stmt in program {
            self.exec(stmt)?;
        }
        Ok(())
    }

    /// Current value of a variable, if it has been assigned.
    pub fn variable(&self, name: &str) -> Option<Word> {
        self.env.get(name).copied()
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<(), EvalError> {
        match stmt {
            Stmt::Assign { name, value } => {
                let value = self.eval(value)?;
                self.env.insert(name.clone(), value);
            }
            Stmt::Print(expr) => {
                let value = self.eval(expr)?;
                (self.output)(value);
            }
            Stmt::While { cond, body } => {
                while self.test(cond)? {
                    self.run(body)?;
                }
            }
            Stmt::If { cond, then_part, else_part } => {
                if self.test(cond)? {
                    self.run(then_part)?;
                } else {
                    self.run(else_part)?;
                }
            }
        }
        Ok(())
    }

    fn test(&mut self, rel: &Relation) -> Result<bool, EvalError> {
        let left = self.eval(&rel.left)?;
        let right = self.eval(&rel.right)?;
        // Same test the compiled code makes: the sign of the wrapped difference
        let (_, flag) = self.alu.apply(OpCode::Sub, left, right);
        Ok(rel.op.when_true().intersects(flag))
    }

    /// Evaluate an expression to a word.
    pub fn eval(&mut self, expr: &Expr) -> Result<Word, EvalError> {
        match expr {
            Expr::Int(n) => Ok(*n),
            Expr::Var(name) => self
                .variable(name)
                .ok_or_else(|| EvalError::UndefinedVariable(name.clone())),
            Expr::Read => (self.input)().ok_or(EvalError::InputExhausted),
            Expr::Neg(e) => Ok(self.eval(e)?.wrapping_neg()),
            Expr::Abs(e) => Ok(self.eval(e)?.wrapping_abs()),
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                if *op == BinOp::Div && right == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                match self.alu.apply(op.opcode(), left, right) {
                    (_, CondFlag::V) => Err(EvalError::Overflow { op: op.symbol(), left, right }),
                    (value, _) => Ok(value),
                }
            }
        }
    }
}

/// Errors that can occur while interpreting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("{0} has not been assigned a value")]
    UndefinedVariable(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("{left} {op} {right} does not fit in a word")]
    Overflow { op: &'static str, left: Word, right: Word },

    #[error("no more input")]
    InputExhausted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::parse::parse;

    /// Run `source` with the given input, returning everything printed.
    fn interpret(source: &str, input: &[Word]) -> Result<Vec<Word>, EvalError> {
        let program = parse(source).unwrap();
        let mut printed = Vec::new();
        let mut input = input.iter().copied();
        let mut interp = Interpreter::new(move || input.next(), |v| printed.push(v));
        interp.run(&program)?;
        drop(interp);
        Ok(printed)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(interpret("print 3 + 4 * 2;", &[]).unwrap(), vec![11]);
        assert_eq!(interpret("print (3 + 4) * 2;", &[]).unwrap(), vec![14]);
        assert_eq!(interpret("print ~3; print @(~5); print @7;", &[]).unwrap(), vec![-3, 5, 7]);
    }

    #[test]
    fn test_division_floors() {
        assert_eq!(interpret("print 7 / ~2; print 12 / ~3; print 7 / 2;", &[]).unwrap(), vec![-4, -4, 3]);
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(interpret("x = 0; print 1 / x;", &[]), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn test_undefined_variable() {
        assert_eq!(
            interpret("print y;", &[]),
            Err(EvalError::UndefinedVariable("y".into()))
        );
    }

    #[test]
    fn test_read_and_loop() {
        let source = "
            n = read;
            f = 1;
            while n > 0 do
                f = f * n;
                n = n - 1;
            od;
            print f;
        ";
        assert_eq!(interpret(source, &[5]).unwrap(), vec![120]);
        assert_eq!(interpret(source, &[]), Err(EvalError::InputExhausted));
    }

    #[test]
    fn test_if_else() {
        let source = "x = read; if x < 0 then print ~1; else print 1; fi;";
        assert_eq!(interpret(source, &[-4]).unwrap(), vec![-1]);
        assert_eq!(interpret(source, &[4]).unwrap(), vec![1]);
    }

    #[test]
    fn test_comparison_uses_wrapped_difference() {
        // i32::MIN - 1 wraps to i32::MAX, so the machine sees "greater"
        let source = "a = read; b = read; if a < b then print 1; else print 0; fi;";
        assert_eq!(interpret(source, &[Word::MIN, 1]).unwrap(), vec![0]);
        assert_eq!(interpret(source, &[-1, 1]).unwrap(), vec![1]);
    }

    #[test]
    fn test_variables_visible_after_run() {
        let program = parse("a = 2; b = a * a;").unwrap();
        let mut interp = Interpreter::new(|| None, |_| {});
        interp.run(&program).unwrap();
        assert_eq!(interp.variable("b"), Some(4));
        assert_eq!(interp.variable("c"), None);
    }
}
