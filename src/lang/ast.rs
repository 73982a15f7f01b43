//! Abstract syntax of mallard programs.

use crate::isa::{CondFlag, OpCode, Word};
use std::fmt;

/// Arithmetic operators, each backed by one machine opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    pub fn opcode(self) -> OpCode {
        match self {
            BinOp::Add => OpCode::Add,
            BinOp::Sub => OpCode::Sub,
            BinOp::Mul => OpCode::Mul,
            BinOp::Div => OpCode::Div,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        }
    }
}

/// Comparison operators.
///
/// Every comparison compiles to `SUB r0,left,right` followed by a jump
/// predicated on the sign of the difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl RelOp {
    pub fn symbol(self) -> &'static str {
        match self {
            RelOp::Eq => "==",
            RelOp::Ne => "!=",
            RelOp::Lt => "<",
            RelOp::Le => "<=",
            RelOp::Gt => ">",
            RelOp::Ge => ">=",
        }
    }

    /// Whether the relation holds between `left` and `right`.
    pub fn holds(self, left: Word, right: Word) -> bool {
        match self {
            RelOp::Eq => left == right,
            RelOp::Ne => left != right,
            RelOp::Lt => left < right,
            RelOp::Le => left <= right,
            RelOp::Gt => left > right,
            RelOp::Ge => left >= right,
        }
    }

    /// Predicate that is satisfied after `SUB r0,left,right` when the
    /// relation holds.
    pub fn when_true(self) -> CondFlag {
        match self {
            RelOp::Eq => CondFlag::Z,
            RelOp::Ne => CondFlag::P | CondFlag::M,
            RelOp::Lt => CondFlag::M,
            RelOp::Le => CondFlag::Z | CondFlag::M,
            RelOp::Gt => CondFlag::P,
            RelOp::Ge => CondFlag::P | CondFlag::Z,
        }
    }

    /// Predicate that is satisfied when the relation does not hold.
    pub fn when_false(self) -> CondFlag {
        match self {
            RelOp::Eq => CondFlag::P | CondFlag::M,
            RelOp::Ne => CondFlag::Z,
            RelOp::Lt => CondFlag::P | CondFlag::Z,
            RelOp::Le => CondFlag::P,
            RelOp::Gt => CondFlag::Z | CondFlag::M,
            RelOp::Ge => CondFlag::M,
        }
    }
}

/// A value-producing expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Int(Word),
    Var(String),
    /// Read an integer from input.
    Read,
    Neg(Box<Expr>),
    Abs(Box<Expr>),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int(n) => write!(f, "{}", n),
            Expr::Var(name) => f.write_str(name),
            Expr::Read => f.write_str("(read)"),
            Expr::Neg(e) => write!(f, "(~{})", e),
            Expr::Abs(e) => write!(f, "(@{})", e),
            Expr::Binary { op, left, right } => write!(f, "({} {} {})", left, op.symbol(), right),
        }
    }
}

/// The test of a `while` or `if`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub op: RelOp,
    pub left: Expr,
    pub right: Expr,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.op.symbol(), self.right)
    }
}

/// A statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Assign { name: String, value: Expr },
    Print(Expr),
    While { cond: Relation, body: Block },
    If { cond: Relation, then_part: Block, else_part: Block },
}

/// A sequence of statements; a whole program is one block.
pub type Block = Vec<Stmt>;

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Assign { name, value } => write!(f, "{} = {};", name, value),
            Stmt::Print(e) => write!(f, "print {};", e),
            Stmt::While { cond, body } => {
                writeln!(f, "while {} do", cond)?;
                for stmt in body {
                    writeln!(f, "{}", stmt)?;
                }
                f.write_str("od;")
            }
            Stmt::If { cond, then_part, else_part } => {
                writeln!(f, "if {} then", cond)?;
                for stmt in then_part {
                    writeln!(f, "{}", stmt)?;
                }
                if !else_part.is_empty() {
                    writeln!(f, "else")?;
                    for stmt in else_part {
                        writeln!(f, "{}", stmt)?;
                    }
                }
                f.write_str("fi;")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expr_display() {
        let e = Expr::binary(
            BinOp::Add,
            Expr::Int(3),
            Expr::binary(BinOp::Mul, Expr::Var("x".into()), Expr::Neg(Box::new(Expr::Int(2)))),
        );
        assert_eq!(e.to_string(), "(3 + (x * (~2)))");
    }

    #[test]
    fn test_predicates_partition_outcomes() {
        let ops = [RelOp::Eq, RelOp::Ne, RelOp::Lt, RelOp::Le, RelOp::Gt, RelOp::Ge];
        for op in ops {
            // True and false predicates cover M, Z, P exactly once between them
            assert!(!op.when_true().intersects(op.when_false()));
            assert_eq!(op.when_true() | op.when_false(), CondFlag::M | CondFlag::Z | CondFlag::P);
        }
    }

    #[test]
    fn test_predicates_match_holds() {
        use crate::cpu::Alu;
        let ops = [RelOp::Eq, RelOp::Ne, RelOp::Lt, RelOp::Le, RelOp::Gt, RelOp::Ge];
        for op in ops {
            for (l, r) in [(1, 2), (2, 2), (3, 2), (-5, 4)] {
                let flag = Alu::flag_for(l - r);
                assert_eq!(op.when_true().intersects(flag), op.holds(l, r), "{:?} {} {}", op, l, r);
            }
        }
    }

    #[test]
    fn test_stmt_display() {
        let stmt = Stmt::While {
            cond: Relation { op: RelOp::Gt, left: Expr::Var("n".into()), right: Expr::Int(0) },
            body: vec![Stmt::Print(Expr::Var("n".into()))],
        };
        assert_eq!(stmt.to_string(), "while n > 0 do\nprint n;\nod;");
    }
}
