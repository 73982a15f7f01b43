//! Code generation: mallard AST to Duck Machine assembly.
//!
//! Each expression is evaluated into a target register. Binary operators
//! evaluate their right operand into a scratch register taken from a
//! pool of r1..r14 and return it afterwards. Constants and variables
//! live in labelled DATA cells emitted after the code and reached
//! through PC-relative `LOAD`/`STORE`.

use crate::cpu::registers::ZERO;
use crate::isa::Word;
use crate::lang::ast::{Block, Expr, Relation, Stmt};
use std::collections::BTreeMap;
use thiserror::Error;

/// Input port read by `read`.
pub const INPUT_PORT: Word = 510;
/// Output port written by `print`.
pub const OUTPUT_PORT: Word = 511;

/// A general register, printed as `rN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Reg(u8);

impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}", self.0)
    }
}

const R0: Reg = Reg(ZERO);

/// State of code generation.
pub struct Context {
    /// Constant value -> label, emitted in value order.
    consts: BTreeMap<Word, String>,
    /// Variable name -> label, emitted in name order.
    vars: BTreeMap<String, String>,
    lines: Vec<String>,
    /// Free registers; allocation takes from the end.
    registers: Vec<Reg>,
    label_count: usize,
}

impl Context {
    pub fn new() -> Self {
        Self {
            consts: BTreeMap::new(),
            vars: BTreeMap::new(),
            lines: Vec::new(),
            registers: (1..15).map(Reg).collect(),
            label_count: 0,
        }
    }

    /// Add a line of assembly code.
    pub fn add_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// All generated code followed by the constant and variable cells.
    pub fn lines(&self) -> Vec<String> {
        let mut code = self.lines.clone();
        for (value, label) in &self.consts {
            code.push(format!("{}:  DATA {}", label, value));
        }
        for label in self.vars.values() {
            code.push(format!("{}:  DATA 0", label));
        }
        code
    }

    /// A unique label starting with `prefix`.
    pub fn new_label(&mut self, prefix: &str) -> String {
        self.label_count += 1;
        format!("{}_{}", prefix, self.label_count)
    }

    fn const_label(&mut self, value: Word) -> String {
        self.consts
            .entry(value)
            .or_insert_with(|| {
                if value < 0 {
                    format!("const_n_{}", value.unsigned_abs())
                } else {
                    format!("const_{}", value)
                }
            })
            .clone()
    }

    fn var_label(&mut self, name: &str) -> String {
        self.vars
            .entry(name.to_string())
            .or_insert_with(|| format!("var_{}", name))
            .clone()
    }

    fn allocate(&mut self) -> Result<Reg, CodegenError> {
        self.registers.pop().ok_or(CodegenError::OutOfRegisters)
    }

    fn free(&mut self, reg: Reg) {
        self.registers.push(reg);
    }

    fn gen_block(&mut self, block: &Block, target: Reg) -> Result<(), CodegenError> {
        block.iter().try_for_each(|stmt| self.gen_stmt(stmt, target))
    }

    fn gen_stmt(&mut self, stmt: &Stmt, target: Reg) -> Result<(), CodegenError> {
        match stmt {
            Stmt::Assign { name, value } => {
                let label = self.var_label(name);
                self.gen_expr(value, target)?;
                self.add_line(format!("   STORE  {},{}", target, label));
            }
            Stmt::Print(expr) => {
                self.gen_expr(expr, target)?;
                self.add_line(format!("   STORE  {},r0,r0[{}]", target, OUTPUT_PORT));
            }
            Stmt::While { cond, body } => {
                let head = self.new_label("while_do");
                let exit = self.new_label("od");
                self.add_line(format!("{}:", head));
                self.gen_condjump(cond, target, &exit, false)?;
                self.gen_block(body, target)?;
                self.add_line(format!("   JUMP  {}", head));
                self.add_line(format!("{}:", exit));
            }
            Stmt::If { cond, then_part, else_part } => {
                let else_label = self.new_label("else");
                let fi_label = self.new_label("fi");
                self.gen_condjump(cond, target, &else_label, false)?;
                self.gen_block(then_part, target)?;
                self.add_line(format!("   JUMP  {}", fi_label));
                self.add_line(format!("{}:", else_label));
                self.gen_block(else_part, target)?;
                self.add_line(format!("{}:", fi_label));
            }
        }
        Ok(())
    }

    /// Jump to `label` if the relation's truth equals `jump_when`.
    fn gen_condjump(
        &mut self,
        rel: &Relation,
        target: Reg,
        label: &str,
        jump_when: bool,
    ) -> Result<(), CodegenError> {
        self.gen_expr(&rel.left, target)?;
        let reg = self.allocate()?;
        self.gen_expr(&rel.right, reg)?;
        let cond = if jump_when { rel.op.when_true() } else { rel.op.when_false() };
        self.add_line(format!("   SUB  {},{},{}", R0, target, reg));
        self.add_line(format!("   JUMP/{}  {}  #{}", cond, label, rel.op.symbol()));
        self.free(reg);
        Ok(())
    }

    fn gen_expr(&mut self, expr: &Expr, target: Reg) -> Result<(), CodegenError> {
        match expr {
            Expr::Int(value) => {
                let label = self.const_label(*value);
                self.add_line(format!("    LOAD {},{}", target, label));
            }
            Expr::Var(name) => {
                let label = self.var_label(name);
                self.add_line(format!("    LOAD {},{}", target, label));
            }
            Expr::Read => {
                self.add_line(format!("   LOAD  {},r0,r0[{}]", target, INPUT_PORT));
            }
            Expr::Neg(e) => {
                self.gen_expr(e, target)?;
                self.add_line(format!("    SUB  {},r0,{}  # Flip the sign", target, target));
            }
            Expr::Abs(e) => {
                self.gen_expr(e, target)?;
                let pos = self.new_label("already_positive");
                self.add_line(format!("    SUB  r0,{},r0  # <Abs>", target));
                self.add_line(format!("    JUMP/PZ {}", pos));
                self.add_line(format!("    SUB {},r0,{}  # Flip the sign", target, target));
                self.add_line(format!("{}:   # </Abs>", pos));
            }
            Expr::Binary { op, left, right } => {
                self.gen_expr(left, target)?;
                let reg = self.allocate()?;
                self.gen_expr(right, reg)?;
                self.add_line(format!("   {}  {},{},{}", op.opcode(), target, target, reg));
                self.free(reg);
            }
        }
        Ok(())
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate assembly for a whole program, ending with `HALT`.
pub fn generate(program: &Block) -> Result<Vec<String>, CodegenError> {
    let mut context = Context::new();
    context.add_line("# mallard compiler output");
    context.add_line("#");
    let work = context.allocate()?;
    context.gen_block(program, work)?;
    context.free(work);
    context.add_line("\tHALT  r0,r0,r0");
    let lines = context.lines();
    log::debug!("generated {} lines of assembly", lines.len());
    Ok(lines)
}

/// Errors that can occur during code generation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    #[error("expression too deeply nested: out of registers")]
    OutOfRegisters,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::parse::parse;

    /// Collapse whitespace runs and drop blank and comment-only lines.
    fn crush(lines: &[String]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .collect()
    }

    fn expect(lines: &[String], expected: &str) {
        let expected: Vec<String> = expected.lines().map(String::from).collect();
        assert_eq!(crush(lines), crush(&expected));
    }

    fn gen(source: &str) -> Vec<String> {
        generate(&parse(source).unwrap()).unwrap()
    }

    #[test]
    fn test_constants() {
        let mut context = Context::new();
        context.gen_expr(&Expr::Int(42), Reg(12)).unwrap();
        context.gen_expr(&Expr::Int(-42), Reg(12)).unwrap();
        context.gen_expr(&Expr::Int(42), Reg(11)).unwrap();
        expect(
            &context.lines(),
            "LOAD r12,const_42
             LOAD r12,const_n_42
             LOAD r11,const_42
             const_n_42: DATA -42
             const_42: DATA 42",
        );
    }

    #[test]
    fn test_print_sum() {
        expect(
            &gen("print 3 + 4;"),
            "LOAD r14,const_3
             LOAD r13,const_4
             ADD r14,r14,r13
             STORE r14,r0,r0[511]
             HALT r0,r0,r0
             const_3: DATA 3
             const_4: DATA 4",
        );
    }

    #[test]
    fn test_assign_and_read() {
        expect(
            &gen("y = read; x = y;"),
            "LOAD r14,r0,r0[510]
             STORE r14,var_y
             LOAD r14,var_y
             STORE r14,var_x
             HALT r0,r0,r0
             var_x: DATA 0
             var_y: DATA 0",
        );
    }

    #[test]
    fn test_while() {
        expect(
            &gen("while x > 0 do x = x - 1; od;"),
            "while_do_1:
             LOAD r14,var_x
             LOAD r13,const_0
             SUB r0,r14,r13
             JUMP/MZ od_2 #>
             LOAD r14,var_x
             LOAD r13,const_1
             SUB r14,r14,r13
             STORE r14,var_x
             JUMP while_do_1
             od_2:
             HALT r0,r0,r0
             const_0: DATA 0
             const_1: DATA 1
             var_x: DATA 0",
        );
    }

    #[test]
    fn test_if_else() {
        expect(
            &gen("if x == 1 then print 1; else print 2; fi;"),
            "LOAD r14,var_x
             LOAD r13,const_1
             SUB r0,r14,r13
             JUMP/MP else_1 #==
             LOAD r14,const_1
             STORE r14,r0,r0[511]
             JUMP fi_2
             else_1:
             LOAD r14,const_2
             STORE r14,r0,r0[511]
             fi_2:
             HALT r0,r0,r0
             const_1: DATA 1
             const_2: DATA 2
             var_x: DATA 0",
        );
    }

    #[test]
    fn test_abs() {
        expect(
            &gen("print @x;"),
            "LOAD r14,var_x
             SUB r0,r14,r0 # <Abs>
             JUMP/PZ already_positive_1
             SUB r14,r0,r14 # Flip the sign
             already_positive_1: # </Abs>
             STORE r14,r0,r0[511]
             HALT r0,r0,r0
             var_x: DATA 0",
        );
    }

    #[test]
    fn test_out_of_registers() {
        let mut source = String::from("print 1");
        for _ in 0..20 {
            source.push_str(" + (1");
        }
        source.push_str(&")".repeat(20));
        source.push(';');
        let program = parse(&source).unwrap();
        assert_eq!(generate(&program), Err(CodegenError::OutOfRegisters));
    }
}
