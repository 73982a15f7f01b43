//! CPU execution engine for the Duck Machine.
//!
//! Implements the fetch-decode-execute cycle. Each step:
//!
//! 1. fetches the word addressed by r15 and decodes it,
//! 2. notifies step observers,
//! 3. skips the instruction (PC + 1) if its predicate does not overlap
//!    the condition register,
//! 4. otherwise runs the ALU on `src1` and `src2 + offset`, advances the
//!    PC, and only then commits the result. Committing after the increment
//!    is what makes `ADD r15,r0,r15[-2]` a relative jump.

use std::fmt;
use std::io::{self, Write};
use crate::cpu::alu::Alu;
use crate::cpu::decode::{self, DecodeError, Instruction};
use crate::cpu::memory::{Memory, MemoryError};
use crate::cpu::registers::Registers;
use crate::isa::{CondFlag, OpClass, OpCode, Word};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed HALT instruction).
    Halted,
}

/// Published to observers after decode, before the instruction executes.
#[derive(Debug, Clone, Copy)]
pub struct StepEvent<'a> {
    /// Address the instruction was fetched from.
    pub pc: Word,
    /// Raw instruction word.
    pub word: u32,
    /// Decoded instruction.
    pub instr: Instruction,
    /// Register file as it stands before execution.
    pub registers: &'a Registers,
    /// Condition register before execution.
    pub condition: CondFlag,
}

impl fmt::Display for StepEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:03}: {:>10}  {:<24} cond={}",
            self.pc, self.word, self.instr.to_string(), self.condition
        )
    }
}

/// Receives a [`StepEvent`] at the start of every step.
///
/// Observers see the machine read-only and run synchronously in
/// registration order.
pub trait StepObserver {
    fn on_step(&mut self, event: &StepEvent<'_>);
}

impl<F> StepObserver for F
where
    F: FnMut(&StepEvent<'_>),
{
    fn on_step(&mut self, event: &StepEvent<'_>) {
        self(event)
    }
}

/// Writes one line per step, to stderr unless given another writer.
#[derive(Debug)]
pub struct TraceObserver<W: Write = io::Stderr> {
    out: W,
}

impl TraceObserver {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl Default for TraceObserver {
    fn default() -> Self {
        Self::stderr()
    }
}

impl<W: Write> TraceObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> StepObserver for TraceObserver<W> {
    fn on_step(&mut self, event: &StepEvent<'_>) {
        if let Err(e) = writeln!(self.out, "{}", event) {
            log::warn!("trace output failed: {}", e);
        }
    }
}

/// Serializable view of CPU state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub registers: Registers,
    pub condition: CondFlag,
    pub state: CpuState,
    pub cycles: u64,
}

/// The Duck Machine CPU.
///
/// The CPU owns its registers and ALU and borrows the memory it is
/// wired to for its whole lifetime.
pub struct Cpu<'m> {
    regs: Registers,
    alu: Alu,
    mem: &'m mut Memory,
    condition: CondFlag,
    state: CpuState,
    /// Instruction count (for profiling).
    cycles: u64,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
    observers: Vec<Box<dyn StepObserver + 'm>>,
    pause: Option<Box<dyn FnMut(u64) + 'm>>,
}

impl<'m> Cpu<'m> {
    /// Create a CPU connected to `mem`.
    ///
    /// Registers start at zero and the condition register starts at
    /// ALWAYS, so any predicate other than NEVER is initially satisfied.
    pub fn new(mem: &'m mut Memory) -> Self {
        Self {
            regs: Registers::new(),
            alu: Alu::new(),
            mem,
            condition: CondFlag::ALWAYS,
            state: CpuState::Running,
            cycles: 0,
            last_instr: None,
            observers: Vec::new(),
            pause: None,
        }
    }

    /// Register a step observer. Observers run in registration order.
    pub fn add_observer(&mut self, observer: impl StepObserver + 'm) {
        self.observers.push(Box::new(observer));
    }

    /// Install a hook called before every step of [`Cpu::run`], with the
    /// number of steps taken so far. Used for interactive single-stepping.
    pub fn set_pause_hook(&mut self, hook: impl FnMut(u64) + 'm) {
        self.pause = Some(Box::new(hook));
    }

    /// Reset registers, condition and counters. Memory is left alone.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.condition = CondFlag::ALWAYS;
        self.state = CpuState::Running;
        self.cycles = 0;
        self.last_instr = None;
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was fetched, whether or not its
    /// predicate let it execute.
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        // Fetch
        let pc = self.regs.pc();
        let word = self.mem.get(pc)? as u32;

        // Decode
        let instr = decode::decode(word).map_err(|source| CpuError::Decode { addr: pc, source })?;

        let event = StepEvent {
            pc,
            word,
            instr,
            registers: &self.regs,
            condition: self.condition,
        };
        log::trace!("{}", event);
        for observer in self.observers.iter_mut() {
            observer.on_step(&event);
        }

        self.cycles += 1;
        self.last_instr = Some(instr);

        // Predicate
        if !self.condition.intersects(instr.cond) {
            self.regs.advance_pc();
            return Ok(instr);
        }

        // Execute
        let left = self.regs.get(instr.src1);
        let right = self.regs.get(instr.src2).wrapping_add(Word::from(instr.offset));
        let (result, flag) = self.alu.apply(instr.op, left, right);

        // PC moves before commit so a write to r15 overrides the increment
        self.regs.advance_pc();

        match instr.op {
            OpCode::Store => {
                let value = self.regs.get(instr.target);
                self.mem.put(result, value)?;
            }
            OpCode::Load => {
                let value = self.mem.get(result)?;
                self.regs.put(instr.target, value);
            }
            OpCode::Halt => {
                log::info!("halted at address {} after {} steps", pc, self.cycles);
                self.state = CpuState::Halted;
            }
            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div => {
                self.regs.put(instr.target, result);
            }
        }
        if instr.op.class() == OpClass::Arithmetic {
            self.condition = flag;
        }

        Ok(instr)
    }

    /// Start at `from_addr` and run until HALT or an error.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self, from_addr: Word) -> Result<u64, CpuError> {
        self.run_inner(from_addr, None)
    }

    /// Like [`Cpu::run`], but give up after at most `max_cycles` steps.
    pub fn run_limited(&mut self, from_addr: Word, max_cycles: u64) -> Result<u64, CpuError> {
        self.run_inner(from_addr, Some(max_cycles))
    }

    fn run_inner(&mut self, from_addr: Word, limit: Option<u64>) -> Result<u64, CpuError> {
        self.state = CpuState::Running;
        self.regs.jump(from_addr);
        log::debug!("running from address {}", from_addr);

        let mut executed = 0u64;
        while self.state == CpuState::Running {
            if limit.is_some_and(|max| executed >= max) {
                log::warn!("stopped after {} steps without halting", executed);
                break;
            }
            if let Some(pause) = self.pause.as_mut() {
                pause(executed);
            }
            self.step()?;
            executed += 1;
        }

        Ok(executed)
    }

    /// The register file.
    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    /// Mutable register file, for setting up state before a run.
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    /// The memory this CPU is connected to.
    pub fn memory(&self) -> &Memory {
        &*self.mem
    }

    /// Mutable access to the connected memory.
    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut *self.mem
    }

    /// Current condition register.
    pub fn condition(&self) -> CondFlag {
        self.condition
    }

    /// Overwrite the condition register.
    pub fn set_condition(&mut self, condition: CondFlag) {
        self.condition = condition;
    }

    /// Current execution state.
    pub fn state(&self) -> CpuState {
        self.state
    }

    /// Total steps taken since creation or the last reset.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }

    /// Capture registers, condition, state and cycle count.
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            registers: self.regs.clone(),
            condition: self.condition,
            state: self.state,
            cycles: self.cycles,
        }
    }
}

impl fmt::Debug for Cpu<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("condition", &self.condition)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
///
/// Both kinds are fatal: the run stops and no further recovery is tried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("bad instruction at address {addr}: {source}")]
    Decode {
        addr: Word,
        #[source]
        source: DecodeError,
    },
}
