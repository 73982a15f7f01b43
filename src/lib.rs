//! # Duck Machine
//!
//! A small 32-bit teaching computer: an assembly language, a two-pass
//! assembler, a tiny expression language that compiles to that assembly,
//! and a simulated CPU that fetches, decodes and executes the resulting
//! object code against a word-addressed memory with memory-mapped I/O.

pub mod isa;
pub mod cpu;
pub mod asm;
pub mod lang;
pub mod config;

// Re-export commonly used types
pub use isa::{BitField, CondFlag, OpCode, Word};
pub use cpu::{Cpu, CpuError, CpuSnapshot, CpuState, Memory, PortMap, Registers, Instruction, StepEvent, StepObserver, TraceObserver};
pub use asm::{assemble, disassemble, AssemblerError, ObjectFile, load_object, save_object};
pub use config::MachineConfig;
