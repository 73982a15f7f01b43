//! CPU emulation for the Duck Machine.
//!
//! This module implements the complete machine:
//! - word-addressed memory with memory-mapped I/O ports
//! - 16 registers, r0 hard-wired to zero and r15 the program counter
//! - a predicated, three-operand instruction set
//! - an ALU that turns arithmetic faults into the V flag

pub mod memory;
pub mod registers;
pub mod decode;
pub mod alu;
pub mod execute;

pub use memory::{Memory, MemoryError, PortMap, DEFAULT_MEMORY_SIZE};
pub use registers::{register_number, Registers};
pub use decode::{decode, encode, Instruction, DecodeError};
pub use alu::Alu;
pub use execute::{Cpu, CpuError, CpuSnapshot, CpuState, StepEvent, StepObserver, TraceObserver};
