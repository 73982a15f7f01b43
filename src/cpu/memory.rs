//! Duck Machine memory subsystem.
//!
//! Memory is a flat array of words addressed from 0. Individual addresses
//! can be bound to I/O ports when the memory is built: reading an input
//! port calls its hook instead of touching storage, and writing an output
//! port hands the value to its hook instead of storing it.

use std::collections::BTreeMap;
use std::fmt;
use crate::isa::Word;
use thiserror::Error;

/// Default memory size in words.
pub const DEFAULT_MEMORY_SIZE: usize = 512;

/// Called on a read of an input port with the port address.
pub type InputHook = Box<dyn FnMut(Word) -> Word>;
/// Called on a write to an output port with the port address and value.
pub type OutputHook = Box<dyn FnMut(Word, Word)>;

/// Address-to-hook bindings for memory-mapped I/O.
#[derive(Default)]
pub struct PortMap {
    inputs: BTreeMap<Word, InputHook>,
    outputs: BTreeMap<Word, OutputHook>,
}

impl PortMap {
    /// An empty map; every address is plain storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `addr` to an input hook.
    pub fn input(mut self, addr: Word, hook: impl FnMut(Word) -> Word + 'static) -> Self {
        self.inputs.insert(addr, Box::new(hook));
        self
    }

    /// Bind `addr` to an output hook.
    pub fn output(mut self, addr: Word, hook: impl FnMut(Word, Word) + 'static) -> Self {
        self.outputs.insert(addr, Box::new(hook));
        self
    }

    /// Addresses bound to input hooks.
    pub fn input_ports(&self) -> impl Iterator<Item = Word> + '_ {
        self.inputs.keys().copied()
    }

    /// Addresses bound to output hooks.
    pub fn output_ports(&self) -> impl Iterator<Item = Word> + '_ {
        self.outputs.keys().copied()
    }
}

impl fmt::Debug for PortMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortMap")
            .field("inputs", &self.inputs.keys().collect::<Vec<_>>())
            .field("outputs", &self.outputs.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Word-addressed main memory with optional I/O ports.
pub struct Memory {
    cells: Vec<Word>,
    ports: PortMap,
}

impl Memory {
    /// Create a memory of `size` zeroed words with no ports.
    pub fn new(size: usize) -> Self {
        Self::with_ports(size, PortMap::new())
    }

    /// Create a memory of `size` zeroed words with the given port bindings.
    pub fn with_ports(size: usize, ports: PortMap) -> Self {
        log::debug!("creating {}-word memory with {:?}", size, ports);
        Self {
            cells: vec![0; size],
            ports,
        }
    }

    /// Number of addressable words.
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    /// Read a word, triggering the input hook if `addr` is an input port.
    pub fn get(&mut self, addr: Word) -> Result<Word, MemoryError> {
        if let Some(hook) = self.ports.inputs.get_mut(&addr) {
            let value = hook(addr);
            log::trace!("input port {} -> {}", addr, value);
            return Ok(value);
        }
        self.peek(addr)
    }

    /// Write a word, triggering the output hook if `addr` is an output port.
    pub fn put(&mut self, addr: Word, value: Word) -> Result<(), MemoryError> {
        if let Some(hook) = self.ports.outputs.get_mut(&addr) {
            log::trace!("output port {} <- {}", addr, value);
            hook(addr, value);
            return Ok(());
        }
        let index = self.index(addr)?;
        log::trace!("store {} at {}", value, addr);
        self.cells[index] = value;
        Ok(())
    }

    /// Read backing storage without side effects, bypassing ports.
    pub fn peek(&self, addr: Word) -> Result<Word, MemoryError> {
        let index = self.index(addr)?;
        Ok(self.cells[index])
    }

    fn index(&self, addr: Word) -> Result<usize, MemoryError> {
        usize::try_from(addr)
            .ok()
            .filter(|&i| i < self.cells.len())
            .ok_or(MemoryError::AddressOutOfRange {
                addr,
                size: self.cells.len(),
            })
    }

    /// Clear all memory to zeros. Port bindings are kept.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Copy a program image into storage starting at `start_addr`.
    ///
    /// Ports are bypassed: the image always lands in backing storage.
    pub fn load_program(&mut self, start_addr: usize, program: &[Word]) -> Result<(), MemoryError> {
        let available = self.cells.len().saturating_sub(start_addr);
        if program.len() > available {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available,
            });
        }
        self.cells[start_addr..start_addr + program.len()].copy_from_slice(program);
        log::debug!("loaded {} words at address {}", program.len(), start_addr);
        Ok(())
    }

    /// Dump memory contents (for debugging).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, Word)> {
        let end = start.saturating_add(count).min(self.cells.len());
        (start.min(end)..end).map(|i| (i, self.cells[i])).collect()
    }

    /// Backing storage as a slice.
    pub fn cells(&self) -> &[Word] {
        &self.cells
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_SIZE)
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only count non-zero cells
        let non_zero = self.cells.iter().filter(|&&cell| cell != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &self.cells.len())
            .field("ports", &self.ports)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Address is outside valid memory range.
    #[error("memory address {addr} out of range for {size}-word memory")]
    AddressOutOfRange { addr: Word, size: usize },
    /// Program is too large to fit in memory.
    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}
