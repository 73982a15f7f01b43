//! Machine configuration.
//!
//! Everything a host needs to wire up a machine: memory size, which
//! addresses are I/O ports, and an optional cycle budget. Loadable from a
//! JSON file; missing fields take their defaults.

use crate::cpu::memory::{Memory, PortMap, DEFAULT_MEMORY_SIZE};
use crate::isa::Word;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default address of the input port.
pub const DEFAULT_INPUT_PORT: Word = 510;
/// Default address of the output port.
pub const DEFAULT_OUTPUT_PORT: Word = 511;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Memory size in words.
    pub memory_size: usize,
    /// Address bound to the input hook, or `None` for plain storage.
    pub input_port: Option<Word>,
    /// Address bound to the output hook, or `None` for plain storage.
    pub output_port: Option<Word>,
    /// Stop after this many steps; `None` runs until HALT.
    pub max_cycles: Option<u64>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_SIZE,
            input_port: Some(DEFAULT_INPUT_PORT),
            output_port: Some(DEFAULT_OUTPUT_PORT),
            max_cycles: None,
        }
    }
}

impl MachineConfig {
    /// Read a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config = Self::from_json(&text)?;
        log::debug!("loaded {:?} from {}", config, path.as_ref().display());
        Ok(config)
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the memory is non-empty and every port lies inside it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_size == 0 {
            return Err(ConfigError::EmptyMemory);
        }
        for port in [self.input_port, self.output_port].into_iter().flatten() {
            if usize::try_from(port).map_or(true, |p| p >= self.memory_size) {
                return Err(ConfigError::PortOutOfRange {
                    port,
                    size: self.memory_size,
                });
            }
        }
        Ok(())
    }

    /// Build a memory with the configured ports bound to `input` and
    /// `output`. Hooks for ports that are not configured are dropped.
    pub fn build_memory(
        &self,
        input: impl FnMut(Word) -> Word + 'static,
        output: impl FnMut(Word, Word) + 'static,
    ) -> Result<Memory, ConfigError> {
        self.validate()?;
        let mut ports = PortMap::new();
        if let Some(addr) = self.input_port {
            ports = ports.input(addr, input);
        }
        if let Some(addr) = self.output_port {
            ports = ports.output(addr, output);
        }
        Ok(Memory::with_ports(self.memory_size, ports))
    }
}

/// Errors that can occur loading or applying a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("invalid configuration: {0}")]
    ParseError(String),

    #[error("memory size must be at least one word")]
    EmptyMemory,

    #[error("port address {port} outside {size}-word memory")]
    PortOutOfRange { port: Word, size: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_defaults() {
        let config = MachineConfig::default();
        assert_eq!(config.memory_size, 512);
        assert_eq!(config.input_port, Some(510));
        assert_eq!(config.output_port, Some(511));
        assert_eq!(config.max_cycles, None);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = MachineConfig::from_json(r#"{ "memory_size": 1024, "max_cycles": 50 }"#).unwrap();
        assert_eq!(config.memory_size, 1024);
        assert_eq!(config.output_port, Some(511));
        assert_eq!(config.max_cycles, Some(50));
    }

    #[test]
    fn test_null_port_disables_it() {
        let config = MachineConfig::from_json(r#"{ "input_port": null }"#).unwrap();
        assert_eq!(config.input_port, None);
    }

    #[test]
    fn test_rejects_bad_config() {
        assert_eq!(
            MachineConfig::from_json(r#"{ "memory_size": 256 }"#),
            Err(ConfigError::PortOutOfRange { port: 510, size: 256 })
        );
        assert_eq!(
            MachineConfig::from_json(r#"{ "memory_size": 0 }"#),
            Err(ConfigError::EmptyMemory)
        );
        assert!(matches!(
            MachineConfig::from_json("{ not json"),
            Err(ConfigError::ParseError(_))
        ));
        let negative = MachineConfig { output_port: Some(-1), ..MachineConfig::default() };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_build_memory_binds_ports() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let config = MachineConfig {
            memory_size: 64,
            input_port: Some(60),
            output_port: Some(61),
            max_cycles: None,
        };
        let mut mem = config.build_memory(|_| 9, move |_, v| sink.borrow_mut().push(v)).unwrap();

        assert_eq!(mem.size(), 64);
        assert_eq!(mem.get(60).unwrap(), 9);
        mem.put(61, 4).unwrap();
        assert_eq!(*seen.borrow(), vec![4]);
        assert_eq!(mem.peek(61).unwrap(), 0);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = MachineConfig { max_cycles: Some(7), ..MachineConfig::default() };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(MachineConfig::from_json(&json).unwrap(), config);
    }
}
