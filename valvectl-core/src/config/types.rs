//! Controller configuration types
//!
//! Host-side settings for talking to a board and running programs on it.
//! Nothing here is stored on the board.

use valvectl_hal::uart::UartConfig;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default serial speed
pub const DEFAULT_BAUDRATE: u32 = 115200;

/// Default number of cycles per run
pub const DEFAULT_CYCLES: u32 = 1;

/// Default time between phases (ms)
pub const DEFAULT_PHASE_INTERVAL_MS: u32 = 1000;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// TOML could not be parsed into the expected structure
    Parse,
    /// Baud rate of zero
    ZeroBaudrate,
    /// Run with zero cycles
    ZeroCycles,
    /// Phase interval of zero
    ZeroPhaseInterval,
}

/// Serial link settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct LinkConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baudrate: DEFAULT_BAUDRATE,
        }
    }
}

impl LinkConfig {
    /// UART settings for this link (8N1)
    pub fn uart_config(&self) -> UartConfig {
        UartConfig::with_baudrate(self.baudrate)
    }
}

/// Parameters of one program run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct RunConfig {
    /// Number of cycles to run
    pub cycles: u32,
    /// Time between consecutive phases in milliseconds
    pub phase_interval_ms: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            cycles: DEFAULT_CYCLES,
            phase_interval_ms: DEFAULT_PHASE_INTERVAL_MS,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycles == 0 {
            return Err(ConfigError::ZeroCycles);
        }
        if self.phase_interval_ms == 0 {
            return Err(ConfigError::ZeroPhaseInterval);
        }
        Ok(())
    }
}

/// Complete controller configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct ControllerConfig {
    pub link: LinkConfig,
    pub run: RunConfig,
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.link.baudrate == 0 {
            return Err(ConfigError::ZeroBaudrate);
        }
        self.run.validate()
    }
}
