//! Controller configuration
//!
//! Read from a TOML file with two optional sections:
//!
//! ```toml
//! [link]
//! baudrate = 115200
//!
//! [run]
//! cycles = 20
//! phase_interval_ms = 500
//! ```
//!
//! Missing sections and keys fall back to their defaults.

pub mod types;

pub use types::*;

/// Parse and validate a TOML configuration
#[cfg(feature = "serde")]
pub fn parse_config(input: &str) -> Result<ControllerConfig, ConfigError> {
    let config: ControllerConfig = toml::from_str(input).map_err(|_e| {
        #[cfg(feature = "defmt")]
        defmt::warn!("TOML parse error: {}", defmt::Debug2Format(&_e));
        ConfigError::Parse
    })?;
    config.validate()?;
    Ok(config)
}
