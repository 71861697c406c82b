//! valvectl Hardware Abstraction Layer
//!
//! Traits for the two pieces of hardware the valve controller touches
//! outside of its shift registers: the serial link to the host and the
//! on-chip EEPROM holding the settings layout.
//!
//! # Traits
//!
//! - [`uart::UartTx`], [`uart::UartRx`] - Serial communication
//! - [`eeprom::Eeprom`] - Byte-addressed persistent storage

#![no_std]
#![deny(unsafe_code)]

pub mod eeprom;
pub mod uart;

// Re-export key traits at crate root for convenience
pub use eeprom::{Eeprom, EepromError, RamEeprom};
pub use uart::{Uart, UartConfig, UartRx, UartTx};
