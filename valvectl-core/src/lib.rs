//! Board-agnostic core logic for the valve controller
//!
//! This crate contains everything that does not depend on a specific serial
//! port or EEPROM chip:
//!
//! - EEPROM settings layout and its defaults
//! - Settings persistence with first-boot initialisation
//! - Valve programs, the program file parser and built-in programs
//! - Host-side controller driving a board over a serial link
//! - Controller configuration (TOML)

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod defaults;
pub mod program;
pub mod settings;

pub use client::{ClientError, ValveController};
pub use config::{ConfigError, ControllerConfig, LinkConfig, RunConfig};
pub use defaults::{SettingField, DEFAULT_LAYOUT, LAYOUT_LEN};
pub use program::{Operation, Program, ProgramError};
pub use settings::{LayoutStatus, Settings, SettingsError, SettingsStore};
