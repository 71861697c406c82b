//! Valve Control Serial Protocol
//!
//! This crate defines the serial protocol between the host and the
//! valve-control board (an Arduino driving daisy-chained 8-bit shift
//! registers). The protocol is deliberately bare: no framing, no checksum.
//!
//! # Protocol Overview
//!
//! Each command is one serial write:
//! ```text
//! ┌────────┬──────────────────────────┐
//! │ OPCODE │ PAYLOAD                  │
//! │ 1B     │ opcode-specific, ≤ 63B   │
//! └────────┴──────────────────────────┘
//! ```
//!
//! Stop and GetSettings answer with a fixed-length payload followed by
//! `\r\n`; every other command is fire-and-forget.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod command;
pub mod reply;
pub mod valves;

pub use command::{Command, CommandError, Packet, PhaseTable, MAX_COMMAND_SIZE, PHASE_CHUNK};
pub use reply::{ReplyError, ReplyReader, SettingsReply, StopReply};
pub use valves::{ValveMask, ValveUpdate, MAX_REGISTERS, MAX_VALVES, VALVES_PER_REGISTER};
