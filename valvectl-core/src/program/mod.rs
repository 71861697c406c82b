//! Valve programs
//!
//! A program is a table of operations (which valves to open, which to
//! close) and three phase tables holding operation indices: phases run
//! once before the cycles, phases repeated each cycle, and phases run once
//! after. Table capacities match the board's default table sizes.

pub mod builtin;
pub mod parser;

use heapless::Vec;
use valvectl_protocol::command::PhaseTable;
use valvectl_protocol::valves::{ValveMask, ValveUpdate};

use crate::defaults::{
    SettingField, AFTER_PHASE_NUM, BEFORE_PHASE_NUM, OPERATION_NUM, PHASE_NUM,
};
use crate::settings::Settings;

pub use builtin::{five_phase_pump, toggle_valve};
pub use parser::parse_program;

/// Maximum operations per program
pub const MAX_OPERATIONS: usize = OPERATION_NUM as usize;

/// Maximum phases per cycle
pub const MAX_PHASES: usize = PHASE_NUM as usize;

/// Maximum phases before the cycles
pub const MAX_BEFORE_PHASES: usize = BEFORE_PHASE_NUM as usize;

/// Maximum phases after the cycles
pub const MAX_AFTER_PHASES: usize = AFTER_PHASE_NUM as usize;

/// Maximum bad line numbers kept in [`ProgramError::InvalidLines`]
pub const MAX_REPORTED_LINES: usize = 16;

/// Line numbers (1-based) that failed to parse
pub type LineList = Vec<u32, MAX_REPORTED_LINES>;

/// Program construction errors
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProgramError {
    /// Lines that are neither a section keyword nor ON/OFF clauses
    InvalidLines(LineList),
    /// Operation table is full
    TooManyOperations,
    /// A phase table is full
    TooManyPhases(PhaseTable),
    /// A phase refers to an operation that does not exist
    InvalidOperationIndex(u8),
    /// Valve number is zero or beyond the supported maximum
    ValveOutOfRange(u8),
    /// The same valve was given twice where distinct valves are required
    DuplicateValve(u8),
    /// Program needs more than the board provides
    ExceedsDevice {
        field: SettingField,
        needed: u16,
        available: u16,
    },
}

/// One valve action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Operation {
    /// Valves opened by this operation
    pub on: ValveMask,
    /// Valves closed by this operation
    pub off: ValveMask,
}

impl Operation {
    pub const fn new(on: ValveMask, off: ValveMask) -> Self {
        Self { on, off }
    }

    /// Open a single valve
    pub fn open(valve: u8) -> Result<Self, ProgramError> {
        Ok(Self::new(single(valve)?, ValveMask::empty()))
    }

    /// Close a single valve
    pub fn close(valve: u8) -> Result<Self, ProgramError> {
        Ok(Self::new(ValveMask::empty(), single(valve)?))
    }

    /// Wire form of this operation
    pub const fn update(&self) -> ValveUpdate {
        ValveUpdate::new(self.on, self.off)
    }

    /// Highest valve touched (0 for a no-op)
    pub const fn highest_valve(&self) -> u8 {
        self.on.union(self.off).highest()
    }
}

fn single(valve: u8) -> Result<ValveMask, ProgramError> {
    ValveMask::single(valve).ok_or(ProgramError::ValveOutOfRange(valve))
}

/// A complete valve program
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    operations: Vec<Operation, MAX_OPERATIONS>,
    phases: Vec<u8, MAX_PHASES>,
    before: Vec<u8, MAX_BEFORE_PHASES>,
    after: Vec<u8, MAX_AFTER_PHASES>,
}

impl Program {
    /// An empty program
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a program from explicit tables
    ///
    /// Operations are kept as given (duplicates included); every phase
    /// must refer to an existing operation.
    pub fn from_parts(
        operations: &[Operation],
        phases: &[u8],
        before: &[u8],
        after: &[u8],
    ) -> Result<Self, ProgramError> {
        let mut program = Self::new();
        program
            .operations
            .extend_from_slice(operations)
            .map_err(|_| ProgramError::TooManyOperations)?;

        for (table, indices) in [
            (PhaseTable::Before, before),
            (PhaseTable::Cycle, phases),
            (PhaseTable::After, after),
        ] {
            for &index in indices {
                program.push_index(table, index)?;
            }
        }
        Ok(program)
    }

    /// Append `operation` to a phase table
    ///
    /// Identical operations share one entry in the operation table.
    /// Returns the operation index used.
    pub fn push(&mut self, table: PhaseTable, operation: Operation) -> Result<u8, ProgramError> {
        let index = self.intern(operation)?;
        self.push_index(table, index)?;
        Ok(index)
    }

    fn intern(&mut self, operation: Operation) -> Result<u8, ProgramError> {
        if let Some(pos) = self.operations.iter().position(|op| *op == operation) {
            return Ok(pos as u8);
        }
        self.operations
            .push(operation)
            .map_err(|_| ProgramError::TooManyOperations)?;
        Ok((self.operations.len() - 1) as u8)
    }

    fn push_index(&mut self, table: PhaseTable, index: u8) -> Result<(), ProgramError> {
        if index as usize >= self.operations.len() {
            return Err(ProgramError::InvalidOperationIndex(index));
        }
        let full = match table {
            PhaseTable::Cycle => self.phases.push(index).is_err(),
            PhaseTable::Before => self.before.push(index).is_err(),
            PhaseTable::After => self.after.push(index).is_err(),
        };
        if full {
            return Err(ProgramError::TooManyPhases(table));
        }
        Ok(())
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Operation indices of a phase table
    pub fn phases(&self, table: PhaseTable) -> &[u8] {
        match table {
            PhaseTable::Cycle => &self.phases,
            PhaseTable::Before => &self.before,
            PhaseTable::After => &self.after,
        }
    }

    /// Highest valve used by any operation
    pub fn highest_valve(&self) -> u8 {
        self.operations
            .iter()
            .map(Operation::highest_valve)
            .max()
            .unwrap_or(0)
    }

    /// Check that the board described by `settings` can hold this program
    pub fn check_limits(&self, settings: &Settings) -> Result<(), ProgramError> {
        let checks = [
            (SettingField::OperationNum, self.operations.len()),
            (SettingField::PhaseNum, self.phases.len()),
            (SettingField::BeforePhaseNum, self.before.len()),
            (SettingField::AfterPhaseNum, self.after.len()),
        ];
        for (field, needed) in checks {
            let available = settings.get(field) as u16;
            if needed as u16 > available {
                return Err(ProgramError::ExceedsDevice {
                    field,
                    needed: needed as u16,
                    available,
                });
            }
        }

        let highest = self.highest_valve() as u16;
        if highest > settings.valve_count() {
            return Err(ProgramError::ExceedsDevice {
                field: SettingField::RegNum,
                needed: highest,
                available: settings.valve_count(),
            });
        }
        Ok(())
    }
}
