//! Program file parser
//!
//! Program files are plain text, one phase per line:
//!
//! ```text
//! BEFORE
//! ON 1 2
//! CYCLE
//! ON 3, OFF 1
//! OFF 2 3
//! AFTER
//! OFF 1 2 3
//! ```
//!
//! - `CYCLE`, `BEFORE` and `AFTER` select the phase table for the lines
//!   that follow (the file starts in `CYCLE`)
//! - every other line is a comma-separated list of `ON n ...` / `OFF n ...`
//!   clauses forming one operation
//! - keywords are case-insensitive and blank lines are ignored
//!
//! A bad line does not stop parsing: all bad line numbers are collected and
//! reported together. Table overflow is reported only when every line
//! parsed.

use valvectl_protocol::command::PhaseTable;
use valvectl_protocol::valves::ValveMask;

use super::{LineList, Operation, Program, ProgramError};

/// Parse a program file
pub fn parse_program(input: &str) -> Result<Program, ProgramError> {
    let mut program = Program::new();
    let mut table = PhaseTable::Cycle;
    let mut bad_lines = LineList::new();
    let mut invalid = false;
    let mut overflow = None;

    for (i, line) in input.lines().enumerate() {
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        if let Some(next) = parse_section(line) {
            table = next;
            continue;
        }

        match parse_operation(line) {
            Some(operation) => {
                if let Err(e) = program.push(table, operation) {
                    overflow.get_or_insert(e);
                }
            }
            None => {
                invalid = true;
                // Only the first MAX_REPORTED_LINES are kept
                let _ = bad_lines.push(i as u32 + 1);
            }
        }
    }

    if invalid {
        return Err(ProgramError::InvalidLines(bad_lines));
    }
    match overflow {
        Some(e) => Err(e),
        None => Ok(program),
    }
}

fn parse_section(line: &str) -> Option<PhaseTable> {
    if line.eq_ignore_ascii_case("CYCLE") {
        Some(PhaseTable::Cycle)
    } else if line.eq_ignore_ascii_case("BEFORE") {
        Some(PhaseTable::Before)
    } else if line.eq_ignore_ascii_case("AFTER") {
        Some(PhaseTable::After)
    } else {
        None
    }
}

/// Parse `ON 1 2, OFF 3` style clauses
fn parse_operation(line: &str) -> Option<Operation> {
    let mut on = ValveMask::empty();
    let mut off = ValveMask::empty();

    for clause in line.split(',') {
        let mut tokens = clause.split_whitespace();
        let target = match tokens.next()? {
            keyword if keyword.eq_ignore_ascii_case("ON") => &mut on,
            keyword if keyword.eq_ignore_ascii_case("OFF") => &mut off,
            _ => return None,
        };

        for token in tokens {
            let valve = token.parse::<u8>().ok()?;
            *target = target.with(valve)?;
        }
    }

    Some(Operation::new(on, off))
}
