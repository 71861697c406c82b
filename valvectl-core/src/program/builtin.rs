//! Built-in programs

use valvectl_protocol::valves::ValveMask;

use super::{Operation, Program, ProgramError};

/// Open and close one valve, alternating every phase
pub fn toggle_valve(valve: u8) -> Result<Program, ProgramError> {
    let operations = [Operation::open(valve)?, Operation::close(valve)?];
    Program::from_parts(&operations, &[0, 1], &[], &[])
}

/// Peristaltic pump driven by three valves
///
/// The three valves (inlet, displacement chamber, outlet) must be distinct.
/// Before the first cycle all three are opened in order outlet, chamber,
/// inlet; the outlet is opened once more after the last cycle.
///
/// Each cycle runs five phases:
/// 1. close inlet and chamber
/// 2. open inlet
/// 3. close outlet
/// 4. open chamber
/// 5. open outlet
pub fn five_phase_pump(input: u8, dc: u8, output: u8) -> Result<Program, ProgramError> {
    if dc == input || dc == output {
        return Err(ProgramError::DuplicateValve(dc));
    }
    if input == output {
        return Err(ProgramError::DuplicateValve(input));
    }

    let open_output = Operation::open(output)?;
    let open_dc = Operation::open(dc)?;
    let open_input = Operation::open(input)?;
    let close_input_dc = Operation::new(ValveMask::empty(), open_input.on.union(open_dc.on));

    let operations = [
        open_output,
        open_dc,
        open_input,
        close_input_dc,
        Operation::close(output)?,
    ];
    Program::from_parts(&operations, &[3, 2, 4, 1, 0], &[0, 1, 2], &[0])
}
