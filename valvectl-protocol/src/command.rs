//! Host → board commands
//!
//! Every command is a single unframed serial write: an opcode byte followed
//! by its payload. Valve masks are `reg_num` bytes wide, so encoding and
//! parsing both need the board's current register count.

use heapless::Vec;

use crate::valves::{ValveMask, ValveUpdate, MAX_REGISTERS};

/// Largest packet the board accepts (the AVR serial receive buffer)
pub const MAX_COMMAND_SIZE: usize = 64;

/// Maximum phase indices sent in one SetPhase/SetBeforePhase/SetAfterPhase
pub const PHASE_CHUNK: usize = 10;

// Opcodes
pub const CMD_SET_REG_NUM: u8 = 0x00;
pub const CMD_SET_TOTAL_PHASES: u8 = 0x01;
pub const CMD_SET_OPERATION: u8 = 0x02;
pub const CMD_SET_PHASE: u8 = 0x03;
pub const CMD_SET_BEFORE_PHASE: u8 = 0x04;
pub const CMD_SET_AFTER_PHASE: u8 = 0x05;
pub const CMD_START: u8 = 0x06;
pub const CMD_STOP: u8 = 0x07;
pub const CMD_CONTROL_VALVES: u8 = 0x08;
pub const CMD_CLEAR_SHIFT_REGISTER: u8 = 0x09;
pub const CMD_CLEAR: u8 = 0x0A;
pub const CMD_UPDATE_EEPROM: u8 = 0x0B;
pub const CMD_RESTART: u8 = 0x0C;
pub const CMD_GET_SETTINGS: u8 = 0x0E;

/// Errors from command encoding or parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Encoded command would exceed [`MAX_COMMAND_SIZE`]
    TooLarge,
    /// More than [`PHASE_CHUNK`] phase indices in one command
    ChunkTooLarge,
    /// Register count is zero or above [`MAX_REGISTERS`]
    InvalidRegisterCount,
    /// A valve does not fit into the configured registers
    ValveOutOfRange,
    /// Packet is empty or its opcode is unknown
    UnknownOpcode,
    /// Payload length does not match the opcode
    InvalidLength,
}

/// Which phase table a SetPhase-style command writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhaseTable {
    /// Phases repeated every cycle
    Cycle,
    /// Phases run once before the first cycle
    Before,
    /// Phases run once after the last cycle
    After,
}

impl PhaseTable {
    /// Opcode of the command filling this table
    pub const fn opcode(self) -> u8 {
        match self {
            PhaseTable::Cycle => CMD_SET_PHASE,
            PhaseTable::Before => CMD_SET_BEFORE_PHASE,
            PhaseTable::After => CMD_SET_AFTER_PHASE,
        }
    }

    fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            CMD_SET_PHASE => Some(PhaseTable::Cycle),
            CMD_SET_BEFORE_PHASE => Some(PhaseTable::Before),
            CMD_SET_AFTER_PHASE => Some(PhaseTable::After),
            _ => None,
        }
    }
}

/// A command sent from the host to the board
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command<'a> {
    /// Set the number of 8-bit shift registers (board restarts)
    SetRegNum(u8),
    /// Set the lengths of the three phase tables
    SetTotalPhases { phases: u8, before: u8, after: u8 },
    /// Define operation `index`
    SetOperation { index: u8, update: ValveUpdate },
    /// Copy operation indices into a phase table starting at `offset`
    SetPhases {
        table: PhaseTable,
        offset: u8,
        operations: &'a [u8],
    },
    /// Run `cycles` cycles, `phase_interval_ms` apart per phase
    Start { cycles: u32, phase_interval_ms: u32 },
    /// Stop the running cycles; board replies with cycles completed
    Stop,
    /// Drive valves directly
    ControlValves(ValveUpdate),
    /// Reset shift register outputs
    ClearShiftRegister,
    /// Reset shift register outputs and all parameters
    Clear,
    /// Write raw bytes into EEPROM at `addr`
    UpdateEeprom { addr: u8, data: &'a [u8] },
    /// Restart the microcontroller
    Restart,
    /// Request the settings bytes stored in EEPROM
    GetSettings,
}

/// Encoded command bytes
pub type Packet = Vec<u8, MAX_COMMAND_SIZE>;

impl<'a> Command<'a> {
    /// Opcode byte of this command
    pub fn opcode(&self) -> u8 {
        match self {
            Command::SetRegNum(_) => CMD_SET_REG_NUM,
            Command::SetTotalPhases { .. } => CMD_SET_TOTAL_PHASES,
            Command::SetOperation { .. } => CMD_SET_OPERATION,
            Command::SetPhases { table, .. } => table.opcode(),
            Command::Start { .. } => CMD_START,
            Command::Stop => CMD_STOP,
            Command::ControlValves(_) => CMD_CONTROL_VALVES,
            Command::ClearShiftRegister => CMD_CLEAR_SHIFT_REGISTER,
            Command::Clear => CMD_CLEAR,
            Command::UpdateEeprom { .. } => CMD_UPDATE_EEPROM,
            Command::Restart => CMD_RESTART,
            Command::GetSettings => CMD_GET_SETTINGS,
        }
    }

    /// Encode for a board with `reg_num` shift registers
    pub fn encode(&self, reg_num: u8) -> Result<Packet, CommandError> {
        let mut packet = Packet::new();
        push(&mut packet, &[self.opcode()])?;

        match self {
            Command::SetRegNum(n) => {
                if *n == 0 || *n > MAX_REGISTERS {
                    return Err(CommandError::InvalidRegisterCount);
                }
                push(&mut packet, &[*n])?;
            }
            Command::SetTotalPhases {
                phases,
                before,
                after,
            } => push(&mut packet, &[*phases, *before, *after])?,
            Command::SetOperation { index, update } => {
                push(&mut packet, &[*index])?;
                push_update(&mut packet, update, reg_num)?;
            }
            Command::SetPhases {
                offset, operations, ..
            } => {
                if operations.len() > PHASE_CHUNK {
                    return Err(CommandError::ChunkTooLarge);
                }
                push(&mut packet, &[*offset])?;
                push(&mut packet, operations)?;
            }
            Command::Start {
                cycles,
                phase_interval_ms,
            } => {
                push(&mut packet, &cycles.to_le_bytes())?;
                push(&mut packet, &phase_interval_ms.to_le_bytes())?;
            }
            Command::ControlValves(update) => push_update(&mut packet, update, reg_num)?,
            Command::UpdateEeprom { addr, data } => {
                push(&mut packet, &[*addr])?;
                push(&mut packet, data)?;
            }
            Command::Stop
            | Command::ClearShiftRegister
            | Command::Clear
            | Command::Restart
            | Command::GetSettings => {}
        }

        Ok(packet)
    }

    /// Parse one packet as received by a board with `reg_num` registers
    pub fn parse(packet: &'a [u8], reg_num: u8) -> Result<Self, CommandError> {
        let (&opcode, payload) = packet.split_first().ok_or(CommandError::UnknownOpcode)?;
        let width = reg_num as usize;

        match opcode {
            CMD_SET_REG_NUM => match payload {
                [n] if *n >= 1 && *n <= MAX_REGISTERS => Ok(Command::SetRegNum(*n)),
                [_] => Err(CommandError::InvalidRegisterCount),
                _ => Err(CommandError::InvalidLength),
            },
            CMD_SET_TOTAL_PHASES => match payload {
                [phases, before, after] => Ok(Command::SetTotalPhases {
                    phases: *phases,
                    before: *before,
                    after: *after,
                }),
                _ => Err(CommandError::InvalidLength),
            },
            CMD_SET_OPERATION => {
                check_width(reg_num)?;
                if payload.len() != 1 + 2 * width {
                    return Err(CommandError::InvalidLength);
                }
                Ok(Command::SetOperation {
                    index: payload[0],
                    update: parse_update(&payload[1..], width)?,
                })
            }
            CMD_SET_PHASE | CMD_SET_BEFORE_PHASE | CMD_SET_AFTER_PHASE => {
                let (&offset, operations) =
                    payload.split_first().ok_or(CommandError::InvalidLength)?;
                if operations.len() > PHASE_CHUNK {
                    return Err(CommandError::ChunkTooLarge);
                }
                let table = PhaseTable::from_opcode(opcode).ok_or(CommandError::UnknownOpcode)?;
                Ok(Command::SetPhases {
                    table,
                    offset,
                    operations,
                })
            }
            CMD_START => {
                if payload.len() != 8 {
                    return Err(CommandError::InvalidLength);
                }
                Ok(Command::Start {
                    cycles: u32_le(&payload[..4]),
                    phase_interval_ms: u32_le(&payload[4..]),
                })
            }
            CMD_CONTROL_VALVES => {
                check_width(reg_num)?;
                if payload.len() != 2 * width {
                    return Err(CommandError::InvalidLength);
                }
                Ok(Command::ControlValves(parse_update(payload, width)?))
            }
            CMD_UPDATE_EEPROM => {
                let (&addr, data) = payload.split_first().ok_or(CommandError::InvalidLength)?;
                Ok(Command::UpdateEeprom { addr, data })
            }
            CMD_STOP => no_payload(payload, Command::Stop),
            CMD_CLEAR_SHIFT_REGISTER => no_payload(payload, Command::ClearShiftRegister),
            CMD_CLEAR => no_payload(payload, Command::Clear),
            CMD_RESTART => no_payload(payload, Command::Restart),
            CMD_GET_SETTINGS => no_payload(payload, Command::GetSettings),
            _ => Err(CommandError::UnknownOpcode),
        }
    }
}

fn push(packet: &mut Packet, bytes: &[u8]) -> Result<(), CommandError> {
    packet
        .extend_from_slice(bytes)
        .map_err(|_| CommandError::TooLarge)
}

fn push_update(packet: &mut Packet, update: &ValveUpdate, reg_num: u8) -> Result<(), CommandError> {
    check_width(reg_num)?;
    let mut buf = [0u8; MAX_REGISTERS as usize];

    for mask in [update.data(), update.mask()] {
        let len = mask
            .encode(reg_num, &mut buf)
            .ok_or(CommandError::ValveOutOfRange)?;
        push(packet, &buf[..len])?;
    }
    Ok(())
}

fn check_width(reg_num: u8) -> Result<(), CommandError> {
    if reg_num == 0 || reg_num > MAX_REGISTERS {
        return Err(CommandError::InvalidRegisterCount);
    }
    Ok(())
}

fn parse_update(payload: &[u8], width: usize) -> Result<ValveUpdate, CommandError> {
    let data = ValveMask::decode(&payload[..width]).ok_or(CommandError::InvalidRegisterCount)?;
    let mask = ValveMask::decode(&payload[width..]).ok_or(CommandError::InvalidRegisterCount)?;
    Ok(ValveUpdate::from_data_mask(data, mask))
}

fn no_payload<'a>(payload: &[u8], command: Command<'a>) -> Result<Command<'a>, CommandError> {
    if payload.is_empty() {
        Ok(command)
    } else {
        Err(CommandError::InvalidLength)
    }
}

fn u32_le(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    u32::from_le_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn valves(list: &[u8]) -> ValveMask {
        ValveMask::from_valves(list).unwrap()
    }

    #[test]
    fn test_set_reg_num() {
        let packet = Command::SetRegNum(4).encode(4).unwrap();
        assert_eq!(&packet[..], &[0x00, 0x04]);
        assert_eq!(
            Command::SetRegNum(0).encode(4),
            Err(CommandError::InvalidRegisterCount)
        );
    }

    #[test]
    fn test_set_total_phases() {
        let cmd = Command::SetTotalPhases {
            phases: 5,
            before: 3,
            after: 1,
        };
        assert_eq!(&cmd.encode(4).unwrap()[..], &[0x01, 5, 3, 1]);
    }

    #[test]
    fn test_set_operation_layout() {
        // on: valve 2, off: valve 10, two registers
        let cmd = Command::SetOperation {
            index: 7,
            update: ValveUpdate::new(valves(&[2]), valves(&[10])),
        };
        let packet = cmd.encode(2).unwrap();
        assert_eq!(&packet[..], &[0x02, 7, 0x00, 0x02, 0x02, 0x02]);
    }

    #[test]
    fn test_set_operation_valve_out_of_range() {
        let cmd = Command::SetOperation {
            index: 0,
            update: ValveUpdate::new(valves(&[9]), ValveMask::empty()),
        };
        assert_eq!(cmd.encode(1), Err(CommandError::ValveOutOfRange));
    }

    #[test]
    fn test_set_phases_chunk_limit() {
        let ops = [0u8; PHASE_CHUNK + 1];
        let cmd = Command::SetPhases {
            table: PhaseTable::Cycle,
            offset: 0,
            operations: &ops,
        };
        assert_eq!(cmd.encode(4), Err(CommandError::ChunkTooLarge));
    }

    #[test]
    fn test_set_before_phase_opcode() {
        let cmd = Command::SetPhases {
            table: PhaseTable::Before,
            offset: 10,
            operations: &[0, 1, 2],
        };
        assert_eq!(&cmd.encode(4).unwrap()[..], &[0x04, 10, 0, 1, 2]);
    }

    #[test]
    fn test_start_little_endian() {
        let cmd = Command::Start {
            cycles: 1000,
            phase_interval_ms: 250,
        };
        let packet = cmd.encode(4).unwrap();
        assert_eq!(&packet[..], &[0x06, 0xE8, 0x03, 0, 0, 0xFA, 0, 0, 0]);
    }

    #[test]
    fn test_no_payload_commands() {
        assert_eq!(&Command::Stop.encode(4).unwrap()[..], &[0x07]);
        assert_eq!(&Command::ClearShiftRegister.encode(4).unwrap()[..], &[0x09]);
        assert_eq!(&Command::Clear.encode(4).unwrap()[..], &[0x0A]);
        assert_eq!(&Command::Restart.encode(4).unwrap()[..], &[0x0C]);
        assert_eq!(&Command::GetSettings.encode(4).unwrap()[..], &[0x0E]);
    }

    #[test]
    fn test_update_eeprom_too_large() {
        let data = [0u8; MAX_COMMAND_SIZE];
        let cmd = Command::UpdateEeprom { addr: 0, data: &data };
        assert_eq!(cmd.encode(4), Err(CommandError::TooLarge));
    }

    #[test]
    fn test_parse_control_valves() {
        let update = ValveUpdate::new(valves(&[1, 12]), valves(&[3]));
        let packet = Command::ControlValves(update).encode(2).unwrap();
        assert_eq!(
            Command::parse(&packet, 2).unwrap(),
            Command::ControlValves(update)
        );
    }

    #[test]
    fn test_parse_start() {
        let packet = [0x06, 0x0A, 0, 0, 0, 0xE8, 0x03, 0, 0];
        assert_eq!(
            Command::parse(&packet, 4).unwrap(),
            Command::Start {
                cycles: 10,
                phase_interval_ms: 1000
            }
        );
    }

    #[test]
    fn test_parse_update_eeprom() {
        let packet = [0x0B, 0x01, 0x06];
        assert_eq!(
            Command::parse(&packet, 4).unwrap(),
            Command::UpdateEeprom {
                addr: 1,
                data: &[6]
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Command::parse(&[], 4), Err(CommandError::UnknownOpcode));
        assert_eq!(Command::parse(&[0x0D], 4), Err(CommandError::UnknownOpcode));
        assert_eq!(Command::parse(&[0x07, 0], 4), Err(CommandError::InvalidLength));
        assert_eq!(
            Command::parse(&[0x08, 0, 0, 0], 4),
            Err(CommandError::InvalidLength)
        );
        assert_eq!(
            Command::parse(&[0x00, 9], 4),
            Err(CommandError::InvalidRegisterCount)
        );
        assert_eq!(Command::parse(&[0x03], 4), Err(CommandError::InvalidLength));
    }

    #[test]
    fn test_parse_set_operation() {
        let packet = [0x02, 7, 0x00, 0x02, 0x02, 0x02];
        assert_eq!(
            Command::parse(&packet, 2).unwrap(),
            Command::SetOperation {
                index: 7,
                update: ValveUpdate::new(valves(&[2]), valves(&[10])),
            }
        );
    }

    #[test]
    fn test_parse_phase_tables() {
        for (opcode, table) in [
            (0x03, PhaseTable::Cycle),
            (0x04, PhaseTable::Before),
            (0x05, PhaseTable::After),
        ] {
            let packet = [opcode, 20, 1, 0, 2];
            assert_eq!(
                Command::parse(&packet, 4).unwrap(),
                Command::SetPhases {
                    table,
                    offset: 20,
                    operations: &[1, 0, 2],
                }
            );
        }
    }

    proptest! {
        #[test]
        fn prop_parse_inverts_encode(
            reg_num in 1u8..=MAX_REGISTERS,
            new_reg_num in 1u8..=MAX_REGISTERS,
            on_bytes in any::<[u8; MAX_REGISTERS as usize]>(),
            off_bytes in any::<[u8; MAX_REGISTERS as usize]>(),
            (index, offset, addr) in any::<(u8, u8, u8)>(),
            totals in any::<(u8, u8, u8)>(),
            table in 0usize..3,
            phases in proptest::collection::vec(any::<u8>(), 0..=PHASE_CHUNK),
            (cycles, phase_interval_ms) in any::<(u32, u32)>(),
            data in proptest::collection::vec(any::<u8>(), 0..=MAX_COMMAND_SIZE - 2),
        ) {
            let width = reg_num as usize;
            let mut off_disjoint = [0u8; MAX_REGISTERS as usize];
            for (out, (off, on)) in off_disjoint.iter_mut().zip(off_bytes.iter().zip(&on_bytes)) {
                *out = off & !on;
            }
            let update = ValveUpdate::new(
                ValveMask::decode(&on_bytes[..width]).unwrap(),
                ValveMask::decode(&off_disjoint[..width]).unwrap(),
            );
            let table = [PhaseTable::Cycle, PhaseTable::Before, PhaseTable::After][table];

            let commands = [
                Command::SetRegNum(new_reg_num),
                Command::SetTotalPhases {
                    phases: totals.0,
                    before: totals.1,
                    after: totals.2,
                },
                Command::SetOperation { index, update },
                Command::SetPhases {
                    table,
                    offset,
                    operations: &phases,
                },
                Command::Start {
                    cycles,
                    phase_interval_ms,
                },
                Command::Stop,
                Command::ControlValves(update),
                Command::ClearShiftRegister,
                Command::Clear,
                Command::UpdateEeprom { addr, data: &data },
                Command::Restart,
                Command::GetSettings,
            ];

            for cmd in commands {
                let packet = cmd.encode(reg_num).unwrap();
                prop_assert_eq!(Command::parse(&packet, reg_num), Ok(cmd));
            }
        }
    }
}
