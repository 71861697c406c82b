//! Host-side board controller
//!
//! Drives a valve-control board over a blocking serial link. The board's
//! register count sets the width of every valve mask, so the controller
//! reads the settings on connect and keeps a local copy in sync with the
//! commands it sends.

use valvectl_hal::uart::{UartRx, UartTx};
use valvectl_protocol::command::{Command, CommandError, PhaseTable, PHASE_CHUNK};
use valvectl_protocol::reply::{
    ReplyError, ReplyReader, SettingsReply, StopReply, SETTINGS_REPLY_LEN, STOP_REPLY_LEN,
};
use valvectl_protocol::valves::{ValveMask, ValveUpdate};

use crate::config::{ConfigError, RunConfig};
use crate::defaults::{SettingField, LAYOUT_LEN};
use crate::program::{Operation, Program, ProgramError};
use crate::settings::{Settings, SettingsError};

const _: () = assert!(SETTINGS_REPLY_LEN == LAYOUT_LEN);

/// Controller errors, generic over the link's error type
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClientError<E> {
    /// Serial link failure
    Uart(E),
    /// Malformed reply
    Reply(ReplyError),
    /// Command could not be encoded
    Command(CommandError),
    /// Program rejected
    Program(ProgramError),
    /// Board reported unusable settings
    Settings(SettingsError),
    /// Run parameters rejected
    Config(ConfigError),
    /// Start requested before a program was uploaded
    NoProgram,
}

impl<E> From<ReplyError> for ClientError<E> {
    fn from(e: ReplyError) -> Self {
        ClientError::Reply(e)
    }
}

impl<E> From<CommandError> for ClientError<E> {
    fn from(e: CommandError) -> Self {
        ClientError::Command(e)
    }
}

impl<E> From<ProgramError> for ClientError<E> {
    fn from(e: ProgramError) -> Self {
        ClientError::Program(e)
    }
}

impl<E> From<SettingsError> for ClientError<E> {
    fn from(e: SettingsError) -> Self {
        ClientError::Settings(e)
    }
}

impl<E> From<ConfigError> for ClientError<E> {
    fn from(e: ConfigError) -> Self {
        ClientError::Config(e)
    }
}

/// Controller for one connected board
pub struct ValveController<U> {
    uart: U,
    settings: Settings,
    program_loaded: bool,
}

impl<U, E> ValveController<U>
where
    U: UartTx<Error = E> + UartRx<Error = E>,
{
    /// Take over a serial link and read the board settings
    pub fn connect(uart: U) -> Result<Self, ClientError<E>> {
        let mut controller = Self {
            uart,
            settings: Settings::default(),
            program_loaded: false,
        };
        controller.refresh_settings()?;
        Ok(controller)
    }

    /// Settings as last read from or written to the board
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Whether a program has been uploaded since the last reset
    pub fn has_program(&self) -> bool {
        self.program_loaded
    }

    /// Give back the serial link
    pub fn into_inner(self) -> U {
        self.uart
    }

    /// Re-read the settings stored on the board
    pub fn refresh_settings(&mut self) -> Result<Settings, ClientError<E>> {
        self.send(&Command::GetSettings)?;

        let mut payload = [0u8; SETTINGS_REPLY_LEN];
        self.read_reply(&mut payload)?;
        let reply = SettingsReply::from_payload(&payload);

        let settings = Settings::from_bytes(&reply.bytes);
        settings.validate()?;

        #[cfg(feature = "defmt")]
        defmt::info!("Board settings: {}", settings);

        self.settings = settings;
        Ok(settings)
    }

    /// Change the number of shift registers
    ///
    /// The board stores the value and restarts, dropping any uploaded
    /// program.
    pub fn set_reg_num(&mut self, reg_num: u8) -> Result<(), ClientError<E>> {
        let mut settings = self.settings;
        settings.reg_num = reg_num;
        settings.validate()?;

        self.send(&Command::SetRegNum(reg_num))?;
        self.settings = settings;
        self.program_loaded = false;
        Ok(())
    }

    pub fn set_total_phases(
        &mut self,
        phases: u8,
        before: u8,
        after: u8,
    ) -> Result<(), ClientError<E>> {
        self.send(&Command::SetTotalPhases {
            phases,
            before,
            after,
        })
    }

    pub fn set_operation(&mut self, index: u8, operation: &Operation) -> Result<(), ClientError<E>> {
        self.send(&Command::SetOperation {
            index,
            update: operation.update(),
        })
    }

    /// Write operation indices into a phase table starting at `offset`
    ///
    /// Sent in chunks of [`PHASE_CHUNK`] indices.
    pub fn set_phases(
        &mut self,
        table: PhaseTable,
        offset: u8,
        indices: &[u8],
    ) -> Result<(), ClientError<E>> {
        for (i, chunk) in indices.chunks(PHASE_CHUNK).enumerate() {
            let chunk_offset = (i * PHASE_CHUNK)
                .checked_add(offset as usize)
                .and_then(|o| u8::try_from(o).ok())
                .ok_or(CommandError::TooLarge)?;
            self.send(&Command::SetPhases {
                table,
                offset: chunk_offset,
                operations: chunk,
            })?;
        }
        Ok(())
    }

    /// Upload a complete program
    ///
    /// Sends the table lengths, every operation, then the cycle, before and
    /// after phase tables.
    pub fn upload_program(&mut self, program: &Program) -> Result<(), ClientError<E>> {
        program.check_limits(&self.settings)?;

        let cycle = program.phases(PhaseTable::Cycle);
        let before = program.phases(PhaseTable::Before);
        let after = program.phases(PhaseTable::After);

        #[cfg(feature = "defmt")]
        defmt::info!(
            "Uploading program: {} operations, {}/{}/{} phases",
            program.operations().len(),
            cycle.len(),
            before.len(),
            after.len()
        );

        // Lengths fit in u8 after check_limits
        self.program_loaded = false;
        self.set_total_phases(cycle.len() as u8, before.len() as u8, after.len() as u8)?;

        for (index, operation) in program.operations().iter().enumerate() {
            self.set_operation(index as u8, operation)?;
        }

        for (table, indices) in [
            (PhaseTable::Cycle, cycle),
            (PhaseTable::Before, before),
            (PhaseTable::After, after),
        ] {
            self.set_phases(table, 0, indices)?;
        }

        self.program_loaded = true;
        Ok(())
    }

    /// Start running the uploaded program
    pub fn start(&mut self, run: &RunConfig) -> Result<(), ClientError<E>> {
        if !self.program_loaded {
            return Err(ClientError::NoProgram);
        }
        run.validate()?;

        #[cfg(feature = "defmt")]
        defmt::info!(
            "Starting {} cycles, {} ms per phase",
            run.cycles,
            run.phase_interval_ms
        );

        self.send(&Command::Start {
            cycles: run.cycles,
            phase_interval_ms: run.phase_interval_ms,
        })
    }

    /// Stop the running cycles, returning the number completed
    pub fn stop(&mut self) -> Result<u32, ClientError<E>> {
        self.send(&Command::Stop)?;

        let mut payload = [0u8; STOP_REPLY_LEN];
        self.read_reply(&mut payload)?;
        let reply = StopReply::from_payload(&payload);

        #[cfg(feature = "defmt")]
        defmt::info!("Stopped after {} cycles", reply.cycles_completed);

        Ok(reply.cycles_completed)
    }

    /// Drive valves directly
    pub fn control_valves(&mut self, update: ValveUpdate) -> Result<(), ClientError<E>> {
        self.send(&Command::ControlValves(update))
    }

    /// Open or close one valve
    pub fn control_single_valve(&mut self, valve: u8, open: bool) -> Result<(), ClientError<E>> {
        let mask = ValveMask::single(valve).ok_or(CommandError::ValveOutOfRange)?;
        let update = if open {
            ValveUpdate::new(mask, ValveMask::empty())
        } else {
            ValveUpdate::new(ValveMask::empty(), mask)
        };
        self.control_valves(update)
    }

    /// Reset shift register outputs
    pub fn clear_shift_register(&mut self) -> Result<(), ClientError<E>> {
        self.send(&Command::ClearShiftRegister)
    }

    /// Reset shift register outputs and the uploaded program
    pub fn clear(&mut self) -> Result<(), ClientError<E>> {
        self.send(&Command::Clear)?;
        self.program_loaded = false;
        Ok(())
    }

    /// Write raw bytes into the board's EEPROM
    ///
    /// Takes effect on the next restart. The local settings copy is left
    /// untouched; call [`refresh_settings`](Self::refresh_settings) to
    /// re-read it.
    pub fn update_eeprom(&mut self, addr: u8, data: &[u8]) -> Result<(), ClientError<E>> {
        self.send(&Command::UpdateEeprom { addr, data })
    }

    /// Store one setting in the board's EEPROM
    ///
    /// Like [`update_eeprom`](Self::update_eeprom) the board only applies it
    /// on the next restart, so the local copy keeps the running values until
    /// [`restart`](Self::restart) and [`refresh_settings`](Self::refresh_settings).
    pub fn update_setting(&mut self, field: SettingField, value: u8) -> Result<(), ClientError<E>> {
        let mut pending = self.settings;
        pending.set(field, value);
        pending.validate()?;

        self.update_eeprom(field.addr(), &[value])
    }

    /// Restart the board's microcontroller
    pub fn restart(&mut self) -> Result<(), ClientError<E>> {
        self.send(&Command::Restart)?;
        self.program_loaded = false;
        Ok(())
    }

    fn send(&mut self, command: &Command<'_>) -> Result<(), ClientError<E>> {
        let packet = command.encode(self.settings.reg_num)?;
        self.uart
            .write_blocking(&packet)
            .map_err(ClientError::Uart)?;
        self.uart.flush().map_err(ClientError::Uart)
    }

    fn read_reply(&mut self, out: &mut [u8]) -> Result<(), ClientError<E>> {
        let mut reader = ReplyReader::new(out.len())?;
        loop {
            let byte = self.uart.read_byte().map_err(ClientError::Uart)?;
            if let Some(payload) = reader.feed(byte)? {
                out.copy_from_slice(payload);
                return Ok(());
            }
        }
    }
}
