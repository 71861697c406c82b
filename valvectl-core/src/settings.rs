//! Persisted board settings
//!
//! The settings block is [`LAYOUT_LEN`] bytes at the start of EEPROM, one
//! byte per [`SettingField`]. On first boot the version marker reads as
//! erased (0xFF), which does not match [`VERSION`], so the defaults are
//! written.

use valvectl_hal::eeprom::{Eeprom, EepromError};
use valvectl_protocol::valves::{MAX_REGISTERS, VALVES_PER_REGISTER};

use crate::defaults::{
    SettingField, DEFAULT_LAYOUT, LAYOUT_LEN, REG_NUM_ADDR, VERSION, VERSION_ADDR,
};

/// Errors from settings handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettingsError {
    /// EEPROM access failed
    Eeprom(EepromError),
    /// Register count is zero or above the supported maximum
    InvalidRegisterCount(u8),
}

impl From<EepromError> for SettingsError {
    fn from(e: EepromError) -> Self {
        SettingsError::Eeprom(e)
    }
}

/// Board settings as stored in EEPROM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    /// Layout version marker
    pub version: u8,
    /// Number of 8-bit shift registers
    pub reg_num: u8,
    /// Capacity of the operation table
    pub operation_num: u8,
    /// Capacity of the cycle phase table
    pub phase_num: u8,
    /// Capacity of the before-cycles phase table
    pub before_phase_num: u8,
    /// Capacity of the after-cycles phase table
    pub after_phase_num: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_bytes(&DEFAULT_LAYOUT)
    }
}

impl Settings {
    /// Decode a settings block; byte `i` is the cell at address `i`
    pub const fn from_bytes(bytes: &[u8; LAYOUT_LEN]) -> Self {
        Self {
            version: bytes[SettingField::Version.addr() as usize],
            reg_num: bytes[SettingField::RegNum.addr() as usize],
            operation_num: bytes[SettingField::OperationNum.addr() as usize],
            phase_num: bytes[SettingField::PhaseNum.addr() as usize],
            before_phase_num: bytes[SettingField::BeforePhaseNum.addr() as usize],
            after_phase_num: bytes[SettingField::AfterPhaseNum.addr() as usize],
        }
    }

    /// Encode into a settings block
    pub fn to_bytes(&self) -> [u8; LAYOUT_LEN] {
        let mut bytes = [0u8; LAYOUT_LEN];
        for field in SettingField::ALL {
            bytes[field.addr() as usize] = self.get(field);
        }
        bytes
    }

    pub const fn get(&self, field: SettingField) -> u8 {
        match field {
            SettingField::Version => self.version,
            SettingField::RegNum => self.reg_num,
            SettingField::OperationNum => self.operation_num,
            SettingField::PhaseNum => self.phase_num,
            SettingField::BeforePhaseNum => self.before_phase_num,
            SettingField::AfterPhaseNum => self.after_phase_num,
        }
    }

    pub fn set(&mut self, field: SettingField, value: u8) {
        match field {
            SettingField::Version => self.version = value,
            SettingField::RegNum => self.reg_num = value,
            SettingField::OperationNum => self.operation_num = value,
            SettingField::PhaseNum => self.phase_num = value,
            SettingField::BeforePhaseNum => self.before_phase_num = value,
            SettingField::AfterPhaseNum => self.after_phase_num = value,
        }
    }

    /// Number of addressable valves
    pub const fn valve_count(&self) -> u16 {
        self.reg_num as u16 * VALVES_PER_REGISTER as u16
    }

    /// Check values the board cannot run with
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_reg_num(self.reg_num)
    }
}

fn check_reg_num(reg_num: u8) -> Result<(), SettingsError> {
    if reg_num == 0 || reg_num > MAX_REGISTERS {
        return Err(SettingsError::InvalidRegisterCount(reg_num));
    }
    Ok(())
}

/// Outcome of [`SettingsStore::load_or_init`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LayoutStatus {
    /// Stored layout matches this firmware version
    Current,
    /// Version marker did not match; defaults were written
    Initialized {
        /// Marker found before initialisation
        found: u8,
    },
}

/// Settings persistence on top of an EEPROM
pub struct SettingsStore<E: Eeprom> {
    eeprom: E,
}

impl<E: Eeprom> SettingsStore<E> {
    pub fn new(eeprom: E) -> Self {
        Self { eeprom }
    }

    /// Consume the store and return the underlying EEPROM
    pub fn into_inner(self) -> E {
        self.eeprom
    }

    /// Load settings, writing defaults if the layout version does not match
    pub fn load_or_init(&mut self) -> Result<(Settings, LayoutStatus), SettingsError> {
        let found = self.eeprom.read_byte(VERSION_ADDR as usize)?;

        if found != VERSION {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "Settings version {} != {}, writing defaults",
                found,
                VERSION
            );
            let settings = self.factory_reset()?;
            return Ok((settings, LayoutStatus::Initialized { found }));
        }

        let settings = self.load()?;
        settings.validate()?;

        #[cfg(feature = "defmt")]
        defmt::info!("Settings loaded: {}", settings);

        Ok((settings, LayoutStatus::Current))
    }

    /// Read the settings block as stored
    pub fn load(&mut self) -> Result<Settings, SettingsError> {
        let mut bytes = [0u8; LAYOUT_LEN];
        self.eeprom.read(0, &mut bytes)?;
        Ok(Settings::from_bytes(&bytes))
    }

    /// Overwrite the settings block with defaults
    pub fn factory_reset(&mut self) -> Result<Settings, SettingsError> {
        let _written = self.eeprom.update(0, &DEFAULT_LAYOUT)?;

        #[cfg(feature = "defmt")]
        defmt::debug!("Factory reset wrote {} bytes", _written);

        Ok(Settings::default())
    }

    /// Store one field, returning the settings as now stored
    pub fn write_field(&mut self, field: SettingField, value: u8) -> Result<Settings, SettingsError> {
        if field == SettingField::RegNum {
            check_reg_num(value)?;
        }
        self.eeprom.update(field.addr() as usize, &[value])?;
        self.load()
    }

    /// Store raw bytes at `addr`
    ///
    /// Used for EEPROM writes requested over the serial link. A register
    /// count inside the range is validated first. Returns the number of
    /// bytes that changed.
    pub fn update_raw(&mut self, addr: u8, data: &[u8]) -> Result<usize, SettingsError> {
        if let Some(offset) = (REG_NUM_ADDR as usize).checked_sub(addr as usize) {
            if let Some(&reg_num) = data.get(offset) {
                check_reg_num(reg_num)?;
            }
        }
        Ok(self.eeprom.update(addr as usize, data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use valvectl_hal::eeprom::{RamEeprom, ERASED};

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 0);
        assert_eq!(settings.reg_num, 4);
        assert_eq!(settings.operation_num, 100);
        assert_eq!(settings.phase_num, 200);
        assert_eq!(settings.before_phase_num, 10);
        assert_eq!(settings.after_phase_num, 10);
        assert_eq!(settings.valve_count(), 32);
    }

    #[test]
    fn test_bytes_follow_layout() {
        let settings = Settings::from_bytes(&[0, 2, 50, 120, 5, 3]);
        assert_eq!(settings.get(SettingField::RegNum), 2);
        assert_eq!(settings.get(SettingField::AfterPhaseNum), 3);
        assert_eq!(settings.to_bytes(), [0, 2, 50, 120, 5, 3]);
    }

    #[test]
    fn test_set_field() {
        let mut settings = Settings::default();
        settings.set(SettingField::PhaseNum, 42);
        assert_eq!(settings.phase_num, 42);
        assert_eq!(settings.to_bytes()[3], 42);
    }

    #[test]
    fn test_validate_reg_num() {
        let mut settings = Settings::default();
        assert!(settings.validate().is_ok());
        settings.reg_num = 0;
        assert_eq!(
            settings.validate(),
            Err(SettingsError::InvalidRegisterCount(0))
        );
        settings.reg_num = MAX_REGISTERS + 1;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_first_boot_writes_defaults() {
        let mut store = SettingsStore::new(RamEeprom::<64>::new());
        let (settings, status) = store.load_or_init().unwrap();

        assert_eq!(status, LayoutStatus::Initialized { found: ERASED });
        assert_eq!(settings, Settings::default());

        let eeprom = store.into_inner();
        assert_eq!(&eeprom.cells()[..LAYOUT_LEN], &DEFAULT_LAYOUT);
        assert_eq!(eeprom.cells()[LAYOUT_LEN], ERASED);
    }

    #[test]
    fn test_second_boot_keeps_stored_values() {
        let eeprom = RamEeprom::<64>::with_contents(&[0, 2, 50, 120, 5, 3]);
        let mut store = SettingsStore::new(eeprom);
        let (settings, status) = store.load_or_init().unwrap();

        assert_eq!(status, LayoutStatus::Current);
        assert_eq!(settings.reg_num, 2);
        assert_eq!(store.into_inner().write_count(), 0);
    }

    #[test]
    fn test_version_skew_resets() {
        let eeprom = RamEeprom::<64>::with_contents(&[7, 2, 50, 120, 5, 3]);
        let mut store = SettingsStore::new(eeprom);
        let (settings, status) = store.load_or_init().unwrap();

        assert_eq!(status, LayoutStatus::Initialized { found: 7 });
        assert_eq!(settings.reg_num, 4);
    }

    #[test]
    fn test_corrupt_reg_num_is_reported() {
        let eeprom = RamEeprom::<64>::with_contents(&[0, 0, 100, 200, 10, 10]);
        let mut store = SettingsStore::new(eeprom);
        assert_eq!(
            store.load_or_init(),
            Err(SettingsError::InvalidRegisterCount(0))
        );
    }

    #[test]
    fn test_write_field() {
        let mut store = SettingsStore::new(RamEeprom::<64>::new());
        store.load_or_init().unwrap();

        let settings = store.write_field(SettingField::RegNum, 6).unwrap();
        assert_eq!(settings.reg_num, 6);
        assert_eq!(
            store.write_field(SettingField::RegNum, 9),
            Err(SettingsError::InvalidRegisterCount(9))
        );
    }

    #[test]
    fn test_update_raw_counts_changes() {
        let mut store = SettingsStore::new(RamEeprom::<64>::new());
        store.load_or_init().unwrap();

        assert_eq!(store.update_raw(REG_NUM_ADDR, &[4, 100]).unwrap(), 0);
        assert_eq!(store.update_raw(VERSION_ADDR, &[0, 3]).unwrap(), 1);
        assert_eq!(store.load().unwrap().reg_num, 3);
    }

    #[test]
    fn test_eeprom_too_small() {
        let mut store = SettingsStore::new(RamEeprom::<4>::new());
        assert_eq!(
            store.load_or_init(),
            Err(SettingsError::Eeprom(EepromError::OutOfRange))
        );
    }

    #[test]
    fn test_update_raw_rejects_bad_reg_num() {
        let mut store = SettingsStore::new(RamEeprom::<64>::new());
        store.load_or_init().unwrap();

        assert_eq!(
            store.update_raw(VERSION_ADDR, &[0, 0]),
            Err(SettingsError::InvalidRegisterCount(0))
        );
        assert_eq!(
            store.update_raw(REG_NUM_ADDR, &[MAX_REGISTERS + 1]),
            Err(SettingsError::InvalidRegisterCount(MAX_REGISTERS + 1))
        );
        // Ranges not covering the register count are not checked
        assert_eq!(store.update_raw(REG_NUM_ADDR + 1, &[0]).unwrap(), 1);

        let (settings, status) = store.load_or_init().unwrap();
        assert_eq!(status, LayoutStatus::Current);
        assert_eq!(settings.reg_num, 4);
    }

    #[test]
    fn test_factory_reset_rewrites_changed_cells_only() {
        let eeprom = RamEeprom::<64>::with_contents(&[0, 2, 100, 120, 10, 10]);
        let mut store = SettingsStore::new(eeprom);

        assert_eq!(store.factory_reset().unwrap(), Settings::default());
        let eeprom = store.into_inner();
        assert_eq!(eeprom.write_count(), 2);
        assert_eq!(&eeprom.cells()[..LAYOUT_LEN], &DEFAULT_LAYOUT);
    }
}
