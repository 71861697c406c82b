//! Default settings and their EEPROM layout
//!
//! Each setting lives in one EEPROM byte. `*_ADDR` is where it is stored,
//! the bare name is the value written on first boot or factory reset.
//! The addresses are a fixed contract shared with the board firmware;
//! never move them, bump [`VERSION`] and migrate instead.

/// Layout/firmware version marker
pub const VERSION_ADDR: u8 = 0x00;
pub const VERSION: u8 = 0;

/// Number of 8-bit shift registers
pub const REG_NUM_ADDR: u8 = 0x01; // the address on EEPROM
pub const REG_NUM: u8 = 4;

/// Number of operations (valve on/off sets)
pub const OPERATION_NUM_ADDR: u8 = 0x02;
pub const OPERATION_NUM: u8 = 100;

/// Number of phases per cycle
pub const PHASE_NUM_ADDR: u8 = 0x03;
pub const PHASE_NUM: u8 = 200;

/// Number of phases run before the first cycle
pub const BEFORE_PHASE_NUM_ADDR: u8 = 0x04;
pub const BEFORE_PHASE_NUM: u8 = 10;

/// Number of phases run after the last cycle
pub const AFTER_PHASE_NUM_ADDR: u8 = 0x05;
pub const AFTER_PHASE_NUM: u8 = 10;

/// Bytes occupied by the settings block
pub const LAYOUT_LEN: usize = SettingField::ALL.len();

/// A setting stored in EEPROM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SettingField {
    Version = VERSION_ADDR,
    RegNum = REG_NUM_ADDR,
    OperationNum = OPERATION_NUM_ADDR,
    PhaseNum = PHASE_NUM_ADDR,
    BeforePhaseNum = BEFORE_PHASE_NUM_ADDR,
    AfterPhaseNum = AFTER_PHASE_NUM_ADDR,
}

impl SettingField {
    /// All fields in address order
    pub const ALL: [SettingField; 6] = [
        SettingField::Version,
        SettingField::RegNum,
        SettingField::OperationNum,
        SettingField::PhaseNum,
        SettingField::BeforePhaseNum,
        SettingField::AfterPhaseNum,
    ];

    /// EEPROM address of this field
    pub const fn addr(self) -> u8 {
        self as u8
    }

    /// Value written on first boot / factory reset
    pub const fn default_value(self) -> u8 {
        match self {
            SettingField::Version => VERSION,
            SettingField::RegNum => REG_NUM,
            SettingField::OperationNum => OPERATION_NUM,
            SettingField::PhaseNum => PHASE_NUM,
            SettingField::BeforePhaseNum => BEFORE_PHASE_NUM,
            SettingField::AfterPhaseNum => AFTER_PHASE_NUM,
        }
    }

    /// Look up the field stored at `addr`
    pub const fn from_addr(addr: u8) -> Option<Self> {
        match addr {
            VERSION_ADDR => Some(SettingField::Version),
            REG_NUM_ADDR => Some(SettingField::RegNum),
            OPERATION_NUM_ADDR => Some(SettingField::OperationNum),
            PHASE_NUM_ADDR => Some(SettingField::PhaseNum),
            BEFORE_PHASE_NUM_ADDR => Some(SettingField::BeforePhaseNum),
            AFTER_PHASE_NUM_ADDR => Some(SettingField::AfterPhaseNum),
            _ => None,
        }
    }

    /// Short name, matching the constant names above
    pub const fn name(self) -> &'static str {
        match self {
            SettingField::Version => "VERSION",
            SettingField::RegNum => "REG_NUM",
            SettingField::OperationNum => "OPERATION_NUM",
            SettingField::PhaseNum => "PHASE_NUM",
            SettingField::BeforePhaseNum => "BEFORE_PHASE_NUM",
            SettingField::AfterPhaseNum => "AFTER_PHASE_NUM",
        }
    }
}

/// Default value of every field, indexed by address
pub const DEFAULT_LAYOUT: [u8; LAYOUT_LEN] = {
    let mut bytes = [0u8; LAYOUT_LEN];
    let mut i = 0;
    while i < LAYOUT_LEN {
        let field = SettingField::ALL[i];
        bytes[field.addr() as usize] = field.default_value();
        i += 1;
    }
    bytes
};

// Addresses must be distinct and pack into 0..LAYOUT_LEN
const _: () = {
    let mut seen = [false; LAYOUT_LEN];
    let mut i = 0;
    while i < LAYOUT_LEN {
        let addr = SettingField::ALL[i].addr() as usize;
        assert!(addr < LAYOUT_LEN);
        assert!(!seen[addr]);
        seen[addr] = true;
        i += 1;
    }
};
