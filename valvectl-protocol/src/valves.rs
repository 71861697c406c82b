//! Valve bitmasks and their shift-register wire encoding
//!
//! Valves are numbered from 1. Valve `n` maps to bit `n - 1`, and the mask
//! is sent as `reg_num` bytes, most significant register first, so valve 1
//! is the lowest bit of the last byte on the wire.

/// Valves driven by one 8-bit shift register
pub const VALVES_PER_REGISTER: u8 = 8;

/// Maximum number of daisy-chained shift registers
pub const MAX_REGISTERS: u8 = 6;

/// Highest addressable valve number
pub const MAX_VALVES: u8 = MAX_REGISTERS * VALVES_PER_REGISTER;

/// Set of valves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ValveMask(u64);

impl ValveMask {
    /// The empty set
    pub const fn empty() -> Self {
        Self(0)
    }

    /// A set holding one valve, or None if the number is out of range
    pub const fn single(valve: u8) -> Option<Self> {
        if valve == 0 || valve > MAX_VALVES {
            return None;
        }
        Some(Self(1 << (valve - 1)))
    }

    /// Build a set from valve numbers, failing on the first invalid one
    pub fn from_valves(valves: &[u8]) -> Option<Self> {
        let mut mask = Self::empty();
        for &valve in valves {
            mask = mask.with(valve)?;
        }
        Some(mask)
    }

    /// Raw bit representation
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Add a valve, or None if the number is out of range
    pub const fn with(self, valve: u8) -> Option<Self> {
        match Self::single(valve) {
            Some(v) => Some(Self(self.0 | v.0)),
            None => None,
        }
    }

    /// Check whether a valve is in the set
    pub const fn contains(self, valve: u8) -> bool {
        match Self::single(valve) {
            Some(v) => self.0 & v.0 != 0,
            None => false,
        }
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Highest valve number in the set (0 when empty)
    pub const fn highest(self) -> u8 {
        (64 - self.0.leading_zeros()) as u8
    }

    /// Iterate valve numbers in ascending order
    pub fn iter(self) -> impl Iterator<Item = u8> {
        (1..=MAX_VALVES).filter(move |&v| self.contains(v))
    }

    /// Check that every valve fits into `reg_num` registers
    pub const fn fits(self, reg_num: u8) -> bool {
        self.highest() as u16 <= reg_num as u16 * VALVES_PER_REGISTER as u16
    }

    /// Write the `reg_num`-byte big-endian form into `out`
    ///
    /// Returns the number of bytes written, or None when `out` is too short,
    /// `reg_num` exceeds [`MAX_REGISTERS`] or the set has valves beyond it.
    pub fn encode(self, reg_num: u8, out: &mut [u8]) -> Option<usize> {
        let len = reg_num as usize;
        if reg_num > MAX_REGISTERS || out.len() < len || !self.fits(reg_num) {
            return None;
        }
        let bytes = self.0.to_be_bytes();
        out[..len].copy_from_slice(&bytes[bytes.len() - len..]);
        Some(len)
    }

    /// Read a big-endian mask of `bytes.len()` registers
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > MAX_REGISTERS as usize {
            return None;
        }
        let bits = bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
        Some(Self(bits))
    }
}

/// A data/mask pair telling the board which outputs to change
///
/// Bits set in `mask` are driven to the matching bit of `data`; other
/// outputs keep their state. A valve listed as both on and off ends up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ValveUpdate {
    /// Valves to open
    pub on: ValveMask,
    /// Valves to close
    pub off: ValveMask,
}

impl ValveUpdate {
    pub const fn new(on: ValveMask, off: ValveMask) -> Self {
        Self { on, off }
    }

    /// Output levels for the masked bits
    pub const fn data(&self) -> ValveMask {
        self.on
    }

    /// Outputs affected by this update
    pub const fn mask(&self) -> ValveMask {
        self.on.union(self.off)
    }

    /// Rebuild an update from its wire data/mask pair
    pub const fn from_data_mask(data: ValveMask, mask: ValveMask) -> Self {
        Self {
            on: ValveMask(data.0 & mask.0),
            off: ValveMask(!data.0 & mask.0),
        }
    }

    /// Apply to an output state
    pub const fn apply(&self, state: ValveMask) -> ValveMask {
        let mask = self.mask().0;
        ValveMask((state.0 & !mask) | (self.data().0 & mask))
    }
}
