//! EEPROM storage abstractions
//!
//! Byte-addressed non-volatile storage, as found on AVR parts. Unlike a
//! key-value flash store there is no wear leveling: callers own the layout
//! and should prefer [`Eeprom::update`] to avoid rewriting unchanged cells.

/// Errors from EEPROM operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EepromError {
    /// Access touches bytes beyond the device capacity
    OutOfRange,
    /// The device reported a read or write failure
    Device,
}

/// Byte-addressed EEPROM
pub trait Eeprom {
    /// Total number of addressable bytes
    fn capacity(&self) -> usize;

    /// Read `buffer.len()` bytes starting at `addr`
    fn read(&mut self, addr: usize, buffer: &mut [u8]) -> Result<(), EepromError>;

    /// Write `data` starting at `addr`
    fn write(&mut self, addr: usize, data: &[u8]) -> Result<(), EepromError>;

    /// Write only the bytes that differ from what is stored
    ///
    /// Returns the number of bytes that were physically written.
    fn update(&mut self, addr: usize, data: &[u8]) -> Result<usize, EepromError> {
        check_range(self.capacity(), addr, data.len())?;

        let mut written = 0;
        for (i, &byte) in data.iter().enumerate() {
            if self.read_byte(addr + i)? != byte {
                self.write_byte(addr + i, byte)?;
                written += 1;
            }
        }
        Ok(written)
    }

    /// Read a single byte
    fn read_byte(&mut self, addr: usize) -> Result<u8, EepromError> {
        let mut buf = [0u8; 1];
        self.read(addr, &mut buf)?;
        Ok(buf[0])
    }

    /// Write a single byte
    fn write_byte(&mut self, addr: usize, value: u8) -> Result<(), EepromError> {
        self.write(addr, &[value])
    }
}

/// Validate that `len` bytes at `addr` fit into `capacity`
pub fn check_range(capacity: usize, addr: usize, len: usize) -> Result<(), EepromError> {
    match addr.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(EepromError::OutOfRange),
    }
}

/// Value of an erased EEPROM cell
pub const ERASED: u8 = 0xFF;

/// In-memory EEPROM
///
/// Starts fully erased. Counts physical byte writes so callers can check
/// that unchanged cells are left alone.
#[derive(Debug, Clone)]
pub struct RamEeprom<const N: usize> {
    cells: [u8; N],
    writes: usize,
}

impl<const N: usize> Default for RamEeprom<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RamEeprom<N> {
    /// Create an erased EEPROM
    pub const fn new() -> Self {
        Self {
            cells: [ERASED; N],
            writes: 0,
        }
    }

    /// Create an EEPROM preloaded with `contents` at address 0
    ///
    /// Bytes beyond `contents` stay erased; extra input is ignored.
    pub fn with_contents(contents: &[u8]) -> Self {
        let mut eeprom = Self::new();
        let len = contents.len().min(N);
        eeprom.cells[..len].copy_from_slice(&contents[..len]);
        eeprom
    }

    /// Raw view of all cells
    pub fn cells(&self) -> &[u8; N] {
        &self.cells
    }

    /// Number of bytes physically written since creation
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl<const N: usize> Eeprom for RamEeprom<N> {
    fn capacity(&self) -> usize {
        N
    }

    fn read(&mut self, addr: usize, buffer: &mut [u8]) -> Result<(), EepromError> {
        check_range(N, addr, buffer.len())?;
        buffer.copy_from_slice(&self.cells[addr..addr + buffer.len()]);
        Ok(())
    }

    fn write(&mut self, addr: usize, data: &[u8]) -> Result<(), EepromError> {
        check_range(N, addr, data.len())?;
        self.cells[addr..addr + data.len()].copy_from_slice(data);
        self.writes += data.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_erased() {
        let mut eeprom = RamEeprom::<16>::new();
        assert_eq!(eeprom.read_byte(0).unwrap(), ERASED);
        assert_eq!(eeprom.read_byte(15).unwrap(), ERASED);
        assert_eq!(eeprom.write_count(), 0);
    }

    #[test]
    fn test_read_write() {
        let mut eeprom = RamEeprom::<16>::new();
        eeprom.write(2, &[1, 2, 3]).unwrap();

        let mut buf = [0u8; 3];
        eeprom.read(2, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(eeprom.write_count(), 3);
    }

    #[test]
    fn test_out_of_range() {
        let mut eeprom = RamEeprom::<4>::new();
        assert_eq!(eeprom.write(3, &[0, 0]), Err(EepromError::OutOfRange));
        assert_eq!(eeprom.read_byte(4), Err(EepromError::OutOfRange));
        assert_eq!(
            eeprom.update(usize::MAX, &[0]),
            Err(EepromError::OutOfRange)
        );
    }

    #[test]
    fn test_update_skips_unchanged_cells() {
        let mut eeprom = RamEeprom::<8>::with_contents(&[0, 4, 100]);
        let written = eeprom.update(0, &[0, 5, 100]).unwrap();

        assert_eq!(written, 1);
        assert_eq!(eeprom.write_count(), 1);
        assert_eq!(&eeprom.cells()[..3], &[0, 5, 100]);
    }

    #[test]
    fn test_with_contents_truncates() {
        let eeprom = RamEeprom::<2>::with_contents(&[1, 2, 3]);
        assert_eq!(eeprom.cells(), &[1, 2]);
    }
}
