//! Board → host replies
//!
//! Only two commands produce a reply, each a fixed number of payload bytes
//! followed by `\r\n`:
//! - Stop: cycles completed, u32 little-endian
//! - GetSettings: the settings bytes, one per EEPROM address

use heapless::Vec;

/// Reply line terminator
pub const TERMINATOR: [u8; 2] = *b"\r\n";

/// Payload length of a Stop reply
pub const STOP_REPLY_LEN: usize = 4;

/// Payload length of a GetSettings reply
pub const SETTINGS_REPLY_LEN: usize = 6;

/// Longest reply payload
pub const MAX_REPLY_LEN: usize = SETTINGS_REPLY_LEN;

/// Errors from reply parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReplyError {
    /// Payload not followed by `\r\n`
    InvalidTerminator,
    /// Requested payload length is above [`MAX_REPLY_LEN`]
    TooLong,
    /// Byte fed after the reply was complete
    Overrun,
}

/// Byte-fed reader for one fixed-length reply
#[derive(Debug, Clone)]
pub struct ReplyReader {
    state: ReadState,
    expected_len: usize,
    payload: Vec<u8, MAX_REPLY_LEN>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    /// Collecting payload bytes
    Payload,
    /// Waiting for `\r`
    WaitingForCr,
    /// Waiting for `\n`
    WaitingForLf,
    /// Terminator read
    Done,
}

impl ReplyReader {
    /// Create a reader for a payload of `expected_len` bytes
    pub fn new(expected_len: usize) -> Result<Self, ReplyError> {
        if expected_len > MAX_REPLY_LEN {
            return Err(ReplyError::TooLong);
        }
        let state = if expected_len == 0 {
            ReadState::WaitingForCr
        } else {
            ReadState::Payload
        };
        Ok(Self {
            state,
            expected_len,
            payload: Vec::new(),
        })
    }

    /// Number of bytes still needed to complete the reply
    pub fn remaining(&self) -> usize {
        match self.state {
            ReadState::Payload => self.expected_len - self.payload.len() + TERMINATOR.len(),
            ReadState::WaitingForCr => 2,
            ReadState::WaitingForLf => 1,
            ReadState::Done => 0,
        }
    }

    /// Feed one byte
    ///
    /// Returns `Ok(Some(payload))` once the terminator has been read and
    /// `Ok(None)` while more bytes are needed. Any byte after that is an
    /// [`ReplyError::Overrun`].
    pub fn feed(&mut self, byte: u8) -> Result<Option<&[u8]>, ReplyError> {
        match self.state {
            ReadState::Payload => {
                // Capacity is checked in new()
                let _ = self.payload.push(byte);
                if self.payload.len() == self.expected_len {
                    self.state = ReadState::WaitingForCr;
                }
                Ok(None)
            }
            ReadState::WaitingForCr => {
                if byte != TERMINATOR[0] {
                    return Err(ReplyError::InvalidTerminator);
                }
                self.state = ReadState::WaitingForLf;
                Ok(None)
            }
            ReadState::WaitingForLf => {
                if byte != TERMINATOR[1] {
                    return Err(ReplyError::InvalidTerminator);
                }
                self.state = ReadState::Done;
                Ok(Some(self.payload.as_slice()))
            }
            ReadState::Done => Err(ReplyError::Overrun),
        }
    }

    /// Feed bytes until the reply completes
    ///
    /// Bytes after the terminator are not consumed.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Result<Option<&[u8]>, ReplyError> {
        let mut done = false;
        for &byte in bytes {
            if self.feed(byte)?.is_some() {
                done = true;
                break;
            }
        }
        Ok(if done { Some(self.payload.as_slice()) } else { None })
    }
}

/// Reply to Stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StopReply {
    /// Cycles fully run before the stop
    pub cycles_completed: u32,
}

impl StopReply {
    pub fn from_payload(payload: &[u8; STOP_REPLY_LEN]) -> Self {
        Self {
            cycles_completed: u32::from_le_bytes(*payload),
        }
    }

    /// Wire form including terminator
    pub fn to_bytes(&self) -> [u8; STOP_REPLY_LEN + 2] {
        let mut out = [0u8; STOP_REPLY_LEN + 2];
        out[..STOP_REPLY_LEN].copy_from_slice(&self.cycles_completed.to_le_bytes());
        out[STOP_REPLY_LEN..].copy_from_slice(&TERMINATOR);
        out
    }
}

/// Reply to GetSettings: byte `i` is the EEPROM cell at address `i`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SettingsReply {
    pub bytes: [u8; SETTINGS_REPLY_LEN],
}

impl SettingsReply {
    pub fn from_payload(payload: &[u8; SETTINGS_REPLY_LEN]) -> Self {
        Self { bytes: *payload }
    }

    /// Wire form including terminator
    pub fn to_bytes(&self) -> [u8; SETTINGS_REPLY_LEN + 2] {
        let mut out = [0u8; SETTINGS_REPLY_LEN + 2];
        out[..SETTINGS_REPLY_LEN].copy_from_slice(&self.bytes);
        out[SETTINGS_REPLY_LEN..].copy_from_slice(&TERMINATOR);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_settings_reply() {
        let mut reader = ReplyReader::new(SETTINGS_REPLY_LEN).unwrap();
        let payload = reader
            .feed_bytes(b"\x00\x04\x64\xC8\x0A\x0A\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(payload, &[0x00, 0x04, 0x64, 0xC8, 0x0A, 0x0A]);
    }

    #[test]
    fn test_payload_may_contain_terminator_bytes() {
        // 0x0A0D = 2573 cycles
        let mut reader = ReplyReader::new(STOP_REPLY_LEN).unwrap();
        let payload = reader.feed_bytes(b"\r\n\x00\x00\r\n").unwrap().unwrap();

        let mut raw = [0u8; STOP_REPLY_LEN];
        raw.copy_from_slice(payload);
        assert_eq!(StopReply::from_payload(&raw).cycles_completed, 2573);
    }

    #[test]
    fn test_incomplete_reply() {
        let mut reader = ReplyReader::new(STOP_REPLY_LEN).unwrap();
        assert_eq!(reader.feed_bytes(&[1, 0, 0]).unwrap(), None);
        assert_eq!(reader.remaining(), 3);
    }

    #[test]
    fn test_invalid_terminator() {
        let mut reader = ReplyReader::new(STOP_REPLY_LEN).unwrap();
        assert_eq!(
            reader.feed_bytes(b"\x01\x00\x00\x00\r\x08"),
            Err(ReplyError::InvalidTerminator)
        );
    }

    #[test]
    fn test_too_long() {
        assert!(matches!(
            ReplyReader::new(MAX_REPLY_LEN + 1),
            Err(ReplyError::TooLong)
        ));
    }

    #[test]
    fn test_stop_reply_wire_form() {
        let reply = StopReply {
            cycles_completed: 1,
        };
        assert_eq!(reply.to_bytes(), *b"\x01\x00\x00\x00\r\n");
    }

    #[test]
    fn test_no_bytes_after_completion() {
        let mut reader = ReplyReader::new(STOP_REPLY_LEN).unwrap();
        assert!(reader.feed_bytes(b"\x01\x00\x00\x00\r\n").unwrap().is_some());
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.feed(b'\n'), Err(ReplyError::Overrun));
    }
}
