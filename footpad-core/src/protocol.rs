//! Serial protocol between the foot-pad and the host.
//!
//! A connection starts with both sides sending [`MAGIC_NUMBER`]. The host then
//! configures the device with setup frames:
//!
//! ```text
//! [code, len_hi, len_lo, payload[len]...]
//! ```
//!
//! and finishes with [`SetupCommand::Finish`]. From then on the device sends
//! one byte per debounced key change, see [`RemoteEvent`].

use heapless::Vec;

use crate::error::Error;

/// Identifies a foot-pad connection in both directions.
pub const MAGIC_NUMBER: [u8; 8] = *b"SerKey01";

/// Bytes in a frame header: command code plus big-endian payload length.
pub const HEADER_LEN: usize = 3;
/// Largest payload any command takes.
pub const MAX_PAYLOAD: usize = 4;
/// Largest encoded frame.
pub const MAX_FRAME: usize = HEADER_LEN + MAX_PAYLOAD;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SetupCommand {
    Finish = 0x0F,
    AddKey = 0xAD,
    SetDebounce = 0xDB,
    AwaitSmoothness = 0xAE,
    Reset = 0xEE,
    EnableInterrupts = 0xEA,
}

impl SetupCommand {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        use SetupCommand::*;
        match code {
            0x0F => Some(Finish),
            0xAD => Some(AddKey),
            0xDB => Some(SetDebounce),
            0xAE => Some(AwaitSmoothness),
            0xEE => Some(Reset),
            0xEA => Some(EnableInterrupts),
            _ => None,
        }
    }

    /// Payload length this command requires.
    pub fn payload_len(self) -> usize {
        use SetupCommand::*;
        match self {
            Finish | Reset => 0,
            AddKey | AwaitSmoothness | EnableInterrupts => 1,
            SetDebounce => 4,
        }
    }
}

/// A decoded setup frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Setup {
    /// End of configuration, the device starts reporting events.
    Finish,
    /// Track the given pin as the next key.
    AddKey(u8),
    /// Debounce interval in microseconds.
    SetDebounce(u32),
    /// Require the reading to hold for the whole interval.
    AwaitSmoothness(bool),
    /// Forget all configuration and wait for a new connection.
    Reset,
    /// Sample pins on pin-change interrupts instead of continuously.
    EnableInterrupts(bool),
}

impl Setup {
    pub fn command(&self) -> SetupCommand {
        match self {
            Setup::Finish => SetupCommand::Finish,
            Setup::AddKey(_) => SetupCommand::AddKey,
            Setup::SetDebounce(_) => SetupCommand::SetDebounce,
            Setup::AwaitSmoothness(_) => SetupCommand::AwaitSmoothness,
            Setup::Reset => SetupCommand::Reset,
            Setup::EnableInterrupts(_) => SetupCommand::EnableInterrupts,
        }
    }

    /// Encode as a complete frame.
    pub fn encode(&self) -> Vec<u8, MAX_FRAME> {
        let micros;
        let flag;
        let payload: &[u8] = match *self {
            Setup::Finish | Setup::Reset => &[],
            Setup::AddKey(ref pin) => core::slice::from_ref(pin),
            Setup::SetDebounce(us) => {
                micros = us.to_be_bytes();
                &micros
            }
            Setup::AwaitSmoothness(on) | Setup::EnableInterrupts(on) => {
                flag = [on as u8];
                &flag
            }
        };

        let len = (payload.len() as u16).to_be_bytes();
        let mut frame = Vec::new();
        // Payloads never exceed MAX_PAYLOAD, so the frame always fits.
        let _ = frame.extend_from_slice(&[self.command().code(), len[0], len[1]]);
        let _ = frame.extend_from_slice(payload);
        frame
    }

    fn decode(command: SetupCommand, payload: &[u8]) -> Self {
        match command {
            SetupCommand::Finish => Setup::Finish,
            SetupCommand::Reset => Setup::Reset,
            SetupCommand::AddKey => Setup::AddKey(payload[0]),
            SetupCommand::SetDebounce => Setup::SetDebounce(u32::from_be_bytes([
                payload[0], payload[1], payload[2], payload[3],
            ])),
            SetupCommand::AwaitSmoothness => Setup::AwaitSmoothness(payload[0] != 0),
            SetupCommand::EnableInterrupts => Setup::EnableInterrupts(payload[0] != 0),
        }
    }
}

/// Byte-at-a-time decoder for setup frames.
///
/// After an error the parser starts over with the next byte as a new frame
/// header.
#[derive(Debug, Default)]
pub struct SetupParser {
    header: Vec<u8, HEADER_LEN>,
    command: Option<SetupCommand>,
    payload: Vec<u8, MAX_PAYLOAD>,
}

impl SetupParser {
    pub const fn new() -> Self {
        Self {
            header: Vec::new(),
            command: None,
            payload: Vec::new(),
        }
    }

    /// Drop any partially received frame.
    pub fn clear(&mut self) {
        self.header.clear();
        self.command = None;
        self.payload.clear();
    }

    /// Feed one received byte. Returns a command once its frame is complete.
    pub fn push(&mut self, byte: u8) -> Result<Option<Setup>, Error> {
        if let Some(command) = self.command {
            let _ = self.payload.push(byte);
            if self.payload.len() == command.payload_len() {
                let setup = Setup::decode(command, &self.payload);
                self.clear();
                return Ok(Some(setup));
            }
            return Ok(None);
        }

        let _ = self.header.push(byte);
        if self.header.len() < HEADER_LEN {
            return Ok(None);
        }

        let code = self.header[0];
        let len = u16::from_be_bytes([self.header[1], self.header[2]]);
        self.clear();

        let command = SetupCommand::from_code(code).ok_or(Error::UnknownCommand(code))?;
        if len as usize != command.payload_len() {
            return Err(Error::BadLength { command: code, len });
        }
        if len == 0 {
            return Ok(Some(Setup::decode(command, &[])));
        }
        self.command = Some(command);
        Ok(None)
    }
}

/// Finds [`MAGIC_NUMBER`] in a byte stream.
#[derive(Debug, Default)]
pub struct MagicMatcher {
    matched: usize,
    garbage: usize,
}

impl MagicMatcher {
    pub const fn new() -> Self {
        Self {
            matched: 0,
            garbage: 0,
        }
    }

    /// Feed one byte. Returns true once the whole marker has been seen.
    pub fn push(&mut self, byte: u8) -> bool {
        if byte == MAGIC_NUMBER[self.matched] {
            self.matched += 1;
        } else {
            self.garbage += self.matched;
            // The mismatching byte may itself start a new marker.
            if byte == MAGIC_NUMBER[0] {
                self.matched = 1;
            } else {
                self.garbage += 1;
                self.matched = 0;
            }
        }

        if self.matched == MAGIC_NUMBER.len() {
            self.matched = 0;
            return true;
        }
        false
    }

    /// Number of bytes skipped before the marker.
    pub fn garbage(&self) -> usize {
        self.garbage
    }
}

/// A key change as sent over the wire: bit 7 is the state, bits 0..7 the key
/// index.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RemoteEvent {
    pub index: u8,
    pub down: bool,
}

impl RemoteEvent {
    pub fn from_byte(byte: u8) -> Self {
        Self {
            index: byte & 0x7F,
            down: byte & 0x80 != 0,
        }
    }

    pub fn to_byte(self) -> u8 {
        (self.index & 0x7F) | ((self.down as u8) << 7)
    }
}

impl From<crate::key::KeyEvent> for RemoteEvent {
    fn from(event: crate::key::KeyEvent) -> Self {
        Self {
            index: event.index,
            down: event.down,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyEvent;

    fn feed(parser: &mut SetupParser, bytes: &[u8]) -> Option<Setup> {
        let mut out = None;
        for &b in bytes {
            if let Some(setup) = parser.push(b).unwrap() {
                assert!(out.is_none(), "more than one command decoded");
                out = Some(setup);
            }
        }
        out
    }

    #[test]
    fn command_codes_are_stable() {
        assert_eq!(SetupCommand::Finish.code(), 0x0F);
        assert_eq!(SetupCommand::AddKey.code(), 0xAD);
        assert_eq!(SetupCommand::SetDebounce.code(), 0xDB);
        assert_eq!(SetupCommand::AwaitSmoothness.code(), 0xAE);
        assert_eq!(SetupCommand::Reset.code(), 0xEE);
        assert_eq!(SetupCommand::EnableInterrupts.code(), 0xEA);
        assert_eq!(SetupCommand::from_code(0xAD), Some(SetupCommand::AddKey));
        assert_eq!(SetupCommand::from_code(0x00), None);
    }

    #[test]
    fn encode_matches_host_frames() {
        assert_eq!(&Setup::Reset.encode()[..], &[0xEE, 0, 0]);
        assert_eq!(&Setup::Finish.encode()[..], &[0x0F, 0, 0]);
        assert_eq!(&Setup::AddKey(2).encode()[..], &[0xAD, 0, 1, 2]);
        assert_eq!(&Setup::AwaitSmoothness(true).encode()[..], &[0xAE, 0, 1, 1]);
        assert_eq!(&Setup::EnableInterrupts(false).encode()[..], &[0xEA, 0, 1, 0]);
        assert_eq!(
            &Setup::SetDebounce(0x0102_0304).encode()[..],
            &[0xDB, 0, 4, 1, 2, 3, 4]
        );
    }

    #[test]
    fn parses_debounce_frame() {
        let mut parser = SetupParser::new();
        let setup = feed(&mut parser, &[0xDB, 0, 4, 0, 0, 0x03, 0xE8]);
        assert_eq!(setup, Some(Setup::SetDebounce(1000)));
    }

    #[test]
    fn parses_sequence_of_frames() {
        let mut parser = SetupParser::new();
        let stream = [0xAD, 0, 1, 3, 0xAE, 0, 1, 0, 0x0F, 0, 0];
        let mut decoded = [None; 3];
        let mut n = 0;
        for b in stream {
            if let Some(setup) = parser.push(b).unwrap() {
                decoded[n] = Some(setup);
                n += 1;
            }
        }
        assert_eq!(
            decoded,
            [
                Some(Setup::AddKey(3)),
                Some(Setup::AwaitSmoothness(false)),
                Some(Setup::Finish)
            ]
        );
    }

    #[test]
    fn nonzero_flag_byte_is_true() {
        let mut parser = SetupParser::new();
        let setup = feed(&mut parser, &[0xEA, 0, 1, 0x7F]);
        assert_eq!(setup, Some(Setup::EnableInterrupts(true)));
    }

    #[test]
    fn unknown_command_is_rejected_and_parser_recovers() {
        let mut parser = SetupParser::new();
        assert_eq!(parser.push(0x42), Ok(None));
        assert_eq!(parser.push(0), Ok(None));
        assert_eq!(parser.push(0), Err(Error::UnknownCommand(0x42)));
        assert_eq!(feed(&mut parser, &[0x0F, 0, 0]), Some(Setup::Finish));
    }

    #[test]
    fn wrong_length_is_rejected() {
        let mut parser = SetupParser::new();
        parser.push(0xAD).unwrap();
        parser.push(0).unwrap();
        assert_eq!(
            parser.push(2),
            Err(Error::BadLength {
                command: 0xAD,
                len: 2
            })
        );
        assert_eq!(feed(&mut parser, &[0xAD, 0, 1, 9]), Some(Setup::AddKey(9)));
    }

    #[test]
    fn clear_drops_partial_frame() {
        let mut parser = SetupParser::new();
        parser.push(0xDB).unwrap();
        parser.push(0).unwrap();
        parser.push(4).unwrap();
        parser.push(1).unwrap();
        parser.clear();
        assert_eq!(feed(&mut parser, &[0xEE, 0, 0]), Some(Setup::Reset));
    }

    #[test]
    fn magic_after_garbage() {
        let mut matcher = MagicMatcher::new();
        let mut found = false;
        for &b in b"xxSerSerKey01" {
            assert!(!found);
            found = matcher.push(b);
        }
        assert!(found);
        assert_eq!(matcher.garbage(), 5);
    }

    #[test]
    fn magic_without_garbage() {
        let mut matcher = MagicMatcher::new();
        let hits = MAGIC_NUMBER.iter().filter(|&&b| matcher.push(b)).count();
        assert_eq!(hits, 1);
        assert_eq!(matcher.garbage(), 0);
    }

    #[test]
    fn reset_frame_before_magic_counts_as_garbage() {
        let mut matcher = MagicMatcher::new();
        let mut stream = [0u8; 11];
        stream[..3].copy_from_slice(&Setup::Reset.encode());
        stream[3..].copy_from_slice(&MAGIC_NUMBER);
        let found = stream.iter().any(|&b| matcher.push(b));
        assert!(found);
        assert_eq!(matcher.garbage(), 3);
    }

    #[test]
    fn event_byte_layout() {
        assert_eq!(
            RemoteEvent {
                index: 3,
                down: true
            }
            .to_byte(),
            0x83
        );
        assert_eq!(
            RemoteEvent {
                index: 3,
                down: false
            }
            .to_byte(),
            0x03
        );
        assert_eq!(
            RemoteEvent::from_byte(0xFF),
            RemoteEvent {
                index: 127,
                down: true
            }
        );
        assert_eq!(
            RemoteEvent::from_byte(0x05),
            RemoteEvent {
                index: 5,
                down: false
            }
        );
    }

    #[test]
    fn key_event_converts_to_wire_event() {
        let event = KeyEvent {
            index: 4,
            pin: 9,
            down: true,
        };
        assert_eq!(RemoteEvent::from(event).to_byte(), 0x84);
    }
}
