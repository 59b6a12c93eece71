//! Error type of the debounce core and the setup protocol.
//!
//! All variants carry only fixed-size data so the type stays `Copy` and
//! usable without `alloc`.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// All `MAX_KEYS` key slots are in use.
    Capacity,
    /// A setup frame started with a code no command uses.
    UnknownCommand(u8),
    /// A setup frame announced a payload length its command does not take.
    BadLength { command: u8, len: u16 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Capacity => write!(f, "key capacity exhausted"),
            Error::UnknownCommand(code) => write!(f, "unknown setup command 0x{:02X}", code),
            Error::BadLength { command, len } => write!(
                f,
                "setup command 0x{:02X} does not take {} payload bytes",
                command, len
            ),
        }
    }
}
