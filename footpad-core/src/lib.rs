//! Debounce core and wire protocol shared by the foot-pad firmware and the
//! host tool.
//!
//! This crate is `no_std` and never allocates, so the same code runs on the
//! AVR firmware and in the native host tool.

#![cfg_attr(not(test), no_std)]

mod log;

pub mod error;
pub mod key;
pub mod protocol;
pub mod state;
pub mod timer;

pub use error::Error;
pub use key::{Key, KeyEvent};
pub use protocol::{MagicMatcher, RemoteEvent, Setup, SetupCommand, SetupParser, MAGIC_NUMBER};
pub use state::{Applied, State, MAX_KEYS};
pub use timer::{Clock, Timer};
