//! Registry of all tracked keys and the debounce tunables.

use heapless::Vec;

use crate::error::Error;
use crate::key::{Key, KeyEvent};
use crate::log;
use crate::protocol::Setup;

/// Most keys a device can track.
pub const MAX_KEYS: usize = 128;

/// Default debounce interval in microseconds.
pub const DEFAULT_DEBOUNCE_MICROS: u32 = 1000;

/// What the caller has to do after a setup command was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Applied {
    /// Keep reading setup frames.
    Continue,
    /// Configuration is complete, start polling.
    Finished,
    /// Everything was reset, wait for a new connection.
    Reset,
}

#[derive(Debug, Clone)]
pub struct State {
    /// Minimum time a new reading has to hold before it is reported.
    pub debounce_micros: u32,
    /// Whether a bounce during the interval abandons the pending transition.
    pub await_smoothness: bool,
    /// Only read by the hardware layer.
    pub enable_interrupts: bool,
    keys: Vec<Key, MAX_KEYS>,
    /// Set once every key has been sampled since the last `init`.
    sampled: bool,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    pub const fn new() -> Self {
        Self {
            debounce_micros: DEFAULT_DEBOUNCE_MICROS,
            await_smoothness: true,
            enable_interrupts: false,
            keys: Vec::new(),
            sampled: false,
        }
    }

    /// Restore the defaults and drop all keys.
    pub fn init(&mut self) {
        self.debounce_micros = DEFAULT_DEBOUNCE_MICROS;
        self.await_smoothness = true;
        self.enable_interrupts = false;
        self.keys.clear();
        self.sampled = false;
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Start tracking `pin` as the next key.
    pub fn register_key(&mut self, pin: u8) -> Result<(), Error> {
        self.keys.push(Key::new(pin)).map_err(|_| Error::Capacity)
    }

    /// Whether any key waits for its debounce interval to end.
    pub fn has_pending(&self) -> bool {
        self.keys.iter().any(Key::is_pending)
    }

    /// Whether the keys have to be sampled now.
    ///
    /// Without interrupts that is always. With interrupts it is after a pin
    /// changed, while a transition is pending, and once after configuration
    /// so keys already held down get reported.
    pub fn needs_poll(&self, pin_changed: bool) -> bool {
        !self.enable_interrupts || pin_changed || !self.sampled || self.has_pending()
    }

    /// Poll every key in index order, handing each confirmed change to `emit`.
    pub fn poll_each<R, E>(&mut self, now: u32, mut raw_reader: R, mut emit: E)
    where
        R: FnMut(u8) -> bool,
        E: FnMut(KeyEvent),
    {
        let debounce_micros = self.debounce_micros;
        let await_smoothness = self.await_smoothness;
        self.sampled = true;

        for (index, key) in self.keys.iter_mut().enumerate() {
            let raw_down = raw_reader(key.pin());
            if let Some(mut event) = key.poll(now, raw_down, debounce_micros, await_smoothness) {
                event.index = index as u8;
                log::debug!("key {} (pin {}) down={}", event.index, event.pin, event.down);
                emit(event);
            }
        }
    }

    /// Poll every key and collect this tick's changes in index order.
    pub fn poll_all<R>(&mut self, now: u32, raw_reader: R) -> Vec<KeyEvent, MAX_KEYS>
    where
        R: FnMut(u8) -> bool,
    {
        let mut events = Vec::new();
        // At most one event per key, so this never overflows.
        self.poll_each(now, raw_reader, |event| {
            let _ = events.push(event);
        });
        events
    }

    /// Apply one decoded setup command.
    pub fn apply(&mut self, setup: Setup) -> Result<Applied, Error> {
        match setup {
            Setup::Finish => return Ok(Applied::Finished),
            Setup::Reset => {
                self.init();
                return Ok(Applied::Reset);
            }
            Setup::AddKey(pin) => self.register_key(pin)?,
            Setup::SetDebounce(micros) => self.debounce_micros = micros,
            Setup::AwaitSmoothness(on) => self.await_smoothness = on,
            Setup::EnableInterrupts(on) => self.enable_interrupts = on,
        }
        Ok(Applied::Continue)
    }
}
