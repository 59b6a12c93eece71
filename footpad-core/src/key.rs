//! Per-key debounce logic.
//!
//! A key only reports a new state after its raw reading disagreed with the
//! last reported state for a full debounce interval. Each key owns a single
//! [`Timer`] that is armed when a candidate transition starts.

use crate::log;
use crate::timer::Timer;

/// A confirmed state change of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyEvent {
    /// Position of the key in the registry.
    pub index: u8,
    pub pin: u8,
    /// New debounced state, true = pressed.
    pub down: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Key {
    pin: u8,
    /// What the host was last told about this key.
    was_down: bool,
    debounce_timer: Timer,
}

impl Key {
    pub const fn new(pin: u8) -> Self {
        Self {
            pin,
            was_down: false,
            debounce_timer: Timer::new(),
        }
    }

    /// Reset the key to released with no pending transition.
    pub fn init(&mut self, pin: u8) {
        *self = Self::new(pin);
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    pub fn was_down(&self) -> bool {
        self.was_down
    }

    /// Whether a candidate transition is waiting for its interval to end.
    pub fn is_pending(&self) -> bool {
        self.debounce_timer.is_armed()
    }

    /// Feed one raw reading taken at `now`.
    ///
    /// With `await_smoothness` the reading has to disagree with the reported
    /// state for `debounce_micros` without interruption; a reversal abandons
    /// the pending transition. Without it the interval counts from the first
    /// change and only the reading at expiry matters.
    ///
    /// Returns the event to report, with `index` left at 0 for the caller to
    /// fill in.
    pub fn poll(
        &mut self,
        now: u32,
        raw_down: bool,
        debounce_micros: u32,
        await_smoothness: bool,
    ) -> Option<KeyEvent> {
        if raw_down != self.was_down {
            if !self.debounce_timer.is_armed() {
                self.debounce_timer.set(now.wrapping_add(debounce_micros));
            }
        } else if await_smoothness && self.debounce_timer.is_armed() {
            log::debug!("pin {}: bounce, transition abandoned", self.pin);
            self.debounce_timer.disarm();
        }

        if self.debounce_timer.check(now) && raw_down != self.was_down {
            self.was_down = raw_down;
            return Some(KeyEvent {
                index: 0,
                pin: self.pin,
                down: raw_down,
            });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEBOUNCE: u32 = 1000;

    fn poll(key: &mut Key, now: u32, raw: bool) -> Option<bool> {
        key.poll(now, raw, DEBOUNCE, true).map(|ev| ev.down)
    }

    #[test]
    fn new_key_is_released_and_idle() {
        let key = Key::new(7);
        assert_eq!(key.pin(), 7);
        assert!(!key.was_down());
        assert!(!key.is_pending());
    }

    #[test]
    fn steady_reading_never_reports() {
        let mut key = Key::new(2);
        for t in (0..10_000).step_by(250) {
            assert_eq!(poll(&mut key, t, false), None);
        }
        assert!(!key.is_pending());
    }

    #[test]
    fn press_reports_after_interval() {
        let mut key = Key::new(2);
        assert_eq!(poll(&mut key, 0, true), None);
        assert!(key.is_pending());
        assert_eq!(poll(&mut key, 999, true), None);
        assert_eq!(poll(&mut key, 1000, true), Some(true));
        assert!(key.was_down());
        assert!(!key.is_pending());
        assert_eq!(poll(&mut key, 1001, true), None);
    }

    #[test]
    fn release_reports_after_interval() {
        let mut key = Key::new(2);
        poll(&mut key, 0, true);
        assert_eq!(poll(&mut key, 1000, true), Some(true));

        assert_eq!(poll(&mut key, 5000, false), None);
        assert_eq!(poll(&mut key, 5999, false), None);
        assert_eq!(poll(&mut key, 6000, false), Some(false));
        assert!(!key.was_down());
    }

    #[test]
    fn event_carries_pin() {
        let mut key = Key::new(42);
        key.poll(0, true, DEBOUNCE, true);
        let event = key.poll(DEBOUNCE, true, DEBOUNCE, true).unwrap();
        assert_eq!(event.pin, 42);
        assert!(event.down);
    }

    #[test]
    fn bounce_restarts_interval_when_awaiting_smoothness() {
        let mut key = Key::new(2);
        assert_eq!(poll(&mut key, 0, true), None);
        // Bounces back before the interval ends.
        assert_eq!(poll(&mut key, 400, false), None);
        assert!(!key.is_pending());
        // Settles down again: interval counts from here.
        assert_eq!(poll(&mut key, 600, true), None);
        assert_eq!(poll(&mut key, 1000, true), None);
        assert_eq!(poll(&mut key, 1599, true), None);
        assert_eq!(poll(&mut key, 1600, true), Some(true));
    }

    #[test]
    fn first_change_mode_counts_from_first_flip() {
        let mut key = Key::new(2);
        assert_eq!(key.poll(0, true, DEBOUNCE, false), None);
        assert_eq!(key.poll(400, false, DEBOUNCE, false), None);
        assert!(key.is_pending());
        assert_eq!(key.poll(600, true, DEBOUNCE, false), None);
        let event = key.poll(1000, true, DEBOUNCE, false).unwrap();
        assert!(event.down);
    }

    #[test]
    fn first_change_mode_drops_transition_that_reverted_at_expiry() {
        let mut key = Key::new(2);
        assert_eq!(key.poll(0, true, DEBOUNCE, false), None);
        assert_eq!(key.poll(1000, false, DEBOUNCE, false), None);
        assert!(!key.was_down());
        assert!(!key.is_pending());
    }

    #[test]
    fn late_poll_reports_once() {
        let mut key = Key::new(2);
        poll(&mut key, 0, true);
        assert_eq!(poll(&mut key, 50_000, true), Some(true));
        assert_eq!(poll(&mut key, 50_001, true), None);
    }

    #[test]
    fn debounce_across_clock_wrap() {
        let mut key = Key::new(2);
        let start = u32::MAX - 300;
        assert_eq!(poll(&mut key, start, true), None);
        assert_eq!(poll(&mut key, u32::MAX, true), None);
        assert_eq!(poll(&mut key, 698, true), None);
        assert_eq!(poll(&mut key, 699, true), Some(true));
    }

    #[test]
    fn init_forgets_state() {
        let mut key = Key::new(2);
        poll(&mut key, 0, true);
        poll(&mut key, 1000, true);
        poll(&mut key, 2000, false);
        key.init(9);
        assert_eq!(key.pin(), 9);
        assert!(!key.was_down());
        assert!(!key.is_pending());
    }
}
