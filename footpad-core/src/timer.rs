//! Single-shot deadline on a wrapping microsecond clock.

/// Source of the current time in microseconds.
///
/// The counter is expected to wrap at `u32::MAX` like the hardware timer
/// backing it.
pub trait Clock {
    fn now(&self) -> u32;
}

/// A one-shot point in time that reports its expiry exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timer {
    /// Only meaningful while `armed` is set.
    deadline: u32,
    armed: bool,
}

impl Timer {
    pub const fn new() -> Self {
        Self {
            deadline: 0,
            armed: false,
        }
    }

    /// Disarm the timer.
    pub fn init(&mut self) {
        self.armed = false;
    }

    /// Arm the timer for `deadline`, replacing any pending deadline.
    pub fn set(&mut self, deadline: u32) {
        self.deadline = deadline;
        self.armed = true;
    }

    /// Drop a pending deadline without firing it.
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Returns true the first time `now` is at or past the deadline, then
    /// disarms.
    ///
    /// The difference is taken in 32 bits and read back as signed, so the
    /// answer stays correct across a counter wrap as long as the deadline is
    /// less than half the clock range away.
    pub fn check(&mut self, now: u32) -> bool {
        if !self.armed {
            return false;
        }
        let expired = now.wrapping_sub(self.deadline) as i32 >= 0;
        if expired {
            self.armed = false;
        }
        expired
    }

    /// Like [`Timer::check`], reading the time from `clock`.
    pub fn check_now<C: Clock + ?Sized>(&mut self, clock: &C) -> bool {
        self.check(clock.now())
    }
}
