//! Microsecond clock on Timer0.
//!
//! Timer0 runs at 16MHz / 64, one tick every 4us, and overflows every 1024us.
//! The overflow interrupt extends the 8 bit counter; the combined value wraps
//! at `u32::MAX` microseconds (about 71 minutes).

use core::cell::Cell;

use avr_device::atmega328p::TC0;
use avr_device::interrupt::{self, Mutex};

/// Microseconds per timer tick at prescaler 64.
const US_PER_TICK: u32 = 4;

/// TCCR0B: CS01 | CS00 selects prescaler 64.
const PRESCALE_64: u8 = 0x03;
/// TIMSK0 / TIFR0 overflow bit.
const TOV0: u8 = 0x01;

static OVERFLOWS: Mutex<Cell<u32>> = Mutex::new(Cell::new(0));

/// Start Timer0 in normal mode with the overflow interrupt enabled.
pub fn init(tc0: &TC0) {
    tc0.tccr0a.write(|w| unsafe { w.bits(0) });
    tc0.tcnt0.write(|w| unsafe { w.bits(0) });
    tc0.tifr0.write(|w| unsafe { w.bits(TOV0) });
    tc0.timsk0.write(|w| unsafe { w.bits(TOV0) });
    tc0.tccr0b.write(|w| unsafe { w.bits(PRESCALE_64) });
}

/// Current time in microseconds.
pub fn micros(tc0: &TC0) -> u32 {
    interrupt::free(|cs| {
        let mut overflows = OVERFLOWS.borrow(cs).get();
        let ticks = tc0.tcnt0.read().bits();

        // An overflow that happened since interrupts were masked is not
        // counted yet.
        if tc0.tifr0.read().bits() & TOV0 != 0 && ticks < 255 {
            overflows = overflows.wrapping_add(1);
        }

        ((overflows << 8) | ticks as u32).wrapping_mul(US_PER_TICK)
    })
}

/// Timer0 as the clock of the debounce core.
pub struct HwClock<'a> {
    tc0: &'a TC0,
}

impl<'a> HwClock<'a> {
    pub fn new(tc0: &'a TC0) -> Self {
        Self { tc0 }
    }
}

impl footpad_core::Clock for HwClock<'_> {
    fn now(&self) -> u32 {
        micros(self.tc0)
    }
}

#[avr_device::interrupt(atmega328p)]
fn TIMER0_OVF() {
    interrupt::free(|cs| {
        let overflows = OVERFLOWS.borrow(cs);
        overflows.set(overflows.get().wrapping_add(1));
    });
}
