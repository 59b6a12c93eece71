//! Digital input pins, numbered like the Arduino Uno headers.
//!
//! Pin mapping on the ATmega328P:
//!   D2..D7   -> PD2..PD7
//!   D8..D13  -> PB0..PB5
//!   A0..A5   -> PC0..PC5 (pins 14..19)
//!
//! D0 and D1 carry the serial link and cannot be used as keys. Key switches
//! connect the pin to ground, so a low reading means the key is down.

use core::cell::Cell;

use avr_device::atmega328p::{Peripherals, EXINT};
use avr_device::interrupt::{self, Mutex};

#[derive(Copy, Clone, PartialEq, Eq)]
enum Port {
    B,
    C,
    D,
}

/// Set from the pin change interrupts, cleared by [`take_change`].
static CHANGED: Mutex<Cell<bool>> = Mutex::new(Cell::new(false));

/// Port and bit of a key-capable pin.
fn locate(pin: u8) -> Option<(Port, u8)> {
    match pin {
        2..=7 => Some((Port::D, pin)),
        8..=13 => Some((Port::B, pin - 8)),
        14..=19 => Some((Port::C, pin - 14)),
        _ => None,
    }
}

/// Configure `pin` as input with pull-up. Returns false if the pin cannot
/// carry a key.
pub fn configure_input(dp: &Peripherals, pin: u8) -> bool {
    let Some((port, bit)) = locate(pin) else {
        return false;
    };
    let mask = 1u8 << bit;

    match port {
        Port::B => {
            dp.PORTB.ddrb.modify(|r, w| unsafe { w.bits(r.bits() & !mask) });
            dp.PORTB.portb.modify(|r, w| unsafe { w.bits(r.bits() | mask) });
        }
        Port::C => {
            dp.PORTC.ddrc.modify(|r, w| unsafe { w.bits(r.bits() & !mask) });
            dp.PORTC.portc.modify(|r, w| unsafe { w.bits(r.bits() | mask) });
        }
        Port::D => {
            dp.PORTD.ddrd.modify(|r, w| unsafe { w.bits(r.bits() & !mask) });
            dp.PORTD.portd.modify(|r, w| unsafe { w.bits(r.bits() | mask) });
        }
    }
    true
}

/// Whether the key on `pin` currently reads as pressed.
///
/// This only reads the input register, so it is safe to call from any
/// context.
pub fn is_down(dp: &Peripherals, pin: u8) -> bool {
    let Some((port, bit)) = locate(pin) else {
        return false;
    };
    let bits = match port {
        Port::B => dp.PORTB.pinb.read().bits(),
        Port::C => dp.PORTC.pinc.read().bits(),
        Port::D => dp.PORTD.pind.read().bits(),
    };
    bits & (1 << bit) == 0
}

/// Let a level change on `pin` raise a pin change interrupt.
pub fn enable_change_interrupt(exint: &EXINT, pin: u8) {
    let Some((port, bit)) = locate(pin) else {
        return;
    };
    let mask = 1u8 << bit;

    // PCICR: PCIE0 = PORTB, PCIE1 = PORTC, PCIE2 = PORTD.
    match port {
        Port::B => {
            exint.pcmsk0.modify(|r, w| unsafe { w.bits(r.bits() | mask) });
            exint.pcicr.modify(|r, w| unsafe { w.bits(r.bits() | 0x01) });
        }
        Port::C => {
            exint.pcmsk1.modify(|r, w| unsafe { w.bits(r.bits() | mask) });
            exint.pcicr.modify(|r, w| unsafe { w.bits(r.bits() | 0x02) });
        }
        Port::D => {
            exint.pcmsk2.modify(|r, w| unsafe { w.bits(r.bits() | mask) });
            exint.pcicr.modify(|r, w| unsafe { w.bits(r.bits() | 0x04) });
        }
    }
}

/// Turn off all pin change interrupts.
pub fn disable_change_interrupts(exint: &EXINT) {
    exint.pcicr.write(|w| unsafe { w.bits(0) });
    exint.pcmsk0.write(|w| unsafe { w.bits(0) });
    exint.pcmsk1.write(|w| unsafe { w.bits(0) });
    exint.pcmsk2.write(|w| unsafe { w.bits(0) });
    interrupt::free(|cs| CHANGED.borrow(cs).set(false));
}

/// Returns whether a pin changed since the last call.
pub fn take_change() -> bool {
    interrupt::free(|cs| CHANGED.borrow(cs).replace(false))
}

fn mark_changed() {
    interrupt::free(|cs| CHANGED.borrow(cs).set(true));
}

#[avr_device::interrupt(atmega328p)]
fn PCINT0() {
    mark_changed();
}

#[avr_device::interrupt(atmega328p)]
fn PCINT1() {
    mark_changed();
}

#[avr_device::interrupt(atmega328p)]
fn PCINT2() {
    mark_changed();
}
