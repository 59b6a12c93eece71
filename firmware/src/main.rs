//! Foot-pad controller firmware for ATmega328P (Arduino Uno class boards).
//!
//! The firmware:
//! - Waits for the host to open a connection with the `SerKey01` marker
//! - Takes its configuration (debounce interval, keys, sampling mode) from
//!   setup frames
//! - Debounces every configured key pin
//! - Sends one byte per confirmed key change

#![no_std]
#![no_main]
#![feature(abi_avr_interrupt)]

mod clock;
mod pins;
mod serial;

use core::fmt::Write;

use avr_device::atmega328p::Peripherals;
use footpad_core::{
    Applied, Clock, MagicMatcher, RemoteEvent, Setup, SetupParser, State, MAGIC_NUMBER,
};

use clock::HwClock;
use serial::Serial;

/// On AVR we just loop forever.
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}

#[avr_device::entry]
fn main() -> ! {
    let dp = unsafe { Peripherals::steal() };

    let mut serial = Serial::new(&dp.USART0);
    serial.init();
    clock::init(&dp.TC0);

    // SAFETY: the interrupt handlers only touch state behind interrupt mutexes.
    unsafe { avr_device::interrupt::enable() };

    let mut state = State::new();

    loop {
        state.init();
        pins::disable_change_interrupts(&dp.EXINT);

        wait_for_host(&serial);
        if configure(&dp, &mut serial, &mut state) {
            run(&dp, &serial, &mut state);
        }
    }
}

/// Skip bytes until the host marker arrives, then answer with ours.
fn wait_for_host(serial: &Serial) {
    let mut matcher = MagicMatcher::new();
    while !matcher.push(serial.read()) {}
    serial.write_all(&MAGIC_NUMBER);
}

/// Apply setup frames until the host finishes. Every command is answered
/// with a log line; an empty line ends the log.
///
/// Returns false if the host reset the connection instead.
fn configure(dp: &Peripherals, serial: &mut Serial, state: &mut State) -> bool {
    let mut parser = SetupParser::new();

    loop {
        let setup = match parser.push(serial.read()) {
            Ok(Some(setup)) => setup,
            Ok(None) => continue,
            Err(err) => {
                let _ = writeln!(serial, "error: {}", err);
                continue;
            }
        };

        // An unusable pin still takes a key slot so the host's key indices
        // stay aligned; it simply never reads as down.
        if let Setup::AddKey(pin) = setup {
            if !pins::configure_input(dp, pin) {
                let _ = writeln!(serial, "warning: pin {} cannot carry a key", pin);
            }
        }

        match state.apply(setup) {
            Ok(Applied::Continue) => log_setup(serial, state, setup),
            Ok(Applied::Finished) => {
                let _ = writeln!(serial, "{} keys ready", state.key_count());
                let _ = writeln!(serial);
                return true;
            }
            Ok(Applied::Reset) => return false,
            Err(err) => {
                let _ = writeln!(serial, "error: {}", err);
            }
        }
    }
}

fn log_setup(serial: &mut Serial, state: &State, setup: Setup) {
    let _ = match setup {
        Setup::AddKey(pin) => writeln!(serial, "key {} on pin {}", state.key_count() - 1, pin),
        Setup::SetDebounce(micros) => writeln!(serial, "debounce {} us", micros),
        Setup::AwaitSmoothness(on) => writeln!(serial, "await smoothness: {}", on),
        Setup::EnableInterrupts(on) => writeln!(serial, "interrupts: {}", on),
        Setup::Finish | Setup::Reset => Ok(()),
    };
}

/// Poll loop. Returns when the host sends a reset frame.
fn run(dp: &Peripherals, serial: &Serial, state: &mut State) {
    let clock = HwClock::new(&dp.TC0);
    let mut parser = SetupParser::new();

    if state.enable_interrupts {
        for key in state.keys() {
            pins::enable_change_interrupt(&dp.EXINT, key.pin());
        }
    }

    loop {
        if let Some(byte) = serial.try_read() {
            if let Ok(Some(Setup::Reset)) = parser.push(byte) {
                return;
            }
        }

        if !state.needs_poll(pins::take_change()) {
            continue;
        }

        state.poll_each(
            clock.now(),
            |pin| pins::is_down(dp, pin),
            |event| serial.write_byte(RemoteEvent::from(event).to_byte()),
        );
    }
}
