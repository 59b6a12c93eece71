//! USART0 driver for the host link.
//!
//! 115200 baud, 8N1, double speed mode. Reads and writes busy-wait on the
//! status flags; nothing here uses interrupts.

use core::fmt;

use avr_device::atmega328p::USART0;

/// UBRR0 for 115200 baud at 16MHz with U2X0 set.
/// baud = CPU_FREQ / (8 * (UBRR0 + 1)) => 117647, 2.1% off.
const UBRR_VALUE: u16 = 16;

// UCSR0A
const RXC0: u8 = 1 << 7;
const UDRE0: u8 = 1 << 5;
const U2X0: u8 = 1 << 1;
// UCSR0B
const RXEN0: u8 = 1 << 4;
const TXEN0: u8 = 1 << 3;
// UCSR0C: UCSZ01 | UCSZ00, 8 data bits, no parity, 1 stop bit.
const FRAME_8N1: u8 = 0x06;

pub struct Serial<'a> {
    usart: &'a USART0,
}

impl<'a> Serial<'a> {
    pub fn new(usart: &'a USART0) -> Self {
        Self { usart }
    }

    pub fn init(&self) {
        self.usart.ubrr0.write(|w| unsafe { w.bits(UBRR_VALUE) });
        self.usart.ucsr0a.write(|w| unsafe { w.bits(U2X0) });
        self.usart.ucsr0c.write(|w| unsafe { w.bits(FRAME_8N1) });
        self.usart
            .ucsr0b
            .write(|w| unsafe { w.bits(RXEN0 | TXEN0) });
    }

    pub fn write_byte(&self, byte: u8) {
        while self.usart.ucsr0a.read().bits() & UDRE0 == 0 {}
        self.usart.udr0.write(|w| unsafe { w.bits(byte) });
    }

    pub fn write_all(&self, bytes: &[u8]) {
        for &b in bytes {
            self.write_byte(b);
        }
    }

    /// Returns a received byte, if one is waiting.
    pub fn try_read(&self) -> Option<u8> {
        if self.usart.ucsr0a.read().bits() & RXC0 == 0 {
            return None;
        }
        Some(self.usart.udr0.read().bits())
    }

    /// Block until a byte arrives.
    pub fn read(&self) -> u8 {
        loop {
            if let Some(b) = self.try_read() {
                return b;
            }
        }
    }
}

impl fmt::Write for Serial<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_all(s.as_bytes());
        Ok(())
    }
}
