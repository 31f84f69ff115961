//! # 16550 UART Transmitter
//!
//! Polling, transmit-only driver for the debug serial line. No interrupts are
//! available at this boot stage, so [`SerialPort::put_byte`] spins on the line
//! status register; a wedged line blocks forever.
//!
//! ## Register Map (offsets from the base port)
//!
//! | Offset | DLAB=0               | DLAB=1        |
//! |--------|----------------------|---------------|
//! | +0     | TX holding register  | divisor LSB   |
//! | +1     | interrupt enable     | divisor MSB   |
//! | +2     | FIFO control         |               |
//! | +3     | line control         |               |
//! | +4     | modem control        |               |
//! | +5     | line status          |               |

use core::fmt;

use crate::hal::PortIo;

/// Conventional base ports; any of them can go in [`SerialConfig::base`].
pub const COM1: u16 = 0x3F8;
pub const COM2: u16 = 0x2F8;
pub const COM3: u16 = 0x3E8;
pub const COM4: u16 = 0x2E8;

const DATA: u16 = 0;
const INT_ENABLE: u16 = 1;
const DIVISOR_LSB: u16 = 0;
const DIVISOR_MSB: u16 = 1;
const FIFO_CTRL: u16 = 2;
const LINE_CTRL: u16 = 3;
const MODEM_CTRL: u16 = 4;
const LINE_STATUS: u16 = 5;

const LCR_DLAB: u8 = 0x80;
const LCR_8N1: u8 = 0x03;

const LSR_TX_EMPTY: u8 = 0x20;

const FCR_ENABLE: u8 = 0x01;
const FCR_CLEAR_RX: u8 = 0x02;
const FCR_CLEAR_TX: u8 = 0x04;
const FCR_TRIGGER_14: u8 = 0xC0;

const MCR_DTR: u8 = 0x01;
const MCR_RTS: u8 = 0x02;
const MCR_OUT2: u8 = 0x08;

/// Baud rate, as its divisor of the 115200 Hz base clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Baud {
    B115200 = 1,
    B57600 = 2,
    B38400 = 3,
    B19200 = 6,
    B9600 = 12,
}

impl Baud {
    pub const fn divisor(self) -> u16 {
        self as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    pub base: u16,
    pub baud: Baud,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            base: crate::config::SERIAL_PORT,
            baud: crate::config::SERIAL_BAUD,
        }
    }
}

pub struct SerialPort<P> {
    ports: P,
    config: SerialConfig,
}

impl<P: PortIo> SerialPort<P> {
    pub fn new(ports: P, config: SerialConfig) -> Self {
        Self { ports, config }
    }

    /// 8N1 at the configured baud, FIFOs on and flushed, DTR/RTS/OUT2 raised,
    /// UART interrupts off.
    pub fn init(&mut self) {
        let divisor = self.config.baud.divisor();
        self.out(INT_ENABLE, 0x00);
        self.out(LINE_CTRL, LCR_DLAB);
        self.out(DIVISOR_LSB, divisor as u8);
        self.out(DIVISOR_MSB, (divisor >> 8) as u8);
        self.out(LINE_CTRL, LCR_8N1);
        self.out(FIFO_CTRL, FCR_ENABLE | FCR_CLEAR_RX | FCR_CLEAR_TX | FCR_TRIGGER_14);
        self.out(MODEM_CTRL, MCR_DTR | MCR_RTS | MCR_OUT2);
    }

    fn is_transmit_empty(&mut self) -> bool {
        self.ports.read_u8(self.config.base + LINE_STATUS) & LSR_TX_EMPTY != 0
    }

    /// Blocks until the holding register is empty.
    pub fn put_byte(&mut self, b: u8) {
        while !self.is_transmit_empty() {
            core::hint::spin_loop();
        }
        self.out(DATA, b);
    }

    /// Text output: every `\n` goes out as `\r\n`.
    pub fn write_text(&mut self, text: &str) {
        for b in text.bytes() {
            if b == b'\n' {
                self.put_byte(b'\r');
            }
            self.put_byte(b);
        }
    }

    /// Binary output: exactly `bytes.len()` bytes, untranslated.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.put_byte(b);
        }
    }

    pub fn config(&self) -> SerialConfig {
        self.config
    }

    pub fn ports(&self) -> &P {
        &self.ports
    }

    fn out(&mut self, register: u16, value: u8) {
        self.ports.write_u8(self.config.base + register, value);
    }
}

impl<P: PortIo> fmt::Write for SerialPort<P> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_text(s);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::{MockPorts, PortWrite};

    fn ready_ports() -> MockPorts {
        let mut ports = MockPorts::new();
        ports.set_default(COM1 + LINE_STATUS, LSR_TX_EMPTY as u32);
        ports
    }

    fn serial() -> SerialPort<MockPorts> {
        SerialPort::new(ready_ports(), SerialConfig::default())
    }

    #[test]
    fn test_init_sequence() {
        let mut port = serial();
        port.init();
        assert_eq!(
            port.ports().writes(),
            &[
                PortWrite::Byte(0x3F9, 0x00),
                PortWrite::Byte(0x3FB, 0x80),
                PortWrite::Byte(0x3F8, 0x03),
                PortWrite::Byte(0x3F9, 0x00),
                PortWrite::Byte(0x3FB, 0x03),
                PortWrite::Byte(0x3FA, 0xC7),
                PortWrite::Byte(0x3FC, 0x0B),
            ]
        );
    }

    #[test]
    fn test_init_other_port_and_baud() {
        let mut port = SerialPort::new(
            MockPorts::new(),
            SerialConfig {
                base: COM2,
                baud: Baud::B9600,
            },
        );
        port.init();
        assert_eq!(port.ports().writes()[2], PortWrite::Byte(COM2, 12));
        assert!(port
            .ports()
            .writes()
            .iter()
            .all(|w| matches!(w, PortWrite::Byte(p, _) if (COM2..COM2 + 8).contains(p))));
    }

    #[test]
    fn test_third_and_fourth_ports() {
        for base in [COM3, COM4] {
            let mut ports = MockPorts::new();
            ports.set_default(base + LINE_STATUS, LSR_TX_EMPTY as u32);
            let mut port = SerialPort::new(ports, SerialConfig { base, baud: Baud::B115200 });
            port.init();
            port.put_byte(b'4');
            assert_eq!(port.ports().writes()[2], PortWrite::Byte(base + DIVISOR_LSB, 1));
            assert_eq!(port.ports().bytes_written_to(base), vec![1, b'4']);
        }
    }

    #[test]
    fn test_put_byte_waits_for_empty_holding_register() {
        let mut ports = ready_ports();
        ports.script(COM1 + LINE_STATUS, &[0x00, 0x00, 0x01]);
        let mut port = SerialPort::new(ports, SerialConfig::default());
        port.put_byte(b'k');
        assert_eq!(port.ports().read_count(), 4);
        assert_eq!(port.ports().bytes_written_to(COM1), vec![b'k']);
    }

    #[test]
    fn test_write_text_translates_newlines() {
        let mut port = serial();
        port.write_text("a\nb\n");
        assert_eq!(port.ports().bytes_written_to(COM1), b"a\r\nb\r\n".to_vec());
    }

    #[test]
    fn test_write_bytes_is_binary_safe() {
        let mut port = serial();
        port.write_bytes(&[b'\n', 0x00, 0xFF, b'\r']);
        assert_eq!(port.ports().bytes_written_to(COM1), vec![b'\n', 0x00, 0xFF, b'\r']);
    }
}
