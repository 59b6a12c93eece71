//! Serial link to the foot-pad.
//!
//! Opening a connection resets the device, exchanges the protocol marker,
//! sends the setup frames from the configuration and collects the setup log
//! the device prints in response.

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serialport::{SerialPort, SerialPortType};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::{debug, info};

use footpad_core::{MagicMatcher, RemoteEvent, Setup, MAGIC_NUMBER};

use crate::config::Config;

/// Read timeout while waiting for events. Timeouts are retried, this only
/// bounds how long a single read blocks.
const EVENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Print all serial ports with their USB details.
pub fn list_ports() -> Result<()> {
    let ports = serialport::available_ports().context("failed to enumerate available ports")?;
    if ports.is_empty() {
        println!("no serial ports found");
    }
    for port in ports {
        print!(" {}: ", port.port_name);
        match port.port_type {
            SerialPortType::UsbPort(info) => {
                println!("usb port");
                println!("  vendor id: 0x{:04X}", info.vid);
                println!("  product id: 0x{:04X}", info.pid);
                let unavailable = || "unavailable".to_string();
                println!(
                    "  serial number: '{}'",
                    info.serial_number.unwrap_or_else(unavailable)
                );
                println!(
                    "  manufacturer: '{}'",
                    info.manufacturer.unwrap_or_else(unavailable)
                );
                println!("  product name: '{}'", info.product.unwrap_or_else(unavailable));
            }
            SerialPortType::PciPort => println!("pci port"),
            SerialPortType::BluetoothPort => println!("bluetooth port"),
            SerialPortType::Unknown => println!("unknown port type"),
        }
    }
    Ok(())
}

pub struct Connection<S> {
    link: S,
}

impl Connection<Box<dyn SerialPort>> {
    /// Open `port` and bring the device into its event reporting state.
    pub fn open(port: &str, cfg: &Config) -> Result<Self> {
        info!("opening serial port '{}'", port);
        let serial = serialport::new(port, cfg.baud_rate)
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .open()
            .context(
                "failed to open serial port, ensure device is connected and the correct port is being used",
            )?;

        let mut conn = Connection::new(serial);
        conn.initialize(cfg)
            .context("failed to initialize connection")?;
        conn.link
            .set_timeout(EVENT_TIMEOUT)
            .context("failed to set event timeout")?;
        Ok(conn)
    }
}

impl<S: Read + Write> Connection<S> {
    pub fn new(link: S) -> Self {
        Self { link }
    }

    fn send(&mut self, setup: Setup) -> Result<()> {
        debug!("sending {:?}", setup);
        self.link
            .write_all(&setup.encode())
            .with_context(|| format!("failed to send {:?}", setup.command()))
    }

    /// Skip bytes until the device marker arrives. Returns the number of
    /// skipped bytes.
    fn read_magic(&mut self) -> Result<usize> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .context("invalid spinner template")?,
        );
        spinner.set_message("waiting for device");
        spinner.enable_steady_tick(Duration::from_millis(100));

        let mut matcher = MagicMatcher::new();
        let result = loop {
            let mut byte = [0; 1];
            if let Err(err) = self.link.read_exact(&mut byte) {
                break Err(err).context("reading magic number failed");
            }
            debug!("magic byte {:?}", byte[0] as char);
            if matcher.push(byte[0]) {
                break Ok(matcher.garbage());
            }
        };

        spinner.finish_and_clear();
        result
    }

    /// Read setup log lines until an empty line.
    fn read_setup_log(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        let mut line_buf = Vec::new();
        loop {
            line_buf.clear();
            loop {
                let mut byte = [0; 1];
                self.link
                    .read_exact(&mut byte)
                    .context("failed to read setup log")?;
                if byte[0] == b'\n' {
                    break;
                }
                line_buf.push(byte[0]);
            }

            let line = String::from_utf8_lossy(&line_buf);
            let line = line.trim();
            if line.is_empty() {
                return Ok(lines);
            }
            lines.push(line.to_string());
        }
    }

    /// Reset the device, exchange markers and send the configuration.
    ///
    /// Returns the device's setup log.
    pub fn initialize(&mut self, cfg: &Config) -> Result<Vec<String>> {
        let frames = cfg.setup_frames()?;

        // The device might still be running a previous session.
        self.send(Setup::Reset)?;
        self.link
            .write_all(&MAGIC_NUMBER)
            .context("failed to send magic number")?;

        let garbage = self.read_magic()?;
        info!("received magic number after {} bytes of garbage", garbage);

        for setup in frames {
            self.send(setup)?;
        }
        self.link.flush().context("failed to flush setup")?;

        let log = self.read_setup_log()?;
        info!("device setup output:");
        for line in &log {
            info!(" {}", line);
        }
        info!("--- setup finished ---");
        Ok(log)
    }

    /// Block until an event is read.
    pub fn read_event(&mut self) -> Result<RemoteEvent> {
        let mut byte = [0; 1];
        loop {
            match self.link.read(&mut byte) {
                Ok(0) => bail!("device closed the connection"),
                Ok(_) => break,
                Err(err) if err.kind() == ErrorKind::TimedOut => continue,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err).context("failed to read event"),
            }
        }
        debug!("received event byte 0x{:02X}", byte[0]);
        Ok(RemoteEvent::from_byte(byte[0]))
    }
}
