//! Host configuration file.
//!
//! Stored as TOML next to the tool. A missing or broken file is replaced by
//! the defaults, so the tool always starts with a usable configuration.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serialport::SerialPortType;
use std::fs;
use std::path::Path;
use tracing::{error, warn};

use footpad_core::{Setup, MAX_KEYS};

/// `serial_port` prefix selecting the first USB port whose product name
/// contains the rest of the string.
const AUTO_USB_PREFIX: &str = ":auto-usb-";

/// Placeholder in `previous_command` replaced by the resolved port name.
const PORT_PLACEHOLDER: &str = "{{port}}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMap {
    /// The device pin to map this key to.
    pub pin: u8,
    /// The keycodes to map this key to.
    pub keycodes: Vec<u16>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebounceType {
    /// Wait `debounce_ms` from the first state change.
    FirstChange,
    /// Wait `debounce_ms` from the last state change.
    LastChange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial port to connect to, or `:auto-usb-<product>`.
    pub serial_port: String,
    /// Shell command run before connecting, e.g. to program the device.
    /// `{{port}}` is replaced by the resolved port name.
    pub previous_command: Option<String>,
    pub baud_rate: u32,
    pub debounce_ms: f64,
    pub debounce_type: DebounceType,
    /// Let the device sample pins on pin-change interrupts.
    pub enable_interrupts: bool,
    /// How long to wait for the device to respond.
    pub timeout_ms: u64,
    /// Enable debug logging, including every byte read from the device.
    pub verbose: bool,
    /// Keys to map, in device key order.
    pub key_maps: Vec<KeyMap>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial_port: format!("{}arduino", AUTO_USB_PREFIX),
            previous_command: None,
            baud_rate: 115_200,
            debounce_ms: 1.0,
            debounce_type: DebounceType::LastChange,
            enable_interrupts: false,
            timeout_ms: 3000,
            verbose: false,
            key_maps: vec![KeyMap {
                pin: 2,
                keycodes: vec![32],
            }],
        }
    }
}

impl Config {
    /// Read and parse the configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("serializing configuration")?;
        fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
    }

    /// Fall back to the defaults after `load` failed, writing them to `path`
    /// so there is a file to edit.
    pub fn recover(path: &Path, err: &anyhow::Error) -> Self {
        warn!("error reading config file: {:#}", err);
        warn!("using default config");
        let cfg = Self::default();
        if let Err(err) = cfg.save(path) {
            error!("error writing config file: {:#}", err);
        }
        cfg
    }

    /// Debounce interval in whole microseconds, clamped to what the device
    /// accepts.
    pub fn debounce_micros(&self) -> u32 {
        // `as` saturates and maps NaN to 0.
        (self.debounce_ms * 1000.0) as u32
    }

    pub fn await_smoothness(&self) -> bool {
        self.debounce_type == DebounceType::LastChange
    }

    /// Setup frames configuring the device, in the order it expects them.
    pub fn setup_frames(&self) -> Result<Vec<Setup>> {
        if self.key_maps.len() > MAX_KEYS {
            bail!(
                "{} key maps configured, the device supports at most {}",
                self.key_maps.len(),
                MAX_KEYS
            );
        }

        let mut frames = vec![
            Setup::SetDebounce(self.debounce_micros()),
            Setup::AwaitSmoothness(self.await_smoothness()),
        ];
        frames.extend(self.key_maps.iter().map(|km| Setup::AddKey(km.pin)));
        frames.push(Setup::EnableInterrupts(self.enable_interrupts));
        frames.push(Setup::Finish);
        Ok(frames)
    }

    /// Get a physical port name, resolving any wildcards in the config.
    pub fn resolve_port(&self) -> Result<String> {
        let Some(wanted) = self.serial_port.strip_prefix(AUTO_USB_PREFIX) else {
            return Ok(self.serial_port.clone());
        };

        let ports = serialport::available_ports().context("failed to enumerate serial ports")?;
        let port = ports.into_iter().find(|port| match &port.port_type {
            SerialPortType::UsbPort(info) => info
                .product
                .as_deref()
                .is_some_and(|product| product_matches(product, wanted)),
            _ => false,
        });

        match port {
            Some(port) => Ok(port.port_name),
            None => bail!(
                "found no usb serial port containing '{}' in its name",
                wanted.to_lowercase()
            ),
        }
    }

    /// `previous_command` with the port placeholder filled in.
    pub fn previous_command_for(&self, port: &str) -> Option<String> {
        self.previous_command
            .as_ref()
            .map(|cmd| cmd.replace(PORT_PLACEHOLDER, port))
    }
}

/// Case-insensitive substring match on a USB product name.
fn product_matches(product: &str, wanted: &str) -> bool {
    product.to_lowercase().contains(&wanted.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_device() {
        let cfg = Config::default();
        assert_eq!(cfg.serial_port, ":auto-usb-arduino");
        assert_eq!(cfg.baud_rate, 115_200);
        assert_eq!(cfg.debounce_micros(), 1000);
        assert!(cfg.await_smoothness());
        assert_eq!(
            cfg.key_maps,
            vec![KeyMap {
                pin: 2,
                keycodes: vec![32]
            }]
        );
    }

    #[test]
    fn partial_file_uses_defaults_for_missing_fields() {
        let cfg: Config = toml::from_str(
            r#"
            serial_port = "/dev/ttyACM0"
            debounce_ms = 2.5
            debounce_type = "FirstChange"

            [[key_maps]]
            pin = 4
            keycodes = [65, 66]

            [[key_maps]]
            pin = 5
            keycodes = []
            "#,
        )
        .unwrap();

        assert_eq!(cfg.serial_port, "/dev/ttyACM0");
        assert_eq!(cfg.baud_rate, 115_200);
        assert_eq!(cfg.debounce_micros(), 2500);
        assert!(!cfg.await_smoothness());
        assert_eq!(cfg.key_maps.len(), 2);
        assert_eq!(cfg.key_maps[0].keycodes, vec![65, 66]);
    }

    #[test]
    fn saved_file_loads_back() {
        let path = std::env::temp_dir().join(format!("footpad-cfg-{}.toml", std::process::id()));
        let mut cfg = Config::default();
        cfg.previous_command = Some("avrdude -P {{port}}".into());
        cfg.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn broken_file_is_replaced_by_defaults() {
        let path = std::env::temp_dir().join(format!("footpad-broken-{}.toml", std::process::id()));
        fs::write(&path, "serial_port = [unterminated").unwrap();

        let err = Config::load(&path).unwrap_err();
        let cfg = Config::recover(&path, &err);
        assert_eq!(cfg, Config::default());

        let reloaded = Config::load(&path);
        fs::remove_file(&path).ok();
        assert_eq!(reloaded.unwrap(), Config::default());
    }

    #[test]
    fn load_missing_file_fails() {
        let path = Path::new("/nonexistent/footpad.toml");
        assert!(Config::load(path).is_err());
    }

    #[test]
    fn debounce_is_clamped() {
        let mut cfg = Config::default();
        cfg.debounce_ms = -3.0;
        assert_eq!(cfg.debounce_micros(), 0);
        cfg.debounce_ms = 1e12;
        assert_eq!(cfg.debounce_micros(), u32::MAX);
        cfg.debounce_ms = 0.0125;
        assert_eq!(cfg.debounce_micros(), 12);
    }

    #[test]
    fn setup_frames_in_device_order() {
        let mut cfg = Config::default();
        cfg.enable_interrupts = true;
        cfg.key_maps.push(KeyMap {
            pin: 7,
            keycodes: vec![],
        });
        assert_eq!(
            cfg.setup_frames().unwrap(),
            vec![
                Setup::SetDebounce(1000),
                Setup::AwaitSmoothness(true),
                Setup::AddKey(2),
                Setup::AddKey(7),
                Setup::EnableInterrupts(true),
                Setup::Finish,
            ]
        );
    }

    #[test]
    fn too_many_key_maps_rejected() {
        let mut cfg = Config::default();
        cfg.key_maps = (0..=MAX_KEYS)
            .map(|i| KeyMap {
                pin: i as u8,
                keycodes: vec![],
            })
            .collect();
        assert!(cfg.setup_frames().is_err());
    }

    #[test]
    fn literal_port_is_used_as_is() {
        let mut cfg = Config::default();
        cfg.serial_port = "COM3".into();
        assert_eq!(cfg.resolve_port().unwrap(), "COM3");
    }

    #[test]
    fn product_match_ignores_case() {
        assert!(product_matches("Arduino Uno", "arduino"));
        assert!(product_matches("USB2.0-Serial ARDUINO", "Arduino"));
        assert!(!product_matches("CP2102 USB to UART", "arduino"));
    }

    #[test]
    fn previous_command_gets_port() {
        let mut cfg = Config::default();
        assert_eq!(cfg.previous_command_for("/dev/ttyUSB0"), None);
        cfg.previous_command = Some("avrdude -P {{port}} -U flash:w:fw.hex".into());
        assert_eq!(
            cfg.previous_command_for("/dev/ttyUSB0").as_deref(),
            Some("avrdude -P /dev/ttyUSB0 -U flash:w:fw.hex")
        );
    }
}
