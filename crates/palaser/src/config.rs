//! Tool configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use palaser_core::LaserDefaults;
use palaser_hid::{DriverSettings, Opcodes};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Device settings
    #[serde(default)]
    pub device: DeviceConfig,
    /// Settings applied by `-on`
    #[serde(default)]
    pub laser: LaserConfig,
    /// Sequence file settings
    #[serde(default)]
    pub sequence: SequenceConfig,
    /// Firmware opcode overrides
    #[serde(default)]
    pub protocol: Opcodes,
}

/// Device settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// USB Vendor ID
    #[serde(default = "default_vid")]
    pub vendor_id: String,
    /// USB Product ID
    #[serde(default = "default_pid")]
    pub product_id: String,
    /// HID interface number
    #[serde(default)]
    pub interface: u8,
    /// USB transfer timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Pause after each command
    #[serde(default = "default_command_delay_ms")]
    pub command_delay_ms: u64,
    /// Reads per state query
    #[serde(default = "default_state_reads")]
    pub state_reads: u8,
    /// Pad output reports to 64 bytes (platform default if unset)
    pub pad_reports: Option<bool>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vendor_id: default_vid(),
            product_id: default_pid(),
            interface: 0,
            timeout_ms: default_timeout_ms(),
            command_delay_ms: default_command_delay_ms(),
            state_reads: default_state_reads(),
            pad_reports: None,
        }
    }
}

fn default_vid() -> String {
    "c251".to_string()
}

fn default_pid() -> String {
    "2201".to_string()
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_command_delay_ms() -> u64 {
    10
}

fn default_state_reads() -> u8 {
    2
}

/// Laser settings used by `-on`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaserConfig {
    /// Frequency in Hz
    #[serde(default = "default_frequency")]
    pub frequency_hz: f32,
    /// DAC value in mV
    #[serde(default)]
    pub dac_mv: u16,
}

impl Default for LaserConfig {
    fn default() -> Self {
        Self { frequency_hz: default_frequency(), dac_mv: 0 }
    }
}

fn default_frequency() -> f32 {
    1_000.0
}

/// Sequence file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceConfig {
    /// Directory searched for sequence files
    #[serde(default = "default_sequence_dir")]
    pub directory: PathBuf,
    /// File used when none is chosen
    #[serde(default = "default_sequence_file")]
    pub default_file: String,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self { directory: default_sequence_dir(), default_file: default_sequence_file() }
    }
}

fn default_sequence_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_sequence_file() -> String {
    "streamfile.txt".to_string()
}

impl Config {
    /// Build the USB driver settings.
    pub fn driver_settings(&self) -> Result<DriverSettings> {
        let device = &self.device;
        let defaults = DriverSettings::default();
        Ok(DriverSettings {
            vendor_id: parse_usb_id(&device.vendor_id).context("Invalid device.vendor_id")?,
            product_id: parse_usb_id(&device.product_id).context("Invalid device.product_id")?,
            interface: device.interface,
            timeout: Duration::from_millis(device.timeout_ms),
            command_delay: Duration::from_millis(device.command_delay_ms),
            state_reads: device.state_reads,
            pad_reports: device.pad_reports.unwrap_or(defaults.pad_reports),
            opcodes: self.protocol,
        })
    }

    /// Frequency and DAC for `-on`. Their range is checked when `-on` runs.
    #[must_use]
    pub fn laser_defaults(&self) -> LaserDefaults {
        LaserDefaults { frequency_hz: self.laser.frequency_hz, dac_millivolts: self.laser.dac_mv }
    }
}

/// Parse a hexadecimal USB ID, with or without `0x`.
fn parse_usb_id(value: &str) -> Result<u16> {
    let digits = value.trim().trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).with_context(|| format!("{value:?} is not a hex USB ID"))
}

/// Load configuration from file or defaults.
pub fn load_config() -> Result<Config> {
    load_from(&config_path()?)
}

fn load_from(config_path: &Path) -> Result<Config> {
    if config_path.exists() {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {config_path:?}"))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {config_path:?}"))?;
        debug!(?config_path, "Configuration loaded");
        Ok(config)
    } else {
        info!(?config_path, "Config file not found, using defaults");
        Ok(Config::default())
    }
}

/// Get the configuration file path.
fn config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("com", "particulars", "PaLaser")
        .context("Could not determine config directory")?;
    Ok(dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_board() {
        let settings = Config::default().driver_settings().expect("Failed to build settings");
        assert_eq!(settings.vendor_id, 0xc251);
        assert_eq!(settings.product_id, 0x2201);
        assert_eq!(settings.command_delay, Duration::from_millis(10));
        assert_eq!(settings.state_reads, 2);
        assert_eq!(settings.opcodes, Opcodes::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [device]
            timeout_ms = 250
            pad_reports = true

            [laser]
            frequency_hz = 5000.0
            dac_mv = 1200

            [protocol]
            adc_acquire = 17
            "#,
        )
        .expect("Failed to parse config");

        let settings = config.driver_settings().unwrap();
        assert_eq!(settings.timeout, Duration::from_millis(250));
        assert!(settings.pad_reports);
        assert_eq!(settings.vendor_id, 0xc251);
        assert_eq!(settings.opcodes.adc_acquire, 17);
        assert_eq!(settings.opcodes.frequency_word, 99);

        let defaults = config.laser_defaults();
        assert!((defaults.frequency_hz - 5000.0).abs() < f32::EPSILON);
        assert_eq!(defaults.dac_millivolts, 1200);
        assert_eq!(config.sequence.default_file, "streamfile.txt");
    }

    #[test]
    fn test_usb_id_parsing() {
        assert_eq!(parse_usb_id("c251").unwrap(), 0xc251);
        assert_eq!(parse_usb_id("0x2201").unwrap(), 0x2201);
        assert!(parse_usb_id("laser").is_err());
        assert!(parse_usb_id("1ffff").is_err());
    }

    #[test]
    fn test_out_of_range_dac_still_loads() {
        let config: Config = toml::from_str("[laser]\ndac_mv = 5000\n").expect("Failed to parse config");
        assert!(config.driver_settings().is_ok());
        assert_eq!(config.laser_defaults().dac_millivolts, 5000);
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from(&dir.path().join("config.toml")).expect("Failed to load config");
        assert_eq!(config.device.vendor_id, "c251");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sequence]\ndirectory = \"/opt/patterns\"\n").unwrap();

        let config = load_from(&path).expect("Failed to load config");
        assert_eq!(config.sequence.directory, PathBuf::from("/opt/patterns"));
    }

    #[test]
    fn test_load_from_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[device\n").unwrap();

        assert!(load_from(&path).is_err());
    }
}
