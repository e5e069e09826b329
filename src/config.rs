//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{AfarError, Result};
use crate::wire::protocol::{AddressingMode, MAX_BUS_ADDRESS};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub link: LinkConfig,
    pub protocol: ProtocolConfig,
    pub telemetry: TelemetryConfig,
    pub logging: LoggingConfig,
}

/// Physical link kind
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    #[default]
    Serial,
    Udp,
}

/// Link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default)]
    pub kind: LinkKind,

    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_udp_port")]
    pub udp_port: u16,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_write_delay_ms")]
    pub write_delay_ms: u64,
}

/// Wire-format variant as written in the config file
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Addressing {
    #[default]
    Bus,
    PointToPoint,
}

impl From<Addressing> for AddressingMode {
    fn from(addressing: Addressing) -> Self {
        match addressing {
            Addressing::Bus => AddressingMode::Bus,
            Addressing::PointToPoint => AddressingMode::PointToPoint,
        }
    }
}

/// Protocol configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ProtocolConfig {
    #[serde(default)]
    pub addressing: Addressing,

    /// Point-to-point only; discovered when absent
    #[serde(default)]
    pub unit_address: Option<u8>,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u8,

    #[serde(default = "default_vip_settle_ms")]
    pub vip_settle_ms: u64,
}

/// Telemetry polling and logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Bus addresses to poll
    #[serde(default = "default_units")]
    pub units: Vec<u8>,
}

/// Diagnostic logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Daily-rolling log files go here when set
    #[serde(default)]
    pub dir: Option<String>,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 921_600 }
fn default_host() -> String { "192.168.1.100".to_string() }
fn default_udp_port() -> u16 { 5000 }
fn default_read_timeout_ms() -> u64 { 1000 }
fn default_write_delay_ms() -> u64 { 100 }

fn default_max_attempts() -> u8 { 3 }
fn default_vip_settle_ms() -> u64 { 7000 }

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_poll_interval_ms() -> u64 { 1000 }
fn default_units() -> Vec<u8> { vec![1] }

fn default_log_level() -> String { "info".to_string() }

const BAUD_RATES: [u32; 3] = [115_200, 460_800, 921_600];
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn invalid(msg: impl std::fmt::Display) -> AfarError {
    AfarError::Config(toml::de::Error::custom(msg))
}

impl LinkConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_delay(&self) -> Duration {
        Duration::from_millis(self.write_delay_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use afar_bench::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn addressing_mode(&self) -> AddressingMode {
        self.protocol.addressing.into()
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        match self.link.kind {
            LinkKind::Serial => {
                if self.link.port.is_empty() {
                    return Err(invalid("serial port cannot be empty"));
                }
                if !BAUD_RATES.contains(&self.link.baud_rate) {
                    return Err(invalid("baud_rate must be one of: 115200, 460800, 921600"));
                }
            }
            LinkKind::Udp => {
                if self.link.host.is_empty() {
                    return Err(invalid("host cannot be empty for a udp link"));
                }
                if self.link.udp_port == 0 {
                    return Err(invalid("udp_port must be greater than 0"));
                }
            }
        }

        if self.link.read_timeout_ms == 0 || self.link.read_timeout_ms > 10000 {
            return Err(invalid("read_timeout_ms must be between 1 and 10000"));
        }

        if self.link.write_delay_ms > 10000 {
            return Err(invalid("write_delay_ms must be between 0 and 10000"));
        }

        if self.protocol.max_attempts == 0 || self.protocol.max_attempts > 10 {
            return Err(invalid("max_attempts must be between 1 and 10"));
        }

        if self.protocol.unit_address.is_some() && self.protocol.addressing == Addressing::Bus {
            return Err(invalid("unit_address only applies to point-to-point links"));
        }

        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.telemetry.poll_interval_ms == 0 || self.telemetry.poll_interval_ms > 60000 {
            return Err(invalid("poll_interval_ms must be between 1 and 60000"));
        }

        if self.protocol.addressing == Addressing::Bus {
            for &unit in &self.telemetry.units {
                if unit == 0 || unit > MAX_BUS_ADDRESS {
                    return Err(invalid(format!(
                        "telemetry unit {} is out of bounds (must be 1-{})",
                        unit, MAX_BUS_ADDRESS
                    )));
                }
            }
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid("logging level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> Config {
        Config {
            link: LinkConfig {
                kind: LinkKind::Serial,
                port: default_serial_port(),
                baud_rate: default_baud_rate(),
                host: default_host(),
                udp_port: default_udp_port(),
                read_timeout_ms: default_read_timeout_ms(),
                write_delay_ms: default_write_delay_ms(),
            },
            protocol: ProtocolConfig {
                addressing: Addressing::Bus,
                unit_address: None,
                max_attempts: default_max_attempts(),
                vip_settle_ms: default_vip_settle_ms(),
            },
            telemetry: TelemetryConfig {
                enabled: default_telemetry_enabled(),
                log_dir: default_log_dir(),
                max_records_per_file: default_max_records_per_file(),
                max_files_to_keep: default_max_files_to_keep(),
                poll_interval_ms: default_poll_interval_ms(),
                units: default_units(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                dir: None,
            },
        }
    }

    #[test]
    fn test_default_config() {
        assert!(create_valid_config().validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[link]
port = "/dev/ttyUSB1"

[protocol]

[telemetry]

[logging]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.link.port, "/dev/ttyUSB1");
        assert_eq!(config.link.baud_rate, 921_600);
        assert_eq!(config.link.read_timeout(), Duration::from_secs(1));
        assert_eq!(config.link.write_delay(), Duration::from_millis(100));
        assert_eq!(config.protocol.max_attempts, 3);
        assert_eq!(config.addressing_mode(), AddressingMode::Bus);
    }

    #[test]
    fn test_parse_point_to_point_udp() {
        let config = Config::parse(
            r#"
[link]
kind = "udp"
host = "10.0.0.5"
udp_port = 4000

[protocol]
addressing = "point-to-point"
unit_address = 17

[telemetry]
enabled = false

[logging]
level = "debug"
"#,
        )
        .unwrap();

        assert_eq!(config.link.kind, LinkKind::Udp);
        assert_eq!(config.link.udp_port, 4000);
        assert_eq!(config.addressing_mode(), AddressingMode::PointToPoint);
        assert_eq!(config.protocol.unit_address, Some(17));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/afar.toml"),
            Err(AfarError::Io(_))
        ));
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            Config::parse("[link\nport = 3"),
            Err(AfarError::Config(_))
        ));
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = create_valid_config();
        config.link.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_port_ignored_for_udp() {
        let mut config = create_valid_config();
        config.link.kind = LinkKind::Udp;
        config.link.port = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_udp_needs_host_and_port() {
        let mut config = create_valid_config();
        config.link.kind = LinkKind::Udp;
        config.link.host = String::new();
        assert!(config.validate().is_err());

        let mut config = create_valid_config();
        config.link.kind = LinkKind::Udp;
        config.link.udp_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = create_valid_config();
        config.link.baud_rate = 420_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_read_timeout_bounds() {
        let mut config = create_valid_config();
        config.link.read_timeout_ms = 0;
        assert!(config.validate().is_err());
        config.link.read_timeout_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_write_delay_zero_allowed() {
        let mut config = create_valid_config();
        config.link.write_delay_ms = 0;
        assert!(config.validate().is_ok());
        config.link.write_delay_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_attempts_bounds() {
        let mut config = create_valid_config();
        config.protocol.max_attempts = 0;
        assert!(config.validate().is_err());
        config.protocol.max_attempts = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unit_address_requires_point_to_point() {
        let mut config = create_valid_config();
        config.protocol.unit_address = Some(3);
        assert!(config.validate().is_err());

        config.protocol.addressing = Addressing::PointToPoint;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_log_dir_when_enabled() {
        let mut config = create_valid_config();
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_err());

        config.telemetry.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_telemetry_limits() {
        let mut config = create_valid_config();
        config.telemetry.max_records_per_file = 0;
        assert!(config.validate().is_err());

        let mut config = create_valid_config();
        config.telemetry.max_files_to_keep = 0;
        assert!(config.validate().is_err());

        let mut config = create_valid_config();
        config.telemetry.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bus_units_out_of_range() {
        let mut config = create_valid_config();
        config.telemetry.units = vec![1, 41];
        assert!(config.validate().is_err());

        config.telemetry.units = vec![0];
        assert!(config.validate().is_err());

        config.telemetry.units = vec![1, 40];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = create_valid_config();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }
}
