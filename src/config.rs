//! TOML configuration.
//!
//! ```toml
//! [[sensor]]
//! name = "phone"
//! transport = { kind = "udp", port = 5700 }
//!
//! [[sensor]]
//! name = "m5stack"
//! transport = { kind = "serial", path = "/dev/ttyUSB0", baud_rate = 115200 }
//!
//! [[sensor]]
//! transport = { kind = "wiimote", address = "18:2A:7B:F4:BC:65" }
//! ```

use crate::error::Result;
use crate::reconnect::ReconnectPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default, rename = "sensor")]
    pub sensors: Vec<SensorConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Label used in logs; defaults to the transport description.
    #[serde(default)]
    pub name: Option<String>,
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    Udp {
        port: u16,
        #[serde(default = "default_bind")]
        bind: IpAddr,
    },
    Serial {
        path: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
        #[serde(default = "default_read_timeout_ms")]
        read_timeout_ms: u64,
        #[serde(default)]
        reconnect: ReconnectPolicy,
    },
    Wiimote {
        #[serde(default)]
        address: Option<String>,
        #[serde(default = "default_poll_interval_ms")]
        poll_interval_ms: u64,
    },
}

impl TransportConfig {
    pub fn udp(port: u16) -> Self {
        TransportConfig::Udp {
            port,
            bind: default_bind(),
        }
    }

    pub fn serial(path: impl Into<String>) -> Self {
        TransportConfig::Serial {
            path: path.into(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_baud_rate() -> u32 {
    crate::backends::serial::DEFAULT_BAUD_RATE
}

fn default_read_timeout_ms() -> u64 {
    crate::backends::serial::DEFAULT_READ_TIMEOUT.as_millis() as u64
}

fn default_poll_interval_ms() -> u64 {
    crate::backends::polled::DEFAULT_POLL_INTERVAL.as_millis() as u64
}

impl HubConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn parses_all_transport_kinds_with_defaults() {
        let config = HubConfig::from_toml_str(
            r#"
            [[sensor]]
            name = "phone"
            transport = { kind = "udp", port = 5700 }

            [[sensor]]
            transport = { kind = "serial", path = "/dev/ttyUSB0" }

            [[sensor]]
            name = "remote"
            transport = { kind = "wiimote", address = "18:2A:7B:F4:BC:65" }
            "#,
        )
        .unwrap();

        assert_eq!(
            config.sensors,
            vec![
                SensorConfig {
                    name: Some("phone".into()),
                    transport: TransportConfig::udp(5700),
                },
                SensorConfig {
                    name: None,
                    transport: TransportConfig::serial("/dev/ttyUSB0"),
                },
                SensorConfig {
                    name: Some("remote".into()),
                    transport: TransportConfig::Wiimote {
                        address: Some("18:2A:7B:F4:BC:65".into()),
                        poll_interval_ms: 1,
                    },
                },
            ]
        );
    }

    #[test]
    fn serial_overrides() {
        let config = HubConfig::from_toml_str(
            r#"
            [[sensor]]
            [sensor.transport]
            kind = "serial"
            path = "COM3"
            baud_rate = 9600
            read_timeout_ms = 20
            reconnect = { initial_delay_ms = 10, max_attempts = 5 }
            "#,
        )
        .unwrap();

        let TransportConfig::Serial {
            baud_rate,
            read_timeout_ms,
            reconnect,
            ..
        } = &config.sensors[0].transport
        else {
            panic!("expected serial transport");
        };
        assert_eq!(*baud_rate, 9600);
        assert_eq!(*read_timeout_ms, 20);
        assert_eq!(reconnect.initial_delay_ms, 10);
        assert_eq!(reconnect.max_delay_ms, 5_000);
        assert_eq!(reconnect.max_attempts, Some(5));
    }

    #[test]
    fn udp_bind_address() {
        let config = HubConfig::from_toml_str(
            r#"
            [[sensor]]
            transport = { kind = "udp", port = 5701, bind = "127.0.0.1" }
            "#,
        )
        .unwrap();
        assert_eq!(
            config.sensors[0].transport,
            TransportConfig::Udp {
                port: 5701,
                bind: "127.0.0.1".parse().unwrap(),
            }
        );
    }

    #[test]
    fn empty_config_has_no_sensors() {
        assert_eq!(HubConfig::from_toml_str("").unwrap(), HubConfig::default());
    }

    #[test]
    fn unknown_transport_is_a_config_error() {
        let err = HubConfig::from_toml_str(
            r#"
            [[sensor]]
            transport = { kind = "bluetooth" }
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[[sensor]]\ntransport = {{ kind = \"udp\", port = 6000 }}").unwrap();

        let config = HubConfig::load(file.path()).unwrap();
        assert_eq!(config.sensors[0].transport, TransportConfig::udp(6000));
    }
}
