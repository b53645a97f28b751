use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::accessory::AccessoryKind;
use crate::arp::ArpTable;
use crate::logger::MessageLogMode;
use crate::registry::DeviceRecord;
use crate::{Error, Result};

pub const DEFAULT_POLLING_INTERVAL_SECS: u64 = 120;

/// Platform block as the host hands it over (camelCase JSON).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConfig {
    pub local_device: LocalDeviceConfig,
    #[serde(flatten)]
    pub features: FeatureToggles,
    #[serde(default)]
    pub persist_path: Option<PathBuf>,
    #[serde(default)]
    pub message_log_path: Option<PathBuf>,
    #[serde(default)]
    pub message_log_mode: MessageLogMode,
}

impl PlatformConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalDeviceConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub device_sub_id: u32,
    #[serde(default = "default_polling_interval")]
    pub local_polling_interval: u64,
}

fn default_polling_interval() -> u64 {
    DEFAULT_POLLING_INTERVAL_SECS
}

impl LocalDeviceConfig {
    /// Zero disables polling.
    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.local_polling_interval)
    }

    pub fn validate(&self) -> Result<DeviceRecord> {
        self.validate_with(ArpTable::load)
    }

    /// Validate and build the device record. `load_arp` is only consulted
    /// when no device id is configured.
    pub fn validate_with(&self, load_arp: impl FnOnce() -> Result<ArpTable>) -> Result<DeviceRecord> {
        let label = self.name.clone().unwrap_or_else(|| "Airstage".to_string());
        let address = self.ip_address.trim();
        if address.is_empty() {
            return Err(Error::MissingAddress { name: label });
        }
        let ip = parse_address(address)?;

        let device_id = match self.device_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let id = detect_device_id(ip, load_arp)?;
                info!(address, device_id = %id, "detected device id from ARP table");
                id
            }
        };

        DeviceRecord::new(&device_id, address, self.device_sub_id, self.name.clone())
    }
}

/// IPv4 address with an optional port; the host part is returned.
pub fn parse_address(address: &str) -> Result<Ipv4Addr> {
    let parsed = if address.contains(':') {
        address.parse::<SocketAddrV4>().map(|sa| *sa.ip())
    } else {
        address.parse::<Ipv4Addr>()
    };
    parsed.map_err(|_| Error::InvalidAddress(address.to_string()))
}

fn detect_device_id(ip: Ipv4Addr, load_arp: impl FnOnce() -> Result<ArpTable>) -> Result<String> {
    let table = load_arp().map_err(|e| Error::DeviceIdDetection {
        address: ip.to_string(),
        reason: format!("ARP lookup failed: {e}"),
    })?;
    table
        .lookup(ip)
        .map(str::to_string)
        .ok_or_else(|| Error::DeviceIdDetection {
            address: ip.to_string(),
            reason: format!("no MAC address in ARP table; try `ping {ip}` first or set deviceId"),
        })
}

/// Which accessories to expose per device. Only the thermostat is on by default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeatureToggles {
    pub enable_thermostat: bool,
    pub enable_fan: bool,
    pub enable_vertical_airflow_direction: bool,
    pub enable_auto_fan_speed_switch: bool,
    pub enable_dry_mode_switch: bool,
    pub enable_economy_switch: bool,
    pub enable_energy_saving_fan_switch: bool,
    pub enable_fan_mode_switch: bool,
    pub enable_minimum_heat_mode_switch: bool,
    pub enable_powerful_switch: bool,
    pub enable_outdoor_temperature_sensor: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            enable_thermostat: true,
            enable_fan: false,
            enable_vertical_airflow_direction: false,
            enable_auto_fan_speed_switch: false,
            enable_dry_mode_switch: false,
            enable_economy_switch: false,
            enable_energy_saving_fan_switch: false,
            enable_fan_mode_switch: false,
            enable_minimum_heat_mode_switch: false,
            enable_powerful_switch: false,
            enable_outdoor_temperature_sensor: false,
        }
    }
}

impl FeatureToggles {
    pub fn is_enabled(&self, kind: AccessoryKind) -> bool {
        match kind {
            AccessoryKind::Thermostat => self.enable_thermostat,
            AccessoryKind::Fan => self.enable_fan,
            AccessoryKind::VerticalAirflowDirection => self.enable_vertical_airflow_direction,
            AccessoryKind::AutoFanSpeedSwitch => self.enable_auto_fan_speed_switch,
            AccessoryKind::DryModeSwitch => self.enable_dry_mode_switch,
            AccessoryKind::EconomySwitch => self.enable_economy_switch,
            AccessoryKind::EnergySavingFanSwitch => self.enable_energy_saving_fan_switch,
            AccessoryKind::FanModeSwitch => self.enable_fan_mode_switch,
            AccessoryKind::MinimumHeatModeSwitch => self.enable_minimum_heat_mode_switch,
            AccessoryKind::PowerfulSwitch => self.enable_powerful_switch,
            AccessoryKind::OutdoorTemperatureSensor => self.enable_outdoor_temperature_sensor,
        }
    }

    pub fn all_enabled() -> Self {
        Self {
            enable_thermostat: true,
            enable_fan: true,
            enable_vertical_airflow_direction: true,
            enable_auto_fan_speed_switch: true,
            enable_dry_mode_switch: true,
            enable_economy_switch: true,
            enable_energy_saving_fan_switch: true,
            enable_fan_mode_switch: true,
            enable_minimum_heat_mode_switch: true,
            enable_powerful_switch: true,
            enable_outdoor_temperature_sensor: true,
        }
    }
}

/// Log a configuration failure with a hint for the operator.
pub fn log_config_error(err: &Error) {
    let hint = match err {
        Error::InvalidAddress(_) | Error::MissingAddress { .. } => {
            "set localDevice.ipAddress to the unit's IPv4 address, e.g. 192.168.1.100"
        }
        Error::InvalidDeviceId(_) => "deviceId is the unit's MAC address, e.g. A0B1C2D3E4F5",
        Error::DeviceIdDetection { .. } => {
            "make sure the unit is powered on and reachable, or set deviceId explicitly"
        }
        _ => "check the platform configuration",
    };
    warn!("device excluded: {err} ({hint})");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_arp() -> Result<ArpTable> {
        panic!("ARP table should not be consulted")
    }

    #[test]
    fn parses_camel_case_with_defaults() {
        let config = PlatformConfig::from_json(
            r#"{"localDevice": {"name": "Bedroom", "ipAddress": "192.168.1.100"}, "enableFan": true}"#,
        )
        .unwrap();
        assert_eq!(config.local_device.local_polling_interval, 120);
        assert_eq!(config.local_device.device_sub_id, 0);
        assert!(config.features.enable_thermostat);
        assert!(config.features.enable_fan);
        assert!(!config.features.enable_powerful_switch);
        assert_eq!(config.message_log_mode, MessageLogMode::Full);
    }

    #[test]
    fn explicit_device_id_is_normalized() {
        let device = LocalDeviceConfig {
            name: Some("Bedroom".into()),
            ip_address: "192.168.1.100".into(),
            device_id: Some("a0:b1:c2:d3:e4:f5".into()),
            device_sub_id: 0,
            local_polling_interval: 0,
        };
        let record = device.validate_with(no_arp).unwrap();
        assert_eq!(record.id.as_str(), "A0B1C2D3E4F5");
        assert_eq!(record.name, "Bedroom");
        assert_eq!(device.polling_interval(), Duration::ZERO);
    }

    #[test]
    fn missing_id_comes_from_arp() {
        let device = LocalDeviceConfig {
            name: None,
            ip_address: "192.168.1.100".into(),
            device_id: None,
            device_sub_id: 0,
            local_polling_interval: 120,
        };
        let record = device
            .validate_with(|| {
                Ok(ArpTable::parse(
                    "IP address HW type Flags HW address Mask Device\n\
                     192.168.1.100 0x1 0x2 a0:b1:c2:d3:e4:f5 * eth0\n",
                ))
            })
            .unwrap();
        assert_eq!(record.id.as_str(), "A0B1C2D3E4F5");
    }

    #[test]
    fn arp_miss_is_detection_error() {
        let device = LocalDeviceConfig {
            name: None,
            ip_address: "192.168.1.200".into(),
            device_id: None,
            device_sub_id: 0,
            local_polling_interval: 120,
        };
        let err = device.validate_with(|| Ok(ArpTable::default())).unwrap_err();
        assert!(matches!(err, Error::DeviceIdDetection { .. }));
    }

    #[test]
    fn bad_addresses_rejected() {
        assert!(parse_address("192.168.1.100").is_ok());
        assert!(parse_address("127.0.0.1:8080").is_ok());
        assert!(matches!(parse_address("living-room"), Err(Error::InvalidAddress(_))));
        assert!(parse_address("192.168.1.300").is_err());

        let device = LocalDeviceConfig {
            name: Some("Den".into()),
            ip_address: "  ".into(),
            device_id: Some("A0B1C2D3E4F5".into()),
            device_sub_id: 0,
            local_polling_interval: 120,
        };
        assert!(matches!(device.validate_with(no_arp), Err(Error::MissingAddress { .. })));
    }

    #[test]
    fn feature_toggles_map_kinds() {
        let features = FeatureToggles::default();
        assert!(features.is_enabled(AccessoryKind::Thermostat));
        assert!(!features.is_enabled(AccessoryKind::OutdoorTemperatureSensor));
        let all = FeatureToggles::all_enabled();
        assert!(AccessoryKind::ALL.iter().all(|k| all.is_enabled(*k)));
    }
}
