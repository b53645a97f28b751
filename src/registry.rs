use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

const DEVICE_ID_LEN: usize = 12;

/// Device identifier in canonical form: 12 uppercase hex digits, no colons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    /// Accepts `a0:b1:c2:d3:e4:f5`, `A0B1C2D3E4F5` or any casing of either.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = normalize_device_id(raw);
        if normalized.len() == DEVICE_ID_LEN && normalized.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(normalized))
        } else {
            Err(Error::InvalidDeviceId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

pub fn normalize_device_id(raw: &str) -> String {
    raw.trim().replace(':', "").to_ascii_uppercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub address: String,
    pub sub_id: u32,
    pub name: String,
}

impl DeviceRecord {
    /// Validate the raw identifier. The name defaults to the canonical id.
    pub fn new(
        id: &str,
        address: impl Into<String>,
        sub_id: u32,
        name: Option<String>,
    ) -> Result<Self> {
        let id = DeviceId::parse(id)?;
        let address = address.into();
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| id.to_string());
        if address.trim().is_empty() {
            return Err(Error::MissingAddress { name });
        }
        Ok(Self {
            id,
            address,
            sub_id,
            name,
        })
    }
}

/// Devices known to this process. Filled once at startup, read-only afterwards.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<DeviceRecord>,
    index: HashMap<DeviceId, usize>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = DeviceRecord>) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(records)?;
        Ok(registry)
    }

    /// All or nothing: a duplicate anywhere in `records` leaves the registry
    /// unchanged.
    pub fn register(&mut self, records: impl IntoIterator<Item = DeviceRecord>) -> Result<()> {
        let records: Vec<DeviceRecord> = records.into_iter().collect();
        let mut seen = HashSet::new();
        for record in &records {
            if self.index.contains_key(&record.id) || !seen.insert(&record.id) {
                return Err(Error::DuplicateDevice(record.id.to_string()));
            }
        }
        for record in records {
            self.index.insert(record.id.clone(), self.devices.len());
            self.devices.push(record);
        }
        Ok(())
    }

    /// Case- and colon-insensitive lookup.
    pub fn lookup(&self, id: &str) -> Result<&DeviceRecord> {
        DeviceId::parse(id)
            .ok()
            .and_then(|id| self.index.get(&id))
            .map(|&idx| &self.devices[idx])
            .ok_or_else(|| Error::DeviceNotFound(id.to_string()))
    }

    pub fn get(&self, id: &DeviceId) -> Result<&DeviceRecord> {
        self.index
            .get(id)
            .map(|&idx| &self.devices[idx])
            .ok_or_else(|| Error::DeviceNotFound(id.to_string()))
    }

    /// Devices in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.iter()
    }

    pub fn first(&self) -> Option<&DeviceRecord> {
        self.devices.first()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> DeviceRecord {
        DeviceRecord::new(id, "192.168.1.100", 0, Some("Test Device".into())).unwrap()
    }

    #[test]
    fn mac_style_id_is_canonicalized() {
        let id = DeviceId::parse("a0:b1:c2:d3:e4:f5").unwrap();
        assert_eq!(id.as_str(), "A0B1C2D3E4F5");
    }

    #[test]
    fn malformed_ids_rejected() {
        assert!(matches!(DeviceId::parse("A0B1C2"), Err(Error::InvalidDeviceId(_))));
        assert!(DeviceId::parse("G0B1C2D3E4F5").is_err());
        assert!(DeviceId::parse("").is_err());
    }

    #[test]
    fn lookup_ignores_case_and_colons() {
        let registry = DeviceRegistry::from_records([record("a0b1c2d3e4f5")]).unwrap();
        for query in ["A0B1C2D3E4F5", "a0b1c2d3e4f5", "a0:b1:c2:d3:e4:f5", "A0:B1:C2:D3:E4:F5"] {
            let found = registry.lookup(query).unwrap();
            assert_eq!(found.id.as_str(), "A0B1C2D3E4F5");
            assert_eq!(found.name, "Test Device");
        }
    }

    #[test]
    fn unknown_device_not_found() {
        let registry = DeviceRegistry::from_records([record("A0B1C2D3E4F5")]).unwrap();
        assert!(matches!(registry.lookup("UNKNOWN"), Err(Error::DeviceNotFound(_))));
        assert!(matches!(registry.lookup("FFFFFFFFFFFF"), Err(Error::DeviceNotFound(_))));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let err = DeviceRegistry::from_records([record("A0B1C2D3E4F5"), record("a0:b1:c2:d3:e4:f5")])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateDevice(_)));
    }

    #[test]
    fn rejected_batch_registers_nothing() {
        let mut registry = DeviceRegistry::from_records([record("A0B1C2D3E4F5")]).unwrap();
        let err = registry
            .register([record("0A1B2C3D4E5F"), record("112233445566"), record("0a:1b:2c:3d:4e:5f")])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateDevice(_)));
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("0A1B2C3D4E5F").is_err());

        let err = registry
            .register([record("112233445566"), record("a0b1c2d3e4f5")])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateDevice(_)));
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("112233445566").is_err());
    }

    #[test]
    fn name_defaults_to_id() {
        let rec = DeviceRecord::new("a0b1c2d3e4f5", "10.0.0.2", 0, None).unwrap();
        assert_eq!(rec.name, "A0B1C2D3E4F5");
    }

    #[test]
    fn empty_address_rejected() {
        let err = DeviceRecord::new("a0b1c2d3e4f5", " ", 0, None).unwrap_err();
        assert!(matches!(err, Error::MissingAddress { .. }));
    }
}
