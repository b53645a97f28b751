use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use crate::Result;
use crate::registry::DeviceId;
use crate::types::TemperatureScale;

pub const SCALES_FILE: &str = "airstage-temperature-scales.json";

/// Temperature display preference per device id, optionally backed by
/// `airstage-temperature-scales.json` in the persist directory.
#[derive(Debug, Default)]
pub struct ScaleStore {
    path: Option<PathBuf>,
    scales: Mutex<BTreeMap<String, TemperatureScale>>,
}

impl ScaleStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A missing file starts empty. An unreadable one is logged and ignored so
    /// a corrupt preference never blocks startup.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(SCALES_FILE);
        let scales = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(scales) => scales,
                Err(e) => {
                    warn!(path = %path.display(), "ignoring unreadable temperature scales: {e}");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), entries = scales.len(), "loaded temperature scales");
        Ok(Self {
            path: Some(path),
            scales: Mutex::new(scales),
        })
    }

    pub fn get(&self, device: &DeviceId) -> Option<TemperatureScale> {
        self.lock().get(device.as_str()).copied()
    }

    pub fn set_all<'a>(
        &self,
        devices: impl IntoIterator<Item = &'a DeviceId>,
        scale: TemperatureScale,
    ) -> Result<()> {
        let contents = {
            let mut scales = self.lock();
            for device in devices {
                scales.insert(device.to_string(), scale);
            }
            match &self.path {
                Some(_) => Some(serde_json::to_string_pretty(&*scales)?),
                None => None,
            }
        };
        if let (Some(path), Some(contents)) = (&self.path, contents) {
            std::fs::write(path, contents)?;
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, TemperatureScale>> {
        self.scales.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
