use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::accessory::{Accessory, AccessoryId, AccessoryKind};
use crate::characteristic::{Characteristic, CharacteristicValue};
use crate::client::DeviceClient;
use crate::config::FeatureToggles;
use crate::host::AccessoryHost;
use crate::registry::DeviceId;
use crate::sync::{RefreshSummary, SyncEngine};
use crate::{Error, Result};

/// Owns the accessories of every configured device and routes host get/set
/// calls and refreshes to them.
pub struct AccessoryManager {
    client: Arc<DeviceClient>,
    host: Arc<dyn AccessoryHost>,
    sync: SyncEngine,
    accessories: Mutex<HashMap<DeviceId, Vec<Arc<Accessory>>>>,
}

impl AccessoryManager {
    pub fn new(client: Arc<DeviceClient>, host: Arc<dyn AccessoryHost>) -> Self {
        Self {
            client,
            host,
            sync: SyncEngine::new(),
            accessories: Mutex::new(HashMap::new()),
        }
    }

    pub fn client(&self) -> &Arc<DeviceClient> {
        &self.client
    }

    pub fn sync_engine(&self) -> &SyncEngine {
        &self.sync
    }

    /// Register the enabled accessories of one device with the host and
    /// unregister the disabled ones. The model is read best-effort.
    pub async fn configure_device(
        &self,
        device_id: &str,
        features: &FeatureToggles,
    ) -> Result<Vec<Arc<Accessory>>> {
        let device = self.client.device(device_id)?.clone();
        let model = match self.client.model(device_id).await {
            Ok(model) => model,
            Err(e) => {
                warn!(device = %device.id, "could not read model: {e}");
                None
            }
        };

        let mut enabled = Vec::new();
        for kind in AccessoryKind::ALL {
            if features.is_enabled(kind) {
                let accessory = Arc::new(Accessory::new(
                    kind,
                    &device,
                    model.clone(),
                    self.client.clone(),
                    self.host.clone(),
                ));
                info!(device = %device.id, accessory = accessory.name(), "adding accessory");
                self.host.register_accessory(&accessory);
                enabled.push(accessory);
            } else {
                let id = AccessoryId::new(&device.id, kind);
                self.host.unregister_accessory(&id, &kind.display_name(&device.name));
                self.sync.caches().remove(&id);
            }
        }

        self.lock().insert(device.id.clone(), enabled.clone());
        self.sync.caches().prune();
        Ok(enabled)
    }

    pub fn accessories(&self, device_id: &DeviceId) -> Vec<Arc<Accessory>> {
        self.lock().get(device_id).cloned().unwrap_or_default()
    }

    pub fn accessory(&self, id: &AccessoryId) -> Option<Arc<Accessory>> {
        self.lock()
            .values()
            .flatten()
            .find(|a| a.id() == id)
            .cloned()
    }

    /// Drop every accessory of a device and unregister them from the host.
    pub fn remove_device(&self, device_id: &DeviceId) {
        let removed = self.lock().remove(device_id).unwrap_or_default();
        for accessory in removed {
            self.host.unregister_accessory(accessory.id(), accessory.name());
            self.sync.caches().remove(accessory.id());
        }
    }

    /// Refresh the dynamic characteristics of every accessory of a device,
    /// first pruning caches whose accessory is gone.
    pub async fn refresh_device(&self, device_id: &str, only_notify_on_change: bool) -> Result<RefreshSummary> {
        let device = self.client.device(device_id)?.id.clone();
        let pruned = self.sync.caches().prune();
        if pruned > 0 {
            debug!(%device, pruned, "dropped caches of removed accessories");
        }
        let mut summary = RefreshSummary::default();
        for accessory in self.accessories(&device) {
            summary += self
                .sync
                .refresh(&accessory, accessory.dynamic_characteristics(), only_notify_on_change)
                .await;
        }
        Ok(summary)
    }

    pub async fn handle_get(&self, id: &AccessoryId, characteristic: Characteristic) -> Result<CharacteristicValue> {
        self.find(id)?.get(characteristic).await
    }

    /// Apply a host write. An accepted target temperature is published right
    /// away; every accepted write is followed by a full refresh of the device.
    pub async fn handle_set(
        &self,
        id: &AccessoryId,
        characteristic: Characteristic,
        value: CharacteristicValue,
    ) -> Result<CharacteristicValue> {
        let accessory = self.find(id)?;
        let accepted = accessory.set(characteristic, value).await?;

        if characteristic == Characteristic::TargetTemperature {
            self.sync.publish(&accessory, characteristic, &accepted);
        }
        self.refresh_device(accessory.device().as_str(), false).await?;
        Ok(accepted)
    }

    fn find(&self, id: &AccessoryId) -> Result<Arc<Accessory>> {
        self.accessory(id)
            .ok_or_else(|| Error::DeviceNotFound(format!("accessory {id}")))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<DeviceId, Vec<Arc<Accessory>>>> {
        self.accessories.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
