use tracing::info;

use crate::accessory::{Accessory, AccessoryId};
use crate::characteristic::{Characteristic, CharacteristicValue};

/// The narrow slice of the home-automation framework this crate drives.
/// Implementations must not block; they are called from async tasks.
pub trait AccessoryHost: Send + Sync {
    fn register_accessory(&self, accessory: &Accessory);

    fn unregister_accessory(&self, id: &AccessoryId, name: &str);

    /// Unsolicited value update for one characteristic.
    fn push_update(&self, id: &AccessoryId, characteristic: Characteristic, value: &CharacteristicValue);
}

/// Host that only logs. Used by the bridge binary when no framework is attached.
#[derive(Debug, Default)]
pub struct LogHost;

impl AccessoryHost for LogHost {
    fn register_accessory(&self, accessory: &Accessory) {
        info!(id = %accessory.id(), kind = %accessory.kind(), "registered accessory {}", accessory.name());
    }

    fn unregister_accessory(&self, id: &AccessoryId, name: &str) {
        info!(%id, "accessory {name} disabled in config, removed");
    }

    fn push_update(&self, id: &AccessoryId, characteristic: Characteristic, value: &CharacteristicValue) {
        info!(%id, %characteristic, %value, "update");
    }
}
