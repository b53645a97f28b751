use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::accessory::{Accessory, AccessoryId};
use crate::characteristic::{Characteristic, CharacteristicValue};

/// Last observed value per characteristic of one accessory.
#[derive(Debug, Default, Clone)]
pub struct CharacteristicCache {
    values: HashMap<Characteristic, CharacteristicValue>,
}

impl CharacteristicCache {
    /// Store `value` and report whether it differs from the previous
    /// observation. A characteristic never seen before counts as changed.
    pub fn observe(&mut self, characteristic: Characteristic, value: &CharacteristicValue) -> bool {
        match self.values.get(&characteristic) {
            Some(previous) if previous == value => false,
            _ => {
                self.values.insert(characteristic, value.clone());
                true
            }
        }
    }

    pub fn get(&self, characteristic: Characteristic) -> Option<&CharacteristicValue> {
        self.values.get(&characteristic)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

struct Entry {
    owner: Weak<Accessory>,
    cache: CharacteristicCache,
}

/// Side table of per-accessory caches keyed by accessory id. Entries hold
/// only a weak reference to their accessory, so dropping the accessory
/// leaves a dead entry until the next `prune`.
#[derive(Default)]
pub struct CacheTable {
    entries: Mutex<HashMap<AccessoryId, Entry>>,
}

impl CacheTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the accessory's cache, creating it on first use. A
    /// cache left behind by a dropped accessory with the same id is discarded.
    pub fn with_cache<R>(
        &self,
        accessory: &Arc<Accessory>,
        f: impl FnOnce(&mut CharacteristicCache) -> R,
    ) -> R {
        let mut entries = self.lock();
        let entry = entries.entry(*accessory.id()).or_insert_with(|| Entry {
            owner: Arc::downgrade(accessory),
            cache: CharacteristicCache::default(),
        });
        if !std::ptr::eq(entry.owner.as_ptr(), Arc::as_ptr(accessory)) {
            entry.owner = Arc::downgrade(accessory);
            entry.cache = CharacteristicCache::default();
        }
        f(&mut entry.cache)
    }

    pub fn snapshot(&self, id: &AccessoryId) -> Option<CharacteristicCache> {
        self.lock()
            .get(id)
            .filter(|entry| entry.owner.strong_count() > 0)
            .map(|entry| entry.cache.clone())
    }

    pub fn remove(&self, id: &AccessoryId) {
        self.lock().remove(id);
    }

    /// Drop entries whose accessory no longer exists; returns how many went.
    pub fn prune(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.owner.strong_count() > 0);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<AccessoryId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
