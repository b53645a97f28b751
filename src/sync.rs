use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, error};

use crate::accessory::Accessory;
use crate::cache::CacheTable;
use crate::characteristic::{Characteristic, CharacteristicValue};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub notified: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl std::ops::AddAssign for RefreshSummary {
    fn add_assign(&mut self, other: Self) {
        self.notified += other.notified;
        self.unchanged += other.unchanged;
        self.failed += other.failed;
    }
}

/// Pulls characteristic values from an accessory and pushes the changed
/// ones to the host.
#[derive(Default)]
pub struct SyncEngine {
    caches: CacheTable,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn caches(&self) -> &CacheTable {
        &self.caches
    }

    /// Read every characteristic in `characteristics` and notify the host.
    ///
    /// With `only_notify_on_change` the host only hears about values that
    /// differ from the cached ones (a first observation always differs);
    /// without it every successful read is pushed. The cache is updated
    /// either way. A failed read is logged and skipped.
    pub async fn refresh(
        &self,
        accessory: &Arc<Accessory>,
        characteristics: &[Characteristic],
        only_notify_on_change: bool,
    ) -> RefreshSummary {
        let reads = characteristics.iter().map(|&c| async move { (c, accessory.get(c).await) });
        let results = join_all(reads).await;

        let mut summary = RefreshSummary::default();
        for (characteristic, result) in results {
            match result {
                Ok(value) => {
                    if self.apply(accessory, characteristic, &value, only_notify_on_change) {
                        summary.notified += 1;
                    } else {
                        summary.unchanged += 1;
                    }
                }
                Err(e) => {
                    error!(accessory = accessory.name(), %characteristic, "refresh failed: {e}");
                    summary.failed += 1;
                }
            }
        }
        debug!(
            accessory = accessory.name(),
            notified = summary.notified,
            unchanged = summary.unchanged,
            failed = summary.failed,
            "refresh complete"
        );
        summary
    }

    /// Record a value obtained outside a refresh (an accepted set, say) and
    /// push it to the host unconditionally.
    pub fn publish(&self, accessory: &Arc<Accessory>, characteristic: Characteristic, value: &CharacteristicValue) {
        self.apply(accessory, characteristic, value, false);
    }

    fn apply(
        &self,
        accessory: &Arc<Accessory>,
        characteristic: Characteristic,
        value: &CharacteristicValue,
        only_notify_on_change: bool,
    ) -> bool {
        let changed = self
            .caches
            .with_cache(accessory, |cache| cache.observe(characteristic, value));
        let notify = changed || !only_notify_on_change;
        if notify {
            accessory.host().push_update(accessory.id(), characteristic, value);
        } else {
            debug!(accessory = accessory.name(), %characteristic, "unchanged, not notifying");
        }
        notify
    }
}
