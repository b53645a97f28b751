use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::manager::AccessoryManager;
use crate::registry::DeviceId;

/// Refresh a device's accessories every `interval`, notifying only on
/// change. A cycle finishes before the next tick is taken and late ticks are
/// skipped, so refreshes never overlap. Returns `None` for a zero interval.
pub fn spawn_poller(
    manager: Arc<AccessoryManager>,
    device: DeviceId,
    interval: Duration,
) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        info!(%device, "polling disabled");
        return None;
    }

    info!(%device, secs = interval.as_secs(), "starting poller");
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; startup already refreshed.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match manager.refresh_device(device.as_str(), true).await {
                Ok(summary) => debug!(
                    %device,
                    notified = summary.notified,
                    failed = summary.failed,
                    "poll complete"
                ),
                Err(e) => warn!(%device, "poll failed: {e}"),
            }
        }
    }))
}
