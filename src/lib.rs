mod accessory;
mod arp;
mod cache;
mod characteristic;
mod client;
pub mod codec;
mod config;
mod error;
mod host;
mod logger;
mod manager;
mod poller;
pub mod protocol;
mod registry;
mod scheduler;
mod store;
mod sync;
mod transport;
mod types;

pub use accessory::{Accessory, AccessoryId, AccessoryKind, MANUFACTURER};
pub use arp::ArpTable;
pub use cache::{CacheTable, CharacteristicCache};
pub use characteristic::*;
pub use client::{DeviceClient, DeviceClientBuilder};
pub use config::{FeatureToggles, LocalDeviceConfig, PlatformConfig, log_config_error};
pub use error::{Error, Result};
pub use host::{AccessoryHost, LogHost};
pub use logger::MessageLogMode;
pub use manager::AccessoryManager;
pub use poller::spawn_poller;
pub use registry::{DeviceId, DeviceRecord, DeviceRegistry, normalize_device_id};
pub use scheduler::RequestScheduler;
pub use store::ScaleStore;
pub use sync::{RefreshSummary, SyncEngine};
pub use transport::HttpTransport;
pub use types::*;
