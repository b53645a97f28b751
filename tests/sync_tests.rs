use std::sync::{Arc, Mutex};
use std::time::Duration;

use airstage_local::{
    Accessory, AccessoryHost, AccessoryId, AccessoryKind, AccessoryManager, Characteristic,
    CharacteristicValue, DeviceClient, DeviceId, DeviceRecord, DeviceRegistry, Error,
    FeatureToggles, SyncEngine, spawn_poller,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEVICE: &str = "A0B1C2D3E4F5";

type Update = (AccessoryId, Characteristic, CharacteristicValue);

#[derive(Default)]
struct RecordingHost {
    registered: Mutex<Vec<String>>,
    unregistered: Mutex<Vec<String>>,
    updates: Mutex<Vec<Update>>,
}

impl RecordingHost {
    fn updates_for(&self, characteristic: Characteristic) -> Vec<CharacteristicValue> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c, _)| *c == characteristic)
            .map(|(_, _, v)| v.clone())
            .collect()
    }
}

impl AccessoryHost for RecordingHost {
    fn register_accessory(&self, accessory: &Accessory) {
        self.registered.lock().unwrap().push(accessory.name().to_string());
    }

    fn unregister_accessory(&self, _id: &AccessoryId, name: &str) {
        self.unregistered.lock().unwrap().push(name.to_string());
    }

    fn push_update(&self, id: &AccessoryId, characteristic: Characteristic, value: &CharacteristicValue) {
        self.updates
            .lock()
            .unwrap()
            .push((*id, characteristic, value.clone()));
    }
}

fn record(address: String) -> DeviceRecord {
    DeviceRecord::new(DEVICE, address, 0, Some("Den".into())).unwrap()
}

fn server_address(server: &MockServer) -> String {
    let addr = server.address();
    format!("{}:{}", addr.ip(), addr.port())
}

fn client_at(address: String, timeout: Duration) -> Arc<DeviceClient> {
    Arc::new(
        DeviceClient::builder(DeviceRegistry::from_records([record(address)]).unwrap())
            .min_delay(Duration::from_millis(1))
            .timeout(timeout)
            .build()
            .unwrap(),
    )
}

fn only(kind: AccessoryKind) -> FeatureToggles {
    let mut features = FeatureToggles::default();
    features.enable_thermostat = kind == AccessoryKind::Thermostat;
    match kind {
        AccessoryKind::Fan => features.enable_fan = true,
        AccessoryKind::EconomySwitch => features.enable_economy_switch = true,
        AccessoryKind::OutdoorTemperatureSensor => features.enable_outdoor_temperature_sensor = true,
        _ => {}
    }
    features
}

fn ok_values(values: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"result": "OK", "value": values}))
}

async fn mount_get(server: &MockServer, parameter: &str, raw: &str) {
    Mock::given(method("POST"))
        .and(path("/GetParam"))
        .and(body_partial_json(json!({"list": [parameter]})))
        .respond_with(ok_values(json!({ parameter: raw })))
        .mount(server)
        .await;
}

async fn manager_with(
    client: Arc<DeviceClient>,
    host: &Arc<RecordingHost>,
    features: &FeatureToggles,
) -> (Arc<AccessoryManager>, Arc<Accessory>) {
    let manager = Arc::new(AccessoryManager::new(client, host.clone()));
    let accessories = manager.configure_device(DEVICE, features).await.unwrap();
    let first = accessories.first().cloned().unwrap();
    (manager, first)
}

#[tokio::test]
async fn unchanged_value_notifies_once() {
    let server = MockServer::start().await;
    mount_get(&server, "iu_economy", "1").await;
    let host = Arc::new(RecordingHost::default());
    let client = client_at(server_address(&server), Duration::from_secs(2));
    let (manager, _) = manager_with(client, &host, &only(AccessoryKind::EconomySwitch)).await;

    let first = manager.refresh_device(DEVICE, true).await.unwrap();
    let second = manager.refresh_device(DEVICE, true).await.unwrap();

    assert_eq!(first.notified, 1);
    assert_eq!(second.notified, 0);
    assert_eq!(second.unchanged, 1);
    assert_eq!(host.updates_for(Characteristic::On), vec![CharacteristicValue::Bool(true)]);
}

#[tokio::test]
async fn changed_value_notifies_again() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/GetParam"))
        .and(body_partial_json(json!({"list": ["iu_economy"]})))
        .respond_with(ok_values(json!({"iu_economy": "1"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_get(&server, "iu_economy", "0").await;

    let host = Arc::new(RecordingHost::default());
    let client = client_at(server_address(&server), Duration::from_secs(2));
    let (manager, _) = manager_with(client, &host, &only(AccessoryKind::EconomySwitch)).await;

    manager.refresh_device(DEVICE, true).await.unwrap();
    manager.refresh_device(DEVICE, true).await.unwrap();
    manager.refresh_device(DEVICE, true).await.unwrap();

    assert_eq!(
        host.updates_for(Characteristic::On),
        vec![CharacteristicValue::Bool(true), CharacteristicValue::Bool(false)]
    );
}

#[tokio::test]
async fn disabled_change_detection_always_notifies() {
    let server = MockServer::start().await;
    mount_get(&server, "iu_economy", "1").await;
    let host = Arc::new(RecordingHost::default());
    let client = client_at(server_address(&server), Duration::from_secs(2));
    let (manager, _) = manager_with(client, &host, &only(AccessoryKind::EconomySwitch)).await;

    for _ in 0..3 {
        manager.refresh_device(DEVICE, false).await.unwrap();
    }
    assert_eq!(host.updates_for(Characteristic::On).len(), 3);
}

#[tokio::test]
async fn unreachable_device_raises_fault() {
    let host = Arc::new(RecordingHost::default());
    let client = client_at("127.0.0.1:1".to_string(), Duration::from_millis(500));
    let (manager, accessory) = manager_with(client, &host, &only(AccessoryKind::EconomySwitch)).await;

    let summary = manager.refresh_device(DEVICE, true).await.unwrap();

    assert_eq!(summary.failed, 1);
    assert!(accessory.has_fault());
    assert_eq!(
        host.updates_for(Characteristic::StatusFault),
        vec![CharacteristicValue::Int(1)]
    );
    assert!(host.updates_for(Characteristic::On).is_empty());
}

#[tokio::test]
async fn device_rejection_does_not_raise_fault() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/GetParam"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "NG", "error": "0001"})))
        .mount(&server)
        .await;

    let host = Arc::new(RecordingHost::default());
    let client = client_at(server_address(&server), Duration::from_secs(2));
    let (manager, accessory) = manager_with(client, &host, &only(AccessoryKind::EconomySwitch)).await;

    let summary = manager.refresh_device(DEVICE, true).await.unwrap();
    assert_eq!(summary.failed, 1);
    assert!(!accessory.has_fault());
    assert!(host.updates_for(Characteristic::StatusFault).is_empty());
}

#[tokio::test]
async fn fault_clears_when_device_answers_again() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/GetParam"))
        .and(body_partial_json(json!({"list": ["iu_economy"]})))
        .respond_with(ok_values(json!({"iu_economy": "1"})).set_delay(Duration::from_millis(400)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_get(&server, "iu_economy", "1").await;

    let host = Arc::new(RecordingHost::default());
    let client = client_at(server_address(&server), Duration::from_millis(100));
    let (manager, accessory) = manager_with(client, &host, &only(AccessoryKind::EconomySwitch)).await;

    manager.refresh_device(DEVICE, true).await.unwrap();
    assert!(accessory.has_fault());
    manager.refresh_device(DEVICE, true).await.unwrap();
    assert!(!accessory.has_fault());
    assert_eq!(
        host.updates_for(Characteristic::StatusFault),
        vec![CharacteristicValue::Int(1), CharacteristicValue::Int(0)]
    );
}

#[tokio::test]
async fn outdoor_sensor_falls_back_with_fault() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/GetParam"))
        .respond_with(ok_values(json!({})))
        .mount(&server)
        .await;

    let host = Arc::new(RecordingHost::default());
    let client = client_at(server_address(&server), Duration::from_secs(2));
    let (manager, accessory) =
        manager_with(client, &host, &only(AccessoryKind::OutdoorTemperatureSensor)).await;

    let summary = manager.refresh_device(DEVICE, true).await.unwrap();
    assert_eq!(summary.failed, 0);
    assert!(accessory.has_fault());
    assert_eq!(
        host.updates_for(Characteristic::CurrentTemperature),
        vec![CharacteristicValue::Float(0.0)]
    );
}

#[tokio::test]
async fn configure_registers_enabled_and_removes_disabled() {
    let server = MockServer::start().await;
    mount_get(&server, "iu_model", "ASYG12KMCC").await;
    let host = Arc::new(RecordingHost::default());
    let client = client_at(server_address(&server), Duration::from_secs(2));

    let mut features = FeatureToggles::default();
    features.enable_dry_mode_switch = true;
    let (manager, thermostat) = manager_with(client, &host, &features).await;

    assert_eq!(
        *host.registered.lock().unwrap(),
        vec!["Den Thermostat".to_string(), "Den Dry Mode Switch".to_string()]
    );
    assert_eq!(
        host.unregistered.lock().unwrap().len(),
        AccessoryKind::ALL.len() - 2
    );
    assert_eq!(thermostat.model(), Some("ASYG12KMCC"));
    assert_eq!(thermostat.manufacturer(), "Fujitsu");
    assert_eq!(thermostat.serial_number(), DEVICE);
    assert!(manager.accessory(thermostat.id()).is_some());
}

#[tokio::test]
async fn target_temperature_set_is_published_immediately() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/SetParam"))
        .and(body_partial_json(json!({"value": {"iu_set_tmp": "225"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "OK"})))
        .expect(1)
        .mount(&server)
        .await;

    let host = Arc::new(RecordingHost::default());
    let client = client_at(server_address(&server), Duration::from_secs(2));
    let (manager, thermostat) =
        manager_with(client, &host, &only(AccessoryKind::Thermostat)).await;

    let accepted = manager
        .handle_set(
            thermostat.id(),
            Characteristic::TargetTemperature,
            CharacteristicValue::Float(22.3),
        )
        .await
        .unwrap();

    assert_eq!(accepted, CharacteristicValue::Float(22.5));
    let published = host.updates_for(Characteristic::TargetTemperature);
    assert_eq!(published.first(), Some(&CharacteristicValue::Float(22.5)));
    let cached = manager
        .sync_engine()
        .caches()
        .snapshot(thermostat.id())
        .unwrap();
    assert_eq!(
        cached.get(Characteristic::TargetTemperature),
        Some(&CharacteristicValue::Float(22.5))
    );
}

#[tokio::test]
async fn unsupported_characteristic_is_rejected() {
    let server = MockServer::start().await;
    let host = Arc::new(RecordingHost::default());
    let client = client_at(server_address(&server), Duration::from_secs(2));
    let (manager, switch) = manager_with(client, &host, &only(AccessoryKind::EconomySwitch)).await;

    let err = manager
        .handle_get(switch.id(), Characteristic::RotationSpeed)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedCharacteristic { .. }));

    let name = manager.handle_get(switch.id(), Characteristic::Name).await.unwrap();
    assert_eq!(name, CharacteristicValue::Text("Den Economy Switch".into()));
}

#[tokio::test]
async fn cache_does_not_keep_accessory_alive() {
    let server = MockServer::start().await;
    mount_get(&server, "iu_powerful", "1").await;
    let host: Arc<dyn AccessoryHost> = Arc::new(RecordingHost::default());
    let client = client_at(server_address(&server), Duration::from_secs(2));
    let device = client.device(DEVICE).unwrap().clone();

    let engine = SyncEngine::new();
    let accessory = Arc::new(Accessory::new(
        AccessoryKind::PowerfulSwitch,
        &device,
        None,
        client,
        host,
    ));
    let weak = Arc::downgrade(&accessory);

    engine
        .refresh(&accessory, &[Characteristic::On], true)
        .await;
    assert_eq!(engine.caches().len(), 1);

    drop(accessory);
    assert!(weak.upgrade().is_none());
    assert_eq!(engine.caches().prune(), 1);
    assert!(engine.caches().is_empty());
}

#[tokio::test]
async fn failing_property_does_not_abort_batch() {
    let server = MockServer::start().await;
    mount_get(&server, "iu_onoff", "1").await;
    mount_get(&server, "iu_fan_spd", "0").await;
    let host = Arc::new(RecordingHost::default());
    let client = client_at(server_address(&server), Duration::from_secs(2));
    let (manager, fan) = manager_with(client, &host, &only(AccessoryKind::Fan)).await;

    let summary = manager.refresh_device(DEVICE, true).await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.notified, 4);
    assert!(!fan.has_fault());
    assert_eq!(host.updates_for(Characteristic::Active), vec![CharacteristicValue::Int(1)]);
    assert_eq!(host.updates_for(Characteristic::CurrentFanState).len(), 1);
    assert_eq!(host.updates_for(Characteristic::TargetFanState).len(), 1);
    assert_eq!(
        host.updates_for(Characteristic::RotationSpeed),
        vec![CharacteristicValue::Float(50.0)]
    );
    assert!(host.updates_for(Characteristic::SwingMode).is_empty());
}

#[tokio::test]
async fn zero_interval_disables_polling() {
    let server = MockServer::start().await;
    let host = Arc::new(RecordingHost::default());
    let client = client_at(server_address(&server), Duration::from_secs(2));
    let (manager, _) = manager_with(client, &host, &only(AccessoryKind::EconomySwitch)).await;

    let device = DeviceId::parse(DEVICE).unwrap();
    assert!(spawn_poller(manager, device, Duration::ZERO).is_none());
}

#[tokio::test]
async fn poller_refreshes_and_notifies_only_on_change() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/GetParam"))
        .and(body_partial_json(json!({"list": ["iu_economy"]})))
        .respond_with(ok_values(json!({"iu_economy": "1"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_get(&server, "iu_economy", "0").await;

    let host = Arc::new(RecordingHost::default());
    let client = client_at(server_address(&server), Duration::from_secs(2));
    let (manager, _) = manager_with(client, &host, &only(AccessoryKind::EconomySwitch)).await;
    manager.refresh_device(DEVICE, true).await.unwrap();

    let device = DeviceId::parse(DEVICE).unwrap();
    let poller = spawn_poller(manager, device, Duration::from_millis(100)).unwrap();
    tokio::time::sleep(Duration::from_millis(350)).await;
    poller.abort();

    let economy_reads = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| String::from_utf8_lossy(&request.body).contains("iu_economy"))
        .count();
    assert!(economy_reads >= 3, "only {economy_reads} economy reads");
    assert_eq!(
        host.updates_for(Characteristic::On),
        vec![CharacteristicValue::Bool(true), CharacteristicValue::Bool(false)]
    );
}

#[tokio::test]
async fn dead_cache_entries_wait_for_prune() {
    let server = MockServer::start().await;
    mount_get(&server, "iu_powerful", "1").await;
    mount_get(&server, "iu_economy", "1").await;
    let host: Arc<dyn AccessoryHost> = Arc::new(RecordingHost::default());
    let client = client_at(server_address(&server), Duration::from_secs(2));
    let device = client.device(DEVICE).unwrap().clone();

    let engine = SyncEngine::new();
    let powerful = Arc::new(Accessory::new(
        AccessoryKind::PowerfulSwitch,
        &device,
        None,
        client.clone(),
        host.clone(),
    ));
    let economy = Arc::new(Accessory::new(
        AccessoryKind::EconomySwitch,
        &device,
        None,
        client,
        host,
    ));

    engine.refresh(&powerful, &[Characteristic::On], true).await;
    drop(powerful);
    engine.refresh(&economy, &[Characteristic::On], true).await;

    assert_eq!(engine.caches().len(), 2);
    assert_eq!(engine.caches().prune(), 1);
    assert!(engine.caches().snapshot(economy.id()).is_some());
}
