use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::codec::*;
use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::*;
use crate::registry::{DeviceId, DeviceRecord, DeviceRegistry};
use crate::scheduler::{DEFAULT_MAX_CONCURRENCY, DEFAULT_MIN_DELAY, RequestScheduler};
use crate::store::ScaleStore;
use crate::transport::{DEFAULT_TIMEOUT, HttpTransport};
use crate::types::*;
use crate::{Error, Result};

const OUTDOOR_SENSOR: &str = "outdoor temperature";

pub struct DeviceClientBuilder {
    registry: DeviceRegistry,
    max_concurrency: usize,
    min_delay: Duration,
    timeout: Duration,
    log_mode: Option<MessageLogMode>,
    log_path: Option<PathBuf>,
    scales: Option<ScaleStore>,
}

impl DeviceClientBuilder {
    pub fn new(registry: DeviceRegistry) -> Self {
        Self {
            registry,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            min_delay: DEFAULT_MIN_DELAY,
            timeout: DEFAULT_TIMEOUT,
            log_mode: None,
            log_path: None,
            scales: None,
        }
    }

    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    pub fn min_delay(mut self, delay: Duration) -> Self {
        self.min_delay = delay;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<PathBuf>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn scale_store(mut self, store: ScaleStore) -> Self {
        self.scales = Some(store);
        self
    }

    pub fn build(self) -> Result<DeviceClient> {
        let mut transport = HttpTransport::new(self.timeout)?;
        if let (Some(mode), Some(path)) = (self.log_mode, self.log_path) {
            transport = transport.with_logger(MessageLogger::new(mode, &path)?);
        }

        let schedulers = self
            .registry
            .iter()
            .map(|d| {
                (
                    d.id.clone(),
                    RequestScheduler::new(self.max_concurrency, self.min_delay),
                )
            })
            .collect();

        Ok(DeviceClient {
            registry: Arc::new(self.registry),
            transport,
            schedulers,
            scales: self.scales.unwrap_or_default(),
        })
    }
}

/// Typed queries and commands against registered devices. Every call resolves
/// the device through the registry and goes through that device's scheduler.
pub struct DeviceClient {
    registry: Arc<DeviceRegistry>,
    transport: HttpTransport,
    schedulers: HashMap<DeviceId, RequestScheduler>,
    scales: ScaleStore,
}

impl DeviceClient {
    pub fn builder(registry: DeviceRegistry) -> DeviceClientBuilder {
        DeviceClientBuilder::new(registry)
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn device(&self, device_id: &str) -> Result<&DeviceRecord> {
        self.registry.lookup(device_id)
    }

    fn scheduler(&self, device: &DeviceRecord) -> Result<&RequestScheduler> {
        self.schedulers
            .get(&device.id)
            .ok_or_else(|| Error::DeviceNotFound(device.id.to_string()))
    }

    async fn read(&self, device_id: &str, parameters: &[&str]) -> Result<Map<String, Value>> {
        let device = self.registry.lookup(device_id)?;
        let message = get_param_message(device, parameters);
        debug!(device = %device.id, ?parameters, "GetParam");
        self.scheduler(device)?
            .enqueue(self.transport.send(device, Endpoint::GetParam, &message))
            .await
    }

    async fn read_required(&self, device_id: &str, parameter: &str) -> Result<String> {
        let values = self.read(device_id, &[parameter]).await?;
        param_value(&values, parameter).ok_or_else(|| Error::MissingParameter {
            device: device_id.to_string(),
            parameter: parameter.to_string(),
        })
    }

    async fn write(&self, device_id: &str, values: BTreeMap<String, String>) -> Result<()> {
        let device = self.registry.lookup(device_id)?;
        let message = set_param_message(device, &values);
        debug!(device = %device.id, ?values, "SetParam");
        self.scheduler(device)?
            .enqueue(self.transport.send(device, Endpoint::SetParam, &message))
            .await
            .map(|_| ())
    }

    async fn write_one(&self, device_id: &str, parameter: &str, value: &str) -> Result<()> {
        let mut values = BTreeMap::new();
        values.insert(parameter.to_string(), value.to_string());
        self.write(device_id, values).await
    }

    async fn read_toggle(&self, device_id: &str, parameter: &str) -> Result<Toggle> {
        decode_toggle(parameter, &self.read_required(device_id, parameter).await?)
    }

    async fn write_toggle(&self, device_id: &str, parameter: &str, toggle: Toggle) -> Result<Toggle> {
        self.write_one(device_id, parameter, toggle.as_param_value()).await?;
        Ok(toggle)
    }

    // --- metadata ---

    pub fn name(&self, device_id: &str) -> Result<String> {
        Ok(self.registry.lookup(device_id)?.name.clone())
    }

    pub async fn model(&self, device_id: &str) -> Result<Option<String>> {
        self.get_parameter(device_id, PARAM_MODEL).await
    }

    /// Connectivity check: the device must answer a power-state read.
    pub async fn probe(&self, device_id: &str) -> Result<()> {
        let power = self.power(device_id).await?;
        debug!(device = device_id, %power, "probe succeeded");
        Ok(())
    }

    // --- generic parameters ---

    /// Raw value of any parameter; `None` when the device omits it.
    pub async fn get_parameter(&self, device_id: &str, parameter: &str) -> Result<Option<String>> {
        let values = self.read(device_id, &[parameter]).await?;
        Ok(param_value(&values, parameter).filter(|v| !v.is_empty()))
    }

    pub async fn set_parameter(&self, device_id: &str, parameter: &str, value: &str) -> Result<()> {
        info!(device = device_id, parameter, value, "set parameter");
        self.write_one(device_id, parameter, value).await
    }

    // --- power and mode ---

    pub async fn power(&self, device_id: &str) -> Result<Toggle> {
        self.read_toggle(device_id, PARAM_POWER).await
    }

    pub async fn set_power(&self, device_id: &str, power: Toggle) -> Result<Toggle> {
        info!(device = device_id, %power, "power");
        self.write_toggle(device_id, PARAM_POWER, power).await
    }

    pub async fn operation_mode(&self, device_id: &str) -> Result<OperationMode> {
        let raw = self.read_required(device_id, PARAM_OPERATION_MODE).await?;
        decode_operation_mode(PARAM_OPERATION_MODE, &raw)
    }

    pub async fn set_operation_mode(&self, device_id: &str, mode: OperationMode) -> Result<OperationMode> {
        info!(device = device_id, %mode, "operation mode");
        self.write_one(device_id, PARAM_OPERATION_MODE, mode.as_param_value())
            .await?;
        Ok(mode)
    }

    // --- temperatures ---

    pub async fn indoor_temperature(&self, device_id: &str, scale: TemperatureScale) -> Result<Temperature> {
        let raw = self.read_required(device_id, PARAM_INDOOR_TEMP).await?;
        let celsius = decode_measured_temperature(PARAM_INDOOR_TEMP, &raw)?;
        debug!(device = device_id, raw = %raw, celsius, "indoor temperature");
        Ok(celsius_in_scale(celsius, scale))
    }

    /// Outdoor reading in the requested scale. Fahrenheit uses the affine
    /// formula since outdoor values routinely fall outside the setpoint table.
    pub async fn outdoor_temperature(&self, device_id: &str, scale: TemperatureScale) -> Result<Temperature> {
        let raw = self
            .get_parameter(device_id, PARAM_OUTDOOR_TEMP)
            .await?
            .ok_or_else(|| Error::SensorUnavailable {
                device: device_id.to_string(),
                sensor: OUTDOOR_SENSOR,
            })?;
        let celsius = decode_measured_temperature(PARAM_OUTDOOR_TEMP, &raw)?;
        Ok(match scale {
            TemperatureScale::Celsius => Temperature::celsius(celsius),
            TemperatureScale::Fahrenheit => Temperature::fahrenheit(celsius * 9.0 / 5.0 + 32.0),
        })
    }

    pub async fn target_temperature(&self, device_id: &str, scale: TemperatureScale) -> Result<Temperature> {
        let raw = self.read_required(device_id, PARAM_TARGET_TEMP).await?;
        let celsius = decode_temperature(PARAM_TARGET_TEMP, &raw)?;
        Ok(celsius_in_scale(celsius, scale))
    }

    /// Snaps `value` to a supported setpoint and writes it. Returns the
    /// setpoint actually sent, expressed in `scale`.
    pub async fn set_target_temperature(
        &self,
        device_id: &str,
        value: f64,
        scale: TemperatureScale,
    ) -> Result<Temperature> {
        let celsius = setpoint_to_celsius(value, scale);
        let raw = encode_temperature(celsius);
        info!(device = device_id, requested = value, celsius, raw = %raw, "target temperature");
        self.write_one(device_id, PARAM_TARGET_TEMP, &raw).await?;
        Ok(celsius_in_scale(celsius, scale))
    }

    /// Indoor minus target, both read in `scale`.
    pub async fn temperature_delta(&self, device_id: &str, scale: TemperatureScale) -> Result<f64> {
        let indoor = self.indoor_temperature(device_id, scale).await?;
        let target = self.target_temperature(device_id, scale).await?;
        Ok(indoor.value - target.value)
    }

    // --- heating/cooling state ---

    /// Power, then mode, then (auto only) the temperature delta.
    pub async fn current_heating_cooling_state(&self, device_id: &str) -> Result<HeatingCoolingState> {
        if !self.power(device_id).await?.is_on() {
            return Ok(HeatingCoolingState::Off);
        }
        let state = match self.operation_mode(device_id).await? {
            OperationMode::Cool | OperationMode::Dry => HeatingCoolingState::Cool,
            OperationMode::Heat => HeatingCoolingState::Heat,
            OperationMode::Fan => HeatingCoolingState::Off,
            OperationMode::Auto => {
                let delta = self
                    .temperature_delta(device_id, TemperatureScale::Celsius)
                    .await?;
                if delta > 0.0 {
                    HeatingCoolingState::Cool
                } else if delta < 0.0 {
                    HeatingCoolingState::Heat
                } else {
                    HeatingCoolingState::Off
                }
            }
        };
        Ok(state)
    }

    pub async fn target_heating_cooling_state(&self, device_id: &str) -> Result<TargetHeatingCoolingState> {
        if !self.power(device_id).await?.is_on() {
            return Ok(TargetHeatingCoolingState::Off);
        }
        let mode = self.operation_mode(device_id).await?;
        Ok(TargetHeatingCoolingState::from_operation_mode(mode))
    }

    pub async fn set_target_heating_cooling_state(
        &self,
        device_id: &str,
        target: TargetHeatingCoolingState,
    ) -> Result<TargetHeatingCoolingState> {
        let power = self.power(device_id).await?;
        match target.operation_mode() {
            None => {
                if power.is_on() {
                    self.set_power(device_id, Toggle::Off).await?;
                }
            }
            Some(mode) => {
                if !power.is_on() {
                    self.set_power(device_id, Toggle::On).await?;
                }
                self.set_operation_mode(device_id, mode).await?;
            }
        }
        Ok(target)
    }

    // --- fan and airflow ---

    pub async fn fan_speed(&self, device_id: &str) -> Result<FanSpeed> {
        let raw = self.read_required(device_id, PARAM_FAN_SPEED).await?;
        decode_fan_speed(PARAM_FAN_SPEED, &raw)
    }

    pub async fn set_fan_speed(&self, device_id: &str, speed: FanSpeed) -> Result<FanSpeed> {
        info!(device = device_id, %speed, "fan speed");
        self.write_one(device_id, PARAM_FAN_SPEED, speed.as_param_value())
            .await?;
        Ok(speed)
    }

    pub async fn vertical_direction(&self, device_id: &str) -> Result<u8> {
        let raw = self.read_required(device_id, PARAM_VERTICAL_DIRECTION).await?;
        decode_vertical_direction(PARAM_VERTICAL_DIRECTION, &raw)
    }

    /// Out-of-range positions are clamped, not rejected.
    pub async fn set_vertical_direction(&self, device_id: &str, position: i64) -> Result<u8> {
        let position = clamp_vertical_direction(position);
        self.write_one(device_id, PARAM_VERTICAL_DIRECTION, &position.to_string())
            .await?;
        Ok(position)
    }

    pub async fn vertical_swing(&self, device_id: &str) -> Result<Toggle> {
        self.read_toggle(device_id, PARAM_VERTICAL_SWING).await
    }

    pub async fn set_vertical_swing(&self, device_id: &str, swing: Toggle) -> Result<Toggle> {
        self.write_toggle(device_id, PARAM_VERTICAL_SWING, swing).await
    }

    // --- feature toggles ---

    pub async fn powerful(&self, device_id: &str) -> Result<Toggle> {
        self.read_toggle(device_id, PARAM_POWERFUL).await
    }

    pub async fn set_powerful(&self, device_id: &str, toggle: Toggle) -> Result<Toggle> {
        self.write_toggle(device_id, PARAM_POWERFUL, toggle).await
    }

    pub async fn economy(&self, device_id: &str) -> Result<Toggle> {
        self.read_toggle(device_id, PARAM_ECONOMY).await
    }

    pub async fn set_economy(&self, device_id: &str, toggle: Toggle) -> Result<Toggle> {
        self.write_toggle(device_id, PARAM_ECONOMY, toggle).await
    }

    pub async fn energy_saving_fan(&self, device_id: &str) -> Result<Toggle> {
        self.read_toggle(device_id, PARAM_FAN_CTRL).await
    }

    pub async fn set_energy_saving_fan(&self, device_id: &str, toggle: Toggle) -> Result<Toggle> {
        self.write_toggle(device_id, PARAM_FAN_CTRL, toggle).await
    }

    pub async fn minimum_heat(&self, device_id: &str) -> Result<Toggle> {
        self.read_toggle(device_id, PARAM_MIN_HEAT).await
    }

    pub async fn set_minimum_heat(&self, device_id: &str, toggle: Toggle) -> Result<Toggle> {
        self.write_toggle(device_id, PARAM_MIN_HEAT, toggle).await
    }

    pub async fn low_noise(&self, device_id: &str) -> Result<Toggle> {
        self.read_toggle(device_id, PARAM_LOW_NOISE).await
    }

    pub async fn set_low_noise(&self, device_id: &str, toggle: Toggle) -> Result<Toggle> {
        self.write_toggle(device_id, PARAM_LOW_NOISE, toggle).await
    }

    // --- display scale ---

    /// The display preference is per user, so the first device's stored
    /// value stands for all of them.
    pub fn temperature_scale(&self) -> TemperatureScale {
        self.registry
            .first()
            .and_then(|d| self.scales.get(&d.id))
            .unwrap_or_default()
    }

    pub fn set_temperature_scale(&self, scale: TemperatureScale) -> Result<TemperatureScale> {
        self.scales
            .set_all(self.registry.iter().map(|d| &d.id), scale)?;
        info!(scale = scale.symbol(), "temperature display units changed");
        Ok(scale)
    }
}
