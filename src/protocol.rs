use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::registry::DeviceRecord;

pub const DEFAULT_PORT: u16 = 80;

pub const SET_LEVEL_GET: &str = "03";
pub const SET_LEVEL_SET: &str = "02";

pub const RESULT_OK: &str = "OK";

pub const PARAM_POWER: &str = "iu_onoff";
pub const PARAM_TARGET_TEMP: &str = "iu_set_tmp";
pub const PARAM_INDOOR_TEMP: &str = "iu_indoor_tmp";
pub const PARAM_OUTDOOR_TEMP: &str = "iu_outdoor_tmp";
pub const PARAM_OPERATION_MODE: &str = "iu_op_mode";
pub const PARAM_FAN_SPEED: &str = "iu_fan_spd";
pub const PARAM_FAN_CTRL: &str = "iu_fan_ctrl";
pub const PARAM_ECONOMY: &str = "iu_economy";
pub const PARAM_POWERFUL: &str = "iu_powerful";
pub const PARAM_MIN_HEAT: &str = "iu_min_heat";
pub const PARAM_VERTICAL_DIRECTION: &str = "iu_af_dir_vrt";
pub const PARAM_VERTICAL_SWING: &str = "iu_af_swg_vrt";
pub const PARAM_MODEL: &str = "iu_model";
pub const PARAM_LOW_NOISE: &str = "ou_low_noise";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    GetParam,
    SetParam,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::GetParam => "/GetParam",
            Endpoint::SetParam => "/SetParam",
        }
    }
}

pub fn get_param_message(device: &DeviceRecord, parameters: &[&str]) -> Value {
    json!({
        "device_id": device.id.as_str(),
        "device_sub_id": device.sub_id,
        "req_id": "",
        "modified_by": "",
        "set_level": SET_LEVEL_GET,
        "list": parameters,
    })
}

pub fn set_param_message(device: &DeviceRecord, values: &BTreeMap<String, String>) -> Value {
    json!({
        "device_id": device.id.as_str(),
        "device_sub_id": device.sub_id,
        "req_id": "",
        "modified_by": "",
        "set_level": SET_LEVEL_SET,
        "value": values,
    })
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    result: Option<String>,
    #[serde(default)]
    value: Option<Map<String, Value>>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, PartialEq)]
pub(crate) enum Reply {
    /// Parameter values; empty for writes.
    Ok(Map<String, Value>),
    /// Non-OK status with the device-reported code.
    Rejected(String),
}

pub(crate) fn parse_response(body: &str) -> Result<Reply, serde_json::Error> {
    let raw: RawResponse = serde_json::from_str(body)?;
    if raw.result.as_deref() == Some(RESULT_OK) {
        return Ok(Reply::Ok(raw.value.unwrap_or_default()));
    }
    let code = match raw.error {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => raw.result.unwrap_or_else(|| "unknown".to_string()),
        Some(other) => other.to_string(),
    };
    Ok(Reply::Rejected(code))
}

/// Raw string value of a parameter; numbers are tolerated and stringified.
pub(crate) fn param_value(values: &Map<String, Value>, name: &str) -> Option<String> {
    match values.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
