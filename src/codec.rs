//! Conversions between domain values and the raw string values of the
//! Airstage local protocol.
//!
//! Two temperature encodings coexist on the wire: setpoints are Celsius x 10
//! (`"220"` is 22.0 C) while the measured indoor and outdoor temperatures are
//! Fahrenheit x 100 (`"7200"` is 72 F). They must never be swapped.

use crate::types::*;
use crate::{Error, Result};

/// Supported setpoints, paired Celsius to Fahrenheit as the firmware pairs
/// them. The pairing is not the arithmetic conversion (72 F is 22.0 C here,
/// not 22.2 C), so scale conversion always goes through this table.
const SETPOINT_TABLE: &[(f64, f64)] = &[
    (16.0, 60.0),
    (16.5, 61.0),
    (17.0, 62.0),
    (17.5, 63.0),
    (18.0, 64.0),
    (18.5, 65.0),
    (19.0, 66.0),
    (19.5, 67.0),
    (20.0, 68.0),
    (20.5, 69.0),
    (21.0, 70.0),
    (21.5, 71.0),
    (22.0, 72.0),
    (22.5, 73.0),
    (23.0, 74.0),
    (23.5, 75.0),
    (24.0, 76.0),
    (24.5, 77.0),
    (25.0, 78.0),
    (25.5, 79.0),
    (26.0, 80.0),
    (26.5, 81.0),
    (27.0, 82.0),
    (27.5, 83.0),
    (28.0, 84.0),
    (28.5, 85.0),
    (29.0, 86.0),
    (29.5, 87.0),
    (30.0, 88.0),
];

pub const MIN_VERTICAL_DIRECTION: u8 = 1;
pub const MAX_VERTICAL_DIRECTION: u8 = 4;

const TIE_EPSILON: f64 = 1e-9;

impl Toggle {
    pub fn as_param_value(&self) -> &'static str {
        match self {
            Toggle::Off => "0",
            Toggle::On => "1",
        }
    }

    pub fn from_param_value(s: &str) -> Option<Self> {
        match s {
            "0" => Some(Toggle::Off),
            "1" => Some(Toggle::On),
            _ => None,
        }
    }
}

impl OperationMode {
    pub fn as_param_value(&self) -> &'static str {
        match self {
            OperationMode::Auto => "0",
            OperationMode::Cool => "1",
            OperationMode::Dry => "2",
            OperationMode::Fan => "3",
            OperationMode::Heat => "4",
        }
    }

    pub fn from_param_value(s: &str) -> Option<Self> {
        match s {
            "0" => Some(OperationMode::Auto),
            "1" => Some(OperationMode::Cool),
            "2" => Some(OperationMode::Dry),
            "3" => Some(OperationMode::Fan),
            "4" => Some(OperationMode::Heat),
            _ => None,
        }
    }
}

impl FanSpeed {
    pub fn as_param_value(&self) -> &'static str {
        match self {
            FanSpeed::Auto => "0",
            FanSpeed::Quiet => "2",
            FanSpeed::Low => "5",
            FanSpeed::Medium => "8",
            FanSpeed::High => "11",
        }
    }

    pub fn from_param_value(s: &str) -> Option<Self> {
        match s {
            "0" => Some(FanSpeed::Auto),
            "2" => Some(FanSpeed::Quiet),
            "5" => Some(FanSpeed::Low),
            "8" => Some(FanSpeed::Medium),
            "11" => Some(FanSpeed::High),
            _ => None,
        }
    }
}

fn parse_raw(parameter: &str, raw: &str) -> Result<i64> {
    raw.trim().parse::<i64>().map_err(|_| Error::Codec {
        parameter: parameter.to_string(),
        value: raw.to_string(),
    })
}

pub fn decode_toggle(parameter: &str, raw: &str) -> Result<Toggle> {
    Toggle::from_param_value(raw.trim()).ok_or_else(|| Error::Codec {
        parameter: parameter.to_string(),
        value: raw.to_string(),
    })
}

pub fn decode_operation_mode(parameter: &str, raw: &str) -> Result<OperationMode> {
    OperationMode::from_param_value(raw.trim()).ok_or_else(|| Error::Codec {
        parameter: parameter.to_string(),
        value: raw.to_string(),
    })
}

pub fn decode_fan_speed(parameter: &str, raw: &str) -> Result<FanSpeed> {
    FanSpeed::from_param_value(raw.trim()).ok_or_else(|| Error::Codec {
        parameter: parameter.to_string(),
        value: raw.to_string(),
    })
}

/// Celsius setpoint to wire value: nearest tenth, times ten.
pub fn encode_temperature(celsius: f64) -> String {
    ((celsius * 10.0).round() as i64).to_string()
}

/// Wire setpoint (Celsius x 10) to Celsius.
pub fn decode_temperature(parameter: &str, raw: &str) -> Result<f64> {
    Ok(parse_raw(parameter, raw)? as f64 / 10.0)
}

/// Measured temperature (Fahrenheit x 100) to Celsius.
pub fn decode_measured_temperature(parameter: &str, raw: &str) -> Result<f64> {
    let fahrenheit = parse_raw(parameter, raw)? as f64 / 100.0;
    Ok((fahrenheit - 32.0) * 5.0 / 9.0)
}

fn nearest_index(column: impl Fn(&(f64, f64)) -> f64, target: f64) -> usize {
    let mut best = 0;
    for (idx, pair) in SETPOINT_TABLE.iter().enumerate().skip(1) {
        let candidate = column(pair);
        let current = column(&SETPOINT_TABLE[best]);
        let d = (candidate - target).abs();
        let best_d = (current - target).abs();
        // Equidistant: the higher setpoint wins regardless of table order.
        if d < best_d - TIE_EPSILON || ((d - best_d).abs() <= TIE_EPSILON && candidate > current) {
            best = idx;
        }
    }
    best
}

fn column(scale: TemperatureScale) -> fn(&(f64, f64)) -> f64 {
    match scale {
        TemperatureScale::Celsius => |p: &(f64, f64)| p.0,
        TemperatureScale::Fahrenheit => |p: &(f64, f64)| p.1,
    }
}

/// Snap to the nearest supported setpoint in the given scale.
pub fn closest_valid_temperature(value: f64, scale: TemperatureScale) -> f64 {
    let col = column(scale);
    col(&SETPOINT_TABLE[nearest_index(col, value)])
}

pub fn valid_temperatures(scale: TemperatureScale) -> impl Iterator<Item = f64> {
    let col = column(scale);
    SETPOINT_TABLE.iter().map(col)
}

pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    SETPOINT_TABLE[nearest_index(column(TemperatureScale::Fahrenheit), fahrenheit)].0
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    SETPOINT_TABLE[nearest_index(column(TemperatureScale::Celsius), celsius)].1
}

/// Express a Celsius value in `scale`, snapping through the setpoint table
/// when converting to Fahrenheit.
pub fn celsius_in_scale(celsius: f64, scale: TemperatureScale) -> Temperature {
    match scale {
        TemperatureScale::Celsius => Temperature::celsius(celsius),
        TemperatureScale::Fahrenheit => Temperature::fahrenheit(celsius_to_fahrenheit(celsius)),
    }
}

/// Setpoint in `scale` to the Celsius value the device accepts.
pub fn setpoint_to_celsius(value: f64, scale: TemperatureScale) -> f64 {
    match scale {
        TemperatureScale::Celsius => closest_valid_temperature(value, TemperatureScale::Celsius),
        TemperatureScale::Fahrenheit => fahrenheit_to_celsius(value),
    }
}

pub fn clamp_vertical_direction(value: i64) -> u8 {
    value.clamp(MIN_VERTICAL_DIRECTION as i64, MAX_VERTICAL_DIRECTION as i64) as u8
}

pub fn decode_vertical_direction(parameter: &str, raw: &str) -> Result<u8> {
    Ok(clamp_vertical_direction(parse_raw(parameter, raw)?))
}
