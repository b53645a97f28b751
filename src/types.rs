use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TemperatureScale {
    #[default]
    #[serde(rename = "C")]
    Celsius,
    #[serde(rename = "F")]
    Fahrenheit,
}

impl TemperatureScale {
    pub fn symbol(&self) -> &'static str {
        match self {
            TemperatureScale::Celsius => "\u{00b0}C",
            TemperatureScale::Fahrenheit => "\u{00b0}F",
        }
    }
}

/// A temperature reading or setpoint, tagged with the scale it is expressed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperature {
    pub value: f64,
    pub scale: TemperatureScale,
}

impl Temperature {
    pub fn celsius(value: f64) -> Self {
        Self {
            value,
            scale: TemperatureScale::Celsius,
        }
    }

    pub fn fahrenheit(value: f64) -> Self {
        Self {
            value,
            scale: TemperatureScale::Fahrenheit,
        }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}{}", self.value, self.scale.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Toggle {
    Off,
    On,
}

impl Toggle {
    pub fn is_on(&self) -> bool {
        matches!(self, Toggle::On)
    }
}

impl From<bool> for Toggle {
    fn from(on: bool) -> Self {
        if on { Toggle::On } else { Toggle::Off }
    }
}

impl fmt::Display for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Toggle::Off => "OFF",
            Toggle::On => "ON",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationMode {
    Auto,
    Cool,
    Dry,
    Fan,
    Heat,
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationMode::Auto => "Auto",
            OperationMode::Cool => "Cool",
            OperationMode::Dry => "Dry",
            OperationMode::Fan => "Fan",
            OperationMode::Heat => "Heat",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FanSpeed {
    Auto,
    Quiet,
    Low,
    Medium,
    High,
}

impl fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FanSpeed::Auto => "Auto",
            FanSpeed::Quiet => "Quiet",
            FanSpeed::Low => "Low",
            FanSpeed::Medium => "Medium",
            FanSpeed::High => "High",
        })
    }
}

/// What the unit is doing right now, derived from power, mode and (in auto
/// mode) the indoor/target temperature delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeatingCoolingState {
    #[default]
    Off,
    Heat,
    Cool,
}

/// The state the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetHeatingCoolingState {
    #[default]
    Off,
    Heat,
    Cool,
    Auto,
}

impl TargetHeatingCoolingState {
    /// The operation mode a target state maps to; `None` for `Off`.
    pub fn operation_mode(&self) -> Option<OperationMode> {
        match self {
            TargetHeatingCoolingState::Off => None,
            TargetHeatingCoolingState::Heat => Some(OperationMode::Heat),
            TargetHeatingCoolingState::Cool => Some(OperationMode::Cool),
            TargetHeatingCoolingState::Auto => Some(OperationMode::Auto),
        }
    }

    pub fn from_operation_mode(mode: OperationMode) -> Self {
        match mode {
            OperationMode::Cool | OperationMode::Dry => TargetHeatingCoolingState::Cool,
            OperationMode::Heat => TargetHeatingCoolingState::Heat,
            OperationMode::Auto => TargetHeatingCoolingState::Auto,
            OperationMode::Fan => TargetHeatingCoolingState::Off,
        }
    }
}
