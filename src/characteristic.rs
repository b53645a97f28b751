use std::fmt;

/// Observable properties exposed to the home-automation host. Numeric codes
/// follow the HomeKit conventions the host expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Characteristic {
    CurrentHeatingCoolingState,
    TargetHeatingCoolingState,
    CurrentTemperature,
    TargetTemperature,
    TemperatureDisplayUnits,
    Active,
    CurrentFanState,
    TargetFanState,
    RotationSpeed,
    SwingMode,
    On,
    StatusFault,
    Name,
}

impl Characteristic {
    pub fn name(&self) -> &'static str {
        match self {
            Characteristic::CurrentHeatingCoolingState => "CurrentHeatingCoolingState",
            Characteristic::TargetHeatingCoolingState => "TargetHeatingCoolingState",
            Characteristic::CurrentTemperature => "CurrentTemperature",
            Characteristic::TargetTemperature => "TargetTemperature",
            Characteristic::TemperatureDisplayUnits => "TemperatureDisplayUnits",
            Characteristic::Active => "Active",
            Characteristic::CurrentFanState => "CurrentFanState",
            Characteristic::TargetFanState => "TargetFanState",
            Characteristic::RotationSpeed => "RotationSpeed",
            Characteristic::SwingMode => "SwingMode",
            Characteristic::On => "On",
            Characteristic::StatusFault => "StatusFault",
            Characteristic::Name => "Name",
        }
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// HomeKit characteristic codes
pub const HEATING_COOLING_OFF: i64 = 0;
pub const HEATING_COOLING_HEAT: i64 = 1;
pub const HEATING_COOLING_COOL: i64 = 2;
pub const HEATING_COOLING_AUTO: i64 = 3;

pub const DISPLAY_UNITS_CELSIUS: i64 = 0;
pub const DISPLAY_UNITS_FAHRENHEIT: i64 = 1;

pub const FAN_STATE_INACTIVE: i64 = 0;
pub const FAN_STATE_BLOWING: i64 = 2;

pub const TARGET_FAN_MANUAL: i64 = 0;
pub const TARGET_FAN_AUTO: i64 = 1;

pub const NO_FAULT: i64 = 0;
pub const GENERAL_FAULT: i64 = 1;

#[derive(Debug, Clone, PartialEq)]
pub enum CharacteristicValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CharacteristicValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CharacteristicValue::Bool(b) => Some(*b),
            CharacteristicValue::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CharacteristicValue::Int(i) => Some(*i),
            CharacteristicValue::Bool(b) => Some(i64::from(*b)),
            CharacteristicValue::Float(f) if f.is_finite() => Some(f.round() as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CharacteristicValue::Float(f) => Some(*f),
            CharacteristicValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl fmt::Display for CharacteristicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharacteristicValue::Bool(b) => write!(f, "{b}"),
            CharacteristicValue::Int(i) => write!(f, "{i}"),
            CharacteristicValue::Float(v) => write!(f, "{v}"),
            CharacteristicValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for CharacteristicValue {
    fn from(b: bool) -> Self {
        CharacteristicValue::Bool(b)
    }
}

impl From<i64> for CharacteristicValue {
    fn from(i: i64) -> Self {
        CharacteristicValue::Int(i)
    }
}

impl From<f64> for CharacteristicValue {
    fn from(v: f64) -> Self {
        CharacteristicValue::Float(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_accessors() {
        assert_eq!(CharacteristicValue::Int(1).as_bool(), Some(true));
        assert_eq!(CharacteristicValue::Bool(true).as_i64(), Some(1));
        assert_eq!(CharacteristicValue::Float(2.6).as_i64(), Some(3));
        assert_eq!(CharacteristicValue::Int(22).as_f64(), Some(22.0));
        assert_eq!(CharacteristicValue::Text("x".into()).as_f64(), None);
    }
}
