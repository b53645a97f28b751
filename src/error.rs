use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid device id {0:?}: expected 12 hexadecimal characters (e.g. A0B1C2D3E4F5 or a0:b1:c2:d3:e4:f5)")]
    InvalidDeviceId(String),

    #[error("invalid device address {0:?}: expected an IPv4 address such as 192.168.1.100")]
    InvalidAddress(String),

    #[error("device {name:?} is missing an IP address")]
    MissingAddress { name: String },

    #[error("device {0} is configured more than once")]
    DuplicateDevice(String),

    #[error("could not detect device id for {address}: {reason}")]
    DeviceIdDetection { address: String, reason: String },

    #[error("device {0} not found in configuration")]
    DeviceNotFound(String),

    #[error("request to {device} ({address}) {endpoint} timed out after {}ms", .timeout.as_millis())]
    Timeout {
        device: String,
        address: String,
        endpoint: &'static str,
        timeout: Duration,
    },

    #[error("request to {device} ({address}) {endpoint} failed: {source}")]
    Transport {
        device: String,
        address: String,
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("device {device} rejected {endpoint}: error code {code}")]
    Device {
        device: String,
        endpoint: &'static str,
        code: String,
    },

    #[error("malformed response from {device} ({address}) {endpoint}, HTTP {status}: {reason} (body: {preview})")]
    MalformedResponse {
        device: String,
        address: String,
        endpoint: &'static str,
        status: u16,
        preview: String,
        reason: String,
    },

    #[error("device {device} did not report parameter {parameter}")]
    MissingParameter { device: String, parameter: String },

    #[error("{sensor} sensor not available on device {device}")]
    SensorUnavailable { device: String, sensor: &'static str },

    #[error("cannot decode {value:?} for parameter {parameter}")]
    Codec { parameter: String, value: String },

    #[error("unsupported value {value} for characteristic {characteristic}")]
    UnsupportedValue {
        characteristic: &'static str,
        value: String,
    },

    #[error("{accessory} does not expose characteristic {characteristic}")]
    UnsupportedCharacteristic {
        accessory: String,
        characteristic: &'static str,
    },

    #[error("failed to build HTTP client: {0}")]
    Http(#[source] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the device could not be reached at all (timeout, refused,
    /// unreachable host, DNS). Application-level rejections are not included.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::Transport { .. })
    }
}
