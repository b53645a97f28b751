use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use reqwest::header::{CONNECTION, HeaderMap, HeaderValue};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::logger::MessageLogger;
use crate::protocol::{DEFAULT_PORT, Endpoint, Reply, parse_response};
use crate::registry::DeviceRecord;
use crate::{Error, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

const PREVIEW_LEN: usize = 200;

/// One JSON POST per exchange over a fresh connection. The Airstage
/// firmware misbehaves with keep-alive, so pooling is disabled and every
/// request carries `Connection: close`.
pub struct HttpTransport {
    http: reqwest::Client,
    timeout: Duration,
    logger: Option<Mutex<MessageLogger>>,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("close"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .pool_max_idle_per_host(0)
            .timeout(timeout)
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            http,
            timeout,
            logger: None,
        })
    }

    pub(crate) fn with_logger(mut self, logger: MessageLogger) -> Self {
        self.logger = Some(Mutex::new(logger));
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the reply's value map (empty for writes), or the typed failure.
    pub async fn send(
        &self,
        device: &DeviceRecord,
        endpoint: Endpoint,
        payload: &Value,
    ) -> Result<Map<String, Value>> {
        self.log(|logger| logger.log_request(device.id.as_str(), endpoint.path(), payload));

        match self.exchange(device, endpoint, payload).await {
            Ok((status, values)) => {
                let logged = (endpoint == Endpoint::GetParam).then_some(&values);
                self.log(|logger| {
                    logger.log_response(device.id.as_str(), endpoint.path(), status, logged)
                });
                Ok(values)
            }
            Err(e) => {
                let message = e.to_string();
                self.log(|logger| logger.log_failure(device.id.as_str(), endpoint.path(), &message));
                Err(e)
            }
        }
    }

    async fn exchange(
        &self,
        device: &DeviceRecord,
        endpoint: Endpoint,
        payload: &Value,
    ) -> Result<(u16, Map<String, Value>)> {
        let url = format!("{}{}", base_url(&device.address), endpoint.path());
        debug!(device = %device.id, address = %device.address, endpoint = endpoint.path(), "POST {url}");

        let response = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.classify(device, endpoint, e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| self.classify(device, endpoint, e))?;
        trace!(device = %device.id, status, body = %body, "response");

        let reply = parse_response(&body).map_err(|e| Error::MalformedResponse {
            device: device.name.clone(),
            address: device.address.clone(),
            endpoint: endpoint.path(),
            status,
            preview: preview(&body),
            reason: e.to_string(),
        })?;

        match reply {
            Reply::Ok(values) => Ok((status, values)),
            Reply::Rejected(code) => Err(Error::Device {
                device: device.name.clone(),
                endpoint: endpoint.path(),
                code,
            }),
        }
    }

    fn classify(&self, device: &DeviceRecord, endpoint: Endpoint, source: reqwest::Error) -> Error {
        if source.is_timeout() {
            Error::Timeout {
                device: device.name.clone(),
                address: device.address.clone(),
                endpoint: endpoint.path(),
                timeout: self.timeout,
            }
        } else {
            Error::Transport {
                device: device.name.clone(),
                address: device.address.clone(),
                endpoint: endpoint.path(),
                source,
            }
        }
    }

    fn log(&self, f: impl FnOnce(&mut MessageLogger)) {
        if let Some(logger) = &self.logger {
            let mut guard = logger.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard);
        }
    }
}

/// `192.168.1.100` gets the default port; `127.0.0.1:8080` is used as is.
pub(crate) fn base_url(address: &str) -> String {
    if address.contains(':') {
        format!("http://{address}")
    } else {
        format!("http://{address}:{DEFAULT_PORT}")
    }
}

fn preview(body: &str) -> String {
    if body.chars().count() <= PREVIEW_LEN {
        body.to_string()
    } else {
        let head: String = body.chars().take(PREVIEW_LEN).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_adds_default_port() {
        assert_eq!(base_url("192.168.1.100"), "http://192.168.1.100:80");
        assert_eq!(base_url("127.0.0.1:8080"), "http://127.0.0.1:8080");
    }

    #[test]
    fn preview_truncates_long_bodies() {
        assert_eq!(preview("short"), "short");
        let long = "x".repeat(500);
        let p = preview(&long);
        assert_eq!(p.len(), PREVIEW_LEN + 3);
        assert!(p.ends_with("..."));
    }
}
