use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLogMode {
    #[default]
    Full,
    Diffed,
}

/// Appends one JSON line per request, response and failure.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous_values: HashMap<String, Map<String, Value>>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous_values: HashMap::new(),
        })
    }

    pub fn log_request(&mut self, device: &str, endpoint: &str, body: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "device": device,
            "endpoint": endpoint,
            "body": body,
        });
        self.write_line(&entry);
    }

    /// `values` is the parameter map of a GetParam reply; `None` for writes.
    pub fn log_response(
        &mut self,
        device: &str,
        endpoint: &str,
        status: u16,
        values: Option<&Map<String, Value>>,
    ) {
        let Some(values) = values else {
            let entry = json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": "resp",
                "device": device,
                "endpoint": endpoint,
                "status": status,
            });
            self.write_line(&entry);
            return;
        };

        let entry = match self.mode {
            MessageLogMode::Full => json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": "resp",
                "device": device,
                "endpoint": endpoint,
                "status": status,
                "body": values,
            }),
            MessageLogMode::Diffed => {
                let previous = self
                    .previous_values
                    .entry(device.to_string())
                    .or_default();
                let entry = if previous.is_empty() {
                    json!({
                        "ts": Utc::now().to_rfc3339(),
                        "dir": "resp",
                        "device": device,
                        "endpoint": endpoint,
                        "status": status,
                        "full": true,
                        "body": values,
                    })
                } else {
                    json!({
                        "ts": Utc::now().to_rfc3339(),
                        "dir": "resp",
                        "device": device,
                        "endpoint": endpoint,
                        "status": status,
                        "changes": changed_params(previous, values),
                    })
                };
                for (k, v) in values {
                    previous.insert(k.clone(), v.clone());
                }
                entry
            }
        };
        self.write_line(&entry);
    }

    pub fn log_failure(&mut self, device: &str, endpoint: &str, error: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "err",
            "device": device,
            "endpoint": endpoint,
            "error": error,
        });
        self.write_line(&entry);
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}

fn changed_params(previous: &Map<String, Value>, current: &Map<String, Value>) -> Vec<Value> {
    current
        .iter()
        .filter(|(name, value)| previous.get(*name) != Some(*value))
        .map(|(name, value)| {
            json!({
                "param": name,
                "old": previous.get(name).cloned().unwrap_or(Value::Null),
                "new": value,
            })
        })
        .collect()
}
