//! Settings type definitions.
//!
//! Field names are camelCase on the wire. Every section is `#[serde(default)]`
//! so a settings file only needs the keys it overrides.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 9000, "retryMs": 5000 },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlareSettings {
    /// HTTP listener and broadcaster settings.
    pub server: ServerSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl FlareSettings {
    /// Reject values the broadcaster cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.queueCapacity must be at least 1".into(),
            ));
        }
        if self.server.host.is_empty() {
            return Err(SettingsError::InvalidValue(
                "server.host must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// HTTP listener and broadcaster settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` picks a free port).
    pub port: u16,
    /// Reconnect hint stamped onto every outgoing message, in milliseconds.
    /// `0` omits the `retry:` field.
    pub retry_ms: u64,
    /// Per-client delivery queue capacity.
    pub queue_capacity: usize,
    /// Dropped messages after which a slow client is disconnected.
    /// `0` never disconnects.
    pub drop_limit: u64,
    /// Extra response headers sent on every stream (e.g. CORS).
    pub headers: BTreeMap<String, String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            retry_ms: 3000,
            queue_capacity: 256,
            drop_limit: 100,
            headers: BTreeMap::new(),
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}
