//! Server configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use flare_settings::ServerSettings;
use serde::{Deserialize, Serialize};

use crate::dispatch::ServerOptions;

/// Configuration for the flare HTTP server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Retry hint in milliseconds stamped on every message (`0` omits it).
    pub retry_ms: u64,
    /// Per-client delivery queue capacity.
    pub queue_capacity: usize,
    /// Dropped messages before a slow client is disconnected (`0` = never).
    pub drop_limit: u64,
    /// Extra headers written on every response of the stream endpoint.
    pub headers: BTreeMap<String, String>,
}

impl ServerConfig {
    /// Retry hint as a [`Duration`].
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }

    /// Dispatch actor options derived from this config.
    pub fn dispatch_options(&self) -> ServerOptions {
        ServerOptions::default()
            .with_retry_interval(self.retry_interval())
            .with_drop_limit(self.drop_limit)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            retry_ms: 3000,
            queue_capacity: 256,
            drop_limit: 100,
            headers: BTreeMap::new(),
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            retry_ms: s.retry_ms,
            queue_capacity: s.queue_capacity,
            drop_limit: s.drop_limit,
            headers: s.headers.clone(),
        }
    }
}
