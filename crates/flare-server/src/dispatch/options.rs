//! Dispatch actor options.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::client::ClientInfo;

/// Synchronous notification invoked by the dispatch actor.
///
/// Runs inside the control loop: keep it short and never block.
pub type ClientHook = Arc<dyn Fn(&ClientInfo) + Send + Sync>;

/// Settings consumed by the dispatch actor.
#[derive(Clone)]
pub struct ServerOptions {
    /// Retry hint stamped onto every broadcast message (`ZERO` omits it).
    pub retry_interval: Duration,
    /// Dropped messages after which a slow client is disconnected (`0` = never).
    pub drop_limit: u64,
    /// Called after a client joins its channel.
    pub on_connect: Option<ClientHook>,
    /// Called as a client leaves its channel, before its stream ends.
    pub on_disconnect: Option<ClientHook>,
    /// Cancelling this token shuts the actor down.
    pub shutdown: CancellationToken,
}

impl ServerOptions {
    /// Set the retry hint.
    #[must_use]
    pub fn with_retry_interval(mut self, retry: Duration) -> Self {
        self.retry_interval = retry;
        self
    }

    /// Set the slow-client drop limit.
    #[must_use]
    pub fn with_drop_limit(mut self, limit: u64) -> Self {
        self.drop_limit = limit;
        self
    }

    /// Register the connect notification.
    #[must_use]
    pub fn on_connect(mut self, hook: impl Fn(&ClientInfo) + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(hook));
        self
    }

    /// Register the disconnect notification.
    #[must_use]
    pub fn on_disconnect(mut self, hook: impl Fn(&ClientInfo) + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(hook));
        self
    }

    /// Tie the actor's lifetime to an external token.
    #[must_use]
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            retry_interval: Duration::ZERO,
            drop_limit: 0,
            on_connect: None,
            on_disconnect: None,
            shutdown: CancellationToken::new(),
        }
    }
}

impl fmt::Debug for ServerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerOptions")
            .field("retry_interval", &self.retry_interval)
            .field("drop_limit", &self.drop_limit)
            .field("on_connect", &self.on_connect.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .finish_non_exhaustive()
    }
}
