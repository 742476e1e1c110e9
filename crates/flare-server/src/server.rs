//! `FlareServer`: axum HTTP server wired to the dispatch actor.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::dispatch::{Server, ServerOptions};
use crate::errors::ServerError;
use crate::http::admin::{
    close_channel_handler, health_handler, metrics_handler, publish_handler,
};
use crate::http::stream::sse_handler;
use crate::http::{self, ChannelNamer};
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Dispatch actor handle.
    pub dispatch: Server,
    /// Extra headers written on every stream-endpoint response.
    pub headers: Arc<HeaderMap>,
    /// Request → channel name.
    pub namer: ChannelNamer,
    /// Per-client queue capacity.
    pub queue_capacity: usize,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`, if a recorder was installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The flare SSE server.
pub struct FlareServer {
    config: ServerConfig,
    dispatch: Server,
    shutdown: Arc<ShutdownCoordinator>,
    namer: ChannelNamer,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl FlareServer {
    /// Create a server and spawn its dispatch actor.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(config: ServerConfig) -> Self {
        let options = config.dispatch_options();
        Self::with_options(config, options)
    }

    /// Create a server with explicit dispatch options (hooks, token).
    ///
    /// The options' shutdown token becomes the server-wide shutdown token.
    pub fn with_options(config: ServerConfig, options: ServerOptions) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::with_token(options.shutdown.clone()));
        Self {
            config,
            dispatch: Server::new(options),
            shutdown,
            namer: http::path_channel_namer(),
            metrics: None,
            start_time: Instant::now(),
        }
    }

    /// Replace the default path-based channel naming.
    #[must_use]
    pub fn with_channel_namer(
        mut self,
        namer: impl Fn(&Parts) -> String + Send + Sync + 'static,
    ) -> Self {
        self.namer = Arc::new(namer);
        self
    }

    /// Serve `/metrics` from this Prometheus handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the axum router with all routes.
    pub fn router(&self) -> Result<Router, ServerError> {
        let state = AppState {
            dispatch: self.dispatch.clone(),
            headers: Arc::new(http::extra_headers(&self.config.headers)?),
            namer: Arc::clone(&self.namer),
            queue_capacity: self.config.queue_capacity,
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Ok(Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/publish", post(publish_handler))
            .route("/channels/close", post(close_channel_handler))
            .fallback(sse_handler)
            .layer(TraceLayer::new_for_http())
            .with_state(state))
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let router = self.router()?;
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let token = self.shutdown.token();

        info!(%addr, "flare server listening");
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
            info!("flare server stopped");
        });
        Ok((addr, handle))
    }

    /// Dispatch actor handle, for producers living in the same process.
    pub fn dispatch(&self) -> &Server {
        &self.dispatch
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
