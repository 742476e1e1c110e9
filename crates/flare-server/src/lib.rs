//! # flare-server
//!
//! Server-Sent-Events broadcast layer.
//!
//! - [`dispatch`]: the dispatch actor that owns every channel and client and
//!   serializes connect, disconnect, broadcast, channel-close and shutdown
//! - [`http`]: axum transport adapter turning requests into subscribers and
//!   draining their queues onto the response body
//! - Health, Prometheus metrics and graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod health;
pub mod http;
pub mod metrics;
pub mod server;
pub mod shutdown;

pub use config::ServerConfig;
pub use dispatch::{
    Channel, ChannelInfo, Client, ClientHook, ClientInfo, ClientStream, Server, ServerOptions,
};
pub use errors::ServerError;
pub use server::FlareServer;
