//! Channel registry, fan-out and the single control loop that mutates them.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `client` | One subscriber: identity + bounded delivery queue |
//! | `channel` | Named topic owning its member clients |
//! | `options` | Retry hint, slow-client limit, connect/disconnect hooks |
//! | `server` | Dispatch actor and its cloneable [`Server`] handle |
//!
//! ## Data Flow
//!
//! transport → [`Server::connect`] → actor attaches [`Client`] to its
//! [`Channel`]; producers → [`Server::broadcast`] → actor → `Channel::send`
//! → each client's queue → [`ClientStream`] → transport write loop.

mod channel;
mod client;
mod options;
mod server;

pub use channel::{Channel, ChannelInfo, SendReport};
pub use client::{Client, ClientInfo, ClientStream, EnqueueOutcome};
pub use options::{ClientHook, ServerOptions};
pub use server::Server;
