//! # flare-core
//!
//! Foundation types shared by the flare crates:
//!
//! - **Messages**: [`Message`], an immutable Server-Sent-Events record with a
//!   pure [`Message::render`] into the `text/event-stream` framing
//! - **Branded IDs**: [`ClientId`] identifies one subscriber connection

#![deny(unsafe_code)]

pub mod ids;
pub mod message;

pub use ids::ClientId;
pub use message::Message;
