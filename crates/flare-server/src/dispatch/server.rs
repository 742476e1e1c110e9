//! Dispatch actor: linearized registry mutations via MPSC serialization.
//!
//! Every connect, disconnect, broadcast, channel-close, restart and shutdown
//! is a [`Command`] sent to one consumer task that exclusively owns the
//! channel map. "Look up channel, decide, mutate" is therefore atomic with
//! respect to every other request, and a broadcast can never enqueue into a
//! channel that a concurrent disconnect is deleting.
//!
//! The mailbox is unbounded so that mutations are plain synchronous calls:
//! producers never wait on the actor, and transports can report a
//! disconnect from `Drop`.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use flare_core::{ClientId, Message};
use metrics::{counter, gauge};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::channel::{Channel, ChannelInfo, SendReport};
use super::client::{Client, ClientInfo};
use super::options::{ClientHook, ServerOptions};
use crate::metrics::{
    SSE_BROADCASTS_TOTAL, SSE_CHANNELS_ACTIVE, SSE_CLIENTS_ACTIVE, SSE_CONNECTIONS_TOTAL,
    SSE_DISCONNECTIONS_TOTAL, SSE_MESSAGES_DROPPED_TOTAL, SSE_MESSAGES_ENQUEUED_TOTAL,
    SSE_SLOW_CLIENT_EVICTIONS_TOTAL,
};

/// Request processed by the control loop.
enum Command {
    Connect(Client),
    Disconnect(ClientInfo),
    Broadcast { channel: String, message: Message },
    CloseChannel(String),
    Restart,
    Shutdown(oneshot::Sender<()>),
    ClientCount(oneshot::Sender<usize>),
    HasChannel(String, oneshot::Sender<bool>),
    ChannelInfo(String, oneshot::Sender<Option<ChannelInfo>>),
    Channels(oneshot::Sender<Vec<String>>),
}

/// Handle to the dispatch actor. Cheap to clone.
///
/// Dropping every handle stops the actor and closes all clients.
#[derive(Clone, Debug)]
pub struct Server {
    tx: mpsc::UnboundedSender<Command>,
}

impl Server {
    /// Spawn the control loop on the current tokio runtime.
    pub fn new(options: ServerOptions) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = options.shutdown.clone();
        let _handle = tokio::spawn(run(rx, Dispatcher::new(options), cancel));
        Self { tx }
    }

    /// Register a subscriber, creating its channel if needed.
    pub fn connect(&self, client: Client) {
        self.send(Command::Connect(client));
    }

    /// Remove a subscriber. Unknown or already-removed clients are ignored.
    pub fn disconnect(&self, client: &ClientInfo) {
        self.send(Command::Disconnect(client.clone()));
    }

    /// Deliver `message` to every member of `channel`, or to every channel
    /// when `channel` is empty. Unknown channels are ignored.
    pub fn broadcast(&self, channel: impl Into<String>, message: Message) {
        self.send(Command::Broadcast {
            channel: channel.into(),
            message,
        });
    }

    /// Remove a channel and end every member stream. Unknown names are ignored.
    pub fn close_channel(&self, name: impl Into<String>) {
        self.send(Command::CloseChannel(name.into()));
    }

    /// Close every channel and client but keep accepting connections.
    pub fn restart(&self) {
        self.send(Command::Restart);
    }

    /// Close every channel and client, then stop the actor.
    ///
    /// Resolves once teardown is complete. Later calls on any handle are
    /// logged and ignored.
    pub async fn shutdown(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Shutdown(reply_tx));
        let _ = reply_rx.await;
    }

    /// Total clients across all channels.
    pub async fn client_count(&self) -> usize {
        self.query(Command::ClientCount).await
    }

    /// Whether a channel named `name` currently exists.
    pub async fn has_channel(&self, name: impl Into<String>) -> bool {
        let name = name.into();
        self.query(|reply| Command::HasChannel(name, reply)).await
    }

    /// Snapshot of the channel named `name`.
    pub async fn channel(&self, name: impl Into<String>) -> Option<ChannelInfo> {
        let name = name.into();
        self.query(|reply| Command::ChannelInfo(name, reply)).await
    }

    /// Names of all existing channels, sorted.
    pub async fn channels(&self) -> Vec<String> {
        self.query(Command::Channels).await
    }

    /// Whether the actor has stopped.
    pub fn is_stopped(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            debug!("dispatcher stopped, command ignored");
        }
    }

    /// Round-trip a query through the loop; a stopped actor answers `T::default()`.
    async fn query<T: Default>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> T {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(make(reply_tx));
        reply_rx.await.unwrap_or_default()
    }
}

/// Control loop: one command at a time until shutdown.
async fn run(
    mut rx: mpsc::UnboundedReceiver<Command>,
    mut dispatcher: Dispatcher,
    cancel: CancellationToken,
) {
    info!("dispatcher started");
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                dispatcher.close_all();
                break;
            }
            command = rx.recv() => {
                let Some(command) = command else {
                    dispatcher.close_all();
                    break;
                };
                if let ControlFlow::Break(reply) = dispatcher.handle(command) {
                    let _ = reply.send(());
                    break;
                }
            }
        }
    }
    // Pending commands are dropped: queued clients see end-of-stream and
    // queued queries answer with defaults.
    rx.close();
    info!("dispatcher stopped");
}

/// State owned by the control loop.
struct Dispatcher {
    channels: HashMap<String, Channel>,
    clients: usize,
    retry_interval: Duration,
    drop_limit: u64,
    on_connect: Option<ClientHook>,
    on_disconnect: Option<ClientHook>,
}

impl Dispatcher {
    fn new(options: ServerOptions) -> Self {
        Self {
            channels: HashMap::new(),
            clients: 0,
            retry_interval: options.retry_interval,
            drop_limit: options.drop_limit,
            on_connect: options.on_connect,
            on_disconnect: options.on_disconnect,
        }
    }

    /// Apply one command; `Break` carries the shutdown acknowledgement.
    fn handle(&mut self, command: Command) -> ControlFlow<oneshot::Sender<()>> {
        match command {
            Command::Connect(client) => self.connect(client),
            Command::Disconnect(info) => self.disconnect(&info.channel, &info.id),
            Command::Broadcast { channel, message } => self.broadcast(&channel, message),
            Command::CloseChannel(name) => self.close_channel(&name),
            Command::Restart => {
                info!("restarting: closing all channels");
                self.close_all();
            }
            Command::Shutdown(reply) => {
                self.close_all();
                return ControlFlow::Break(reply);
            }
            Command::ClientCount(reply) => {
                let _ = reply.send(self.clients);
            }
            Command::HasChannel(name, reply) => {
                let _ = reply.send(self.channels.contains_key(&name));
            }
            Command::ChannelInfo(name, reply) => {
                let _ = reply.send(self.channels.get(&name).map(Channel::info));
            }
            Command::Channels(reply) => {
                let mut names: Vec<String> = self.channels.keys().cloned().collect();
                names.sort();
                let _ = reply.send(names);
            }
        }
        ControlFlow::Continue(())
    }

    fn connect(&mut self, client: Client) {
        let info = client.info().clone();
        let channel = self
            .channels
            .entry(info.channel.clone())
            .or_insert_with(|| {
                debug!(channel = %info.channel, "channel created");
                Channel::new(info.channel.clone())
            });
        channel.add(client);
        self.clients += 1;
        debug!(channel = %info.channel, client_id = %info.id, "client connected");
        counter!(SSE_CONNECTIONS_TOTAL).increment(1);
        self.record_gauges();

        if let Some(hook) = &self.on_connect {
            hook(&info);
        }
    }

    fn disconnect(&mut self, name: &str, id: &ClientId) {
        let Some(channel) = self.channels.get_mut(name) else {
            return;
        };
        let Some(mut client) = channel.remove(id) else {
            return;
        };
        if let Some(hook) = &self.on_disconnect {
            hook(client.info());
        }
        client.close();
        self.clients -= 1;
        debug!(channel = name, client_id = %id, "client disconnected");
        counter!(SSE_DISCONNECTIONS_TOTAL).increment(1);

        if channel.is_empty() {
            let _ = self.channels.remove(name);
            debug!(channel = name, "channel has no clients, removed");
        }
        self.record_gauges();
    }

    fn broadcast(&mut self, target: &str, mut message: Message) {
        message.retry = Some(self.retry_interval);
        let message = Arc::new(message);
        counter!(SSE_BROADCASTS_TOTAL).increment(1);

        let mut evicted = Vec::new();
        if target.is_empty() {
            debug!(channels = self.channels.len(), "broadcasting message to all channels");
            for channel in self.channels.values_mut() {
                let report = channel.send(&message, self.drop_limit);
                record_send(channel.name(), report, &mut evicted);
            }
        } else if let Some(channel) = self.channels.get_mut(target) {
            let report = channel.send(&message, self.drop_limit);
            debug!(channel = target, recipients = report.delivered, "message sent to channel");
            record_send(target, report, &mut evicted);
        } else {
            debug!(channel = target, "message not sent, channel has no clients");
        }

        for (channel, id) in evicted {
            counter!(SSE_SLOW_CLIENT_EVICTIONS_TOTAL).increment(1);
            self.disconnect(&channel, &id);
        }
    }

    fn close_channel(&mut self, name: &str) {
        if let Some(mut channel) = self.channels.remove(name) {
            let closed = channel.close();
            self.clients -= closed.len();
            debug!(channel = name, clients = closed.len(), "channel closed");
            self.record_gauges();
        } else {
            debug!(channel = name, "close requested for unknown channel");
        }
    }

    fn close_all(&mut self) {
        let names: Vec<String> = self.channels.keys().cloned().collect();
        for name in names {
            self.close_channel(&name);
        }
    }

    fn record_gauges(&self) {
        gauge!(SSE_CLIENTS_ACTIVE).set(self.clients as f64);
        gauge!(SSE_CHANNELS_ACTIVE).set(self.channels.len() as f64);
    }
}

fn record_send(channel: &str, report: SendReport, evicted: &mut Vec<(String, ClientId)>) {
    counter!(SSE_MESSAGES_ENQUEUED_TOTAL).increment(report.delivered as u64);
    if report.dropped > 0 {
        counter!(SSE_MESSAGES_DROPPED_TOTAL).increment(report.dropped as u64);
    }
    evicted.extend(report.evict.into_iter().map(|id| (channel.to_owned(), id)));
}
