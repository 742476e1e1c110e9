//! Named topic and its member clients.

use std::collections::HashMap;
use std::sync::Arc;

use flare_core::{ClientId, Message};
use tracing::warn;

use super::client::{Client, ClientInfo, EnqueueOutcome};

/// A named topic owning the clients subscribed to it.
///
/// Only the dispatch actor touches a `Channel`, so membership needs no lock.
#[derive(Debug)]
pub struct Channel {
    name: String,
    clients: HashMap<ClientId, Client>,
}

/// Snapshot of a channel returned by introspection queries.
#[derive(Clone, Debug)]
pub struct ChannelInfo {
    /// Channel name.
    pub name: String,
    /// Members at the time of the query.
    pub clients: Vec<ClientInfo>,
}

impl ChannelInfo {
    /// Member count at the time of the query.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SendReport {
    /// Members whose queue accepted the message.
    pub delivered: usize,
    /// Members whose queue was full.
    pub dropped: usize,
    /// Members that crossed the drop limit and must be disconnected.
    pub evict: Vec<ClientId>,
}

impl Channel {
    /// Create an empty channel.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clients: HashMap::new(),
        }
    }

    /// Channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a member.
    pub fn add(&mut self, client: Client) {
        let _ = self.clients.insert(client.id().clone(), client);
    }

    /// Remove a member, returning it if it was present.
    pub fn remove(&mut self, id: &ClientId) -> Option<Client> {
        self.clients.remove(id)
    }

    /// Whether `id` is a member.
    pub fn contains(&self, id: &ClientId) -> bool {
        self.clients.contains_key(id)
    }

    /// Member count.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether the channel has no members.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Enqueue `message` on every member without blocking.
    ///
    /// With a non-zero `drop_limit`, members whose lifetime drop count
    /// reaches it are listed in [`SendReport::evict`].
    pub fn send(&mut self, message: &Arc<Message>, drop_limit: u64) -> SendReport {
        let mut report = SendReport::default();
        for client in self.clients.values_mut() {
            match client.enqueue(Arc::clone(message)) {
                EnqueueOutcome::Queued => report.delivered += 1,
                EnqueueOutcome::Dropped => {
                    report.dropped += 1;
                    let drops = client.dropped();
                    if drop_limit > 0 && drops >= drop_limit {
                        warn!(channel = %self.name, client_id = %client.id(), drops, "disconnecting slow client");
                        report.evict.push(client.id().clone());
                    } else {
                        warn!(channel = %self.name, client_id = %client.id(), total_drops = drops, "client queue full, message dropped");
                    }
                }
                // Peer already gone; its disconnect is on the way.
                EnqueueOutcome::Closed => {}
            }
        }
        report
    }

    /// Close every member queue and empty the membership.
    ///
    /// Returns the members that were closed.
    pub fn close(&mut self) -> Vec<Client> {
        self.clients
            .drain()
            .map(|(_, mut client)| {
                client.close();
                client
            })
            .collect()
    }

    /// Snapshot for introspection.
    pub fn info(&self) -> ChannelInfo {
        let mut clients: Vec<ClientInfo> =
            self.clients.values().map(|c| c.info().clone()).collect();
        clients.sort_by(|a, b| a.id.cmp(&b.id));
        ChannelInfo {
            name: self.name.clone(),
            clients,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::client::ClientStream;

    fn member(channel: &mut Channel, capacity: usize) -> (ClientId, ClientStream) {
        let (client, stream) = Client::new(channel.name().to_owned(), "", capacity);
        let id = client.id().clone();
        channel.add(client);
        (id, stream)
    }

    fn msg(data: &str) -> Arc<Message> {
        Arc::new(Message::new(data))
    }

    #[test]
    fn new_channel_is_empty() {
        let ch = Channel::new("/news");
        assert_eq!(ch.name(), "/news");
        assert!(ch.is_empty());
        assert_eq!(ch.len(), 0);
    }

    #[test]
    fn add_and_remove_members() {
        let mut ch = Channel::new("/news");
        let (a, _sa) = member(&mut ch, 4);
        let (b, _sb) = member(&mut ch, 4);
        assert_eq!(ch.len(), 2);
        assert!(ch.contains(&a));

        assert!(ch.remove(&a).is_some());
        assert!(!ch.contains(&a));
        assert!(ch.contains(&b));
        assert_eq!(ch.len(), 1);
    }

    #[test]
    fn remove_unknown_is_noop() {
        let mut ch = Channel::new("/news");
        let (_a, _sa) = member(&mut ch, 4);
        assert!(ch.remove(&ClientId::from("client_missing")).is_none());
        assert_eq!(ch.len(), 1);
    }

    #[tokio::test]
    async fn send_reaches_every_member() {
        let mut ch = Channel::new("/news");
        let (_a, mut sa) = member(&mut ch, 4);
        let (_b, mut sb) = member(&mut ch, 4);

        let report = ch.send(&msg("hello"), 0);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.dropped, 0);
        assert!(report.evict.is_empty());

        assert_eq!(sa.recv().await.unwrap().data, vec!["hello"]);
        assert_eq!(sb.recv().await.unwrap().data, vec!["hello"]);
    }

    #[test]
    fn send_to_empty_channel() {
        let mut ch = Channel::new("/quiet");
        assert_eq!(ch.send(&msg("x"), 0), SendReport::default());
    }

    #[tokio::test]
    async fn full_queue_only_affects_that_member() {
        let mut ch = Channel::new("/news");
        let (_slow, _slow_rx) = member(&mut ch, 1);
        let (_fast, mut fast_rx) = member(&mut ch, 8);

        let _ = ch.send(&msg("1"), 0);
        let report = ch.send(&msg("2"), 0);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 1);
        assert!(report.evict.is_empty());

        assert_eq!(fast_rx.recv().await.unwrap().data, vec!["1"]);
        assert_eq!(fast_rx.recv().await.unwrap().data, vec!["2"]);
    }

    #[test]
    fn slow_member_reported_at_drop_limit() {
        let mut ch = Channel::new("/news");
        let (slow, _slow_rx) = member(&mut ch, 1);
        let (_fast, _fast_rx) = member(&mut ch, 64);

        let _ = ch.send(&msg("fill"), 3);
        assert!(ch.send(&msg("d1"), 3).evict.is_empty());
        assert!(ch.send(&msg("d2"), 3).evict.is_empty());
        let report = ch.send(&msg("d3"), 3);
        assert_eq!(report.evict, vec![slow]);
    }

    #[test]
    fn zero_drop_limit_never_evicts() {
        let mut ch = Channel::new("/news");
        let (_slow, _rx) = member(&mut ch, 1);
        for _ in 0..50 {
            assert!(ch.send(&msg("x"), 0).evict.is_empty());
        }
    }

    #[tokio::test]
    async fn close_ends_all_member_streams() {
        let mut ch = Channel::new("/news");
        let (_a, mut sa) = member(&mut ch, 4);
        let (_b, mut sb) = member(&mut ch, 4);

        let closed = ch.close();
        assert_eq!(closed.len(), 2);
        assert!(closed.iter().all(Client::is_closed));
        assert!(ch.is_empty());
        drop(closed);

        assert!(sa.recv().await.is_none());
        assert!(sb.recv().await.is_none());
    }

    #[test]
    fn close_twice_is_harmless() {
        let mut ch = Channel::new("/news");
        let (_a, _sa) = member(&mut ch, 4);
        assert_eq!(ch.close().len(), 1);
        assert!(ch.close().is_empty());
    }

    #[test]
    fn info_lists_members() {
        let mut ch = Channel::new("/news");
        let (a, _sa) = member(&mut ch, 4);
        let (b, _sb) = member(&mut ch, 4);
        let info = ch.info();
        assert_eq!(info.name, "/news");
        assert_eq!(info.client_count(), 2);
        let ids: Vec<&ClientId> = info.clients.iter().map(|c| &c.id).collect();
        assert!(ids.contains(&&a));
        assert!(ids.contains(&&b));
    }
}
