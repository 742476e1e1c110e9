//! Subscriber state and its delivery queue.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use flare_core::{ClientId, Message};
use futures::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Identity of a subscriber, cheap to clone.
///
/// The transport keeps one of these after handing the [`Client`] to the
/// dispatch actor so it can later report the disconnect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientInfo {
    /// Unique connection ID.
    pub id: ClientId,
    /// Channel this client subscribes to. Never changes.
    pub channel: String,
    /// `Last-Event-ID` sent by the peer on reconnect (empty if none).
    pub last_event_id: String,
    /// When the connection was accepted.
    pub connected_at: Instant,
}

impl ClientInfo {
    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Result of a single [`Client::enqueue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Message placed at the tail of the queue.
    Queued,
    /// Queue full; the message was discarded for this client.
    Dropped,
    /// Queue already closed (either side).
    Closed,
}

/// Server-side state of one subscriber connection.
///
/// Owned by exactly one [`Channel`](super::Channel) once connected. Dropping
/// or closing it ends the paired [`ClientStream`].
#[derive(Debug)]
pub struct Client {
    info: ClientInfo,
    tx: Option<mpsc::Sender<Arc<Message>>>,
    dropped: u64,
}

impl Client {
    /// Create a client and the stream its transport drains.
    ///
    /// `capacity` bounds the queue; a value of zero is treated as one.
    pub fn new(
        channel: impl Into<String>,
        last_event_id: impl Into<String>,
        capacity: usize,
    ) -> (Self, ClientStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let client = Self {
            info: ClientInfo {
                id: ClientId::new(),
                channel: channel.into(),
                last_event_id: last_event_id.into(),
                connected_at: Instant::now(),
            },
            tx: Some(tx),
            dropped: 0,
        };
        (client, ClientStream { rx })
    }

    /// Unique connection ID.
    pub fn id(&self) -> &ClientId {
        &self.info.id
    }

    /// Channel name.
    pub fn channel(&self) -> &str {
        &self.info.channel
    }

    /// Last event id reported by the peer.
    pub fn last_event_id(&self) -> &str {
        &self.info.last_event_id
    }

    /// Identity snapshot.
    pub fn info(&self) -> &ClientInfo {
        &self.info
    }

    /// Place a message at the tail of the queue without waiting.
    pub fn enqueue(&mut self, message: Arc<Message>) -> EnqueueOutcome {
        let Some(tx) = &self.tx else {
            return EnqueueOutcome::Closed;
        };
        match tx.try_send(message) {
            Ok(()) => EnqueueOutcome::Queued,
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                EnqueueOutcome::Dropped
            }
            Err(TrySendError::Closed(_)) => EnqueueOutcome::Closed,
        }
    }

    /// Close the queue. Messages already queued are still delivered, then
    /// the stream ends. Idempotent.
    pub fn close(&mut self) {
        self.tx = None;
    }

    /// Whether [`close`](Self::close) was called or the stream was dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().is_none_or(mpsc::Sender::is_closed)
    }

    /// Messages discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Consumer half of a client's queue.
///
/// Yields messages in enqueue order and ends once the client is closed or
/// dropped by the dispatch actor.
#[derive(Debug)]
pub struct ClientStream {
    rx: mpsc::Receiver<Arc<Message>>,
}

impl ClientStream {
    /// Wait for the next message; `None` means end-of-stream.
    pub async fn recv(&mut self) -> Option<Arc<Message>> {
        self.rx.recv().await
    }
}

impl Stream for ClientStream {
    type Item = Arc<Message>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn msg(data: &str) -> Arc<Message> {
        Arc::new(Message::new(data))
    }

    #[test]
    fn create_client() {
        let (client, _stream) = Client::new("/news", "41", 8);
        assert_eq!(client.channel(), "/news");
        assert_eq!(client.last_event_id(), "41");
        assert!(client.id().as_str().starts_with("client_"));
        assert!(!client.is_closed());
        assert_eq!(client.dropped(), 0);
    }

    #[test]
    fn clients_have_distinct_ids() {
        let (a, _sa) = Client::new("/x", "", 8);
        let (b, _sb) = Client::new("/x", "", 8);
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn delivers_in_fifo_order() {
        let (mut client, mut stream) = Client::new("/x", "", 8);
        for i in 0..5 {
            assert_eq!(client.enqueue(msg(&format!("m{i}"))), EnqueueOutcome::Queued);
        }
        for i in 0..5 {
            let m = stream.recv().await.unwrap();
            assert_eq!(m.data, vec![format!("m{i}")]);
        }
    }

    #[tokio::test]
    async fn close_ends_stream_after_pending_messages() {
        let (mut client, mut stream) = Client::new("/x", "", 8);
        let _ = client.enqueue(msg("last"));
        client.close();
        assert_eq!(stream.recv().await.unwrap().data, vec!["last"]);
        assert!(stream.recv().await.is_none());
    }

    #[test]
    fn close_is_idempotent() {
        let (mut client, _stream) = Client::new("/x", "", 8);
        client.close();
        client.close();
        assert!(client.is_closed());
        assert_eq!(client.enqueue(msg("late")), EnqueueOutcome::Closed);
    }

    #[tokio::test]
    async fn dropping_client_ends_stream() {
        let (client, mut stream) = Client::new("/x", "", 8);
        drop(client);
        assert!(stream.recv().await.is_none());
    }

    #[test]
    fn full_queue_drops_and_counts() {
        let (mut client, _stream) = Client::new("/x", "", 1);
        assert_eq!(client.enqueue(msg("a")), EnqueueOutcome::Queued);
        assert_eq!(client.enqueue(msg("b")), EnqueueOutcome::Dropped);
        assert_eq!(client.enqueue(msg("c")), EnqueueOutcome::Dropped);
        assert_eq!(client.dropped(), 2);
    }

    #[test]
    fn enqueue_after_stream_dropped_reports_closed() {
        let (mut client, stream) = Client::new("/x", "", 4);
        drop(stream);
        assert!(client.is_closed());
        assert_eq!(client.enqueue(msg("a")), EnqueueOutcome::Closed);
        assert_eq!(client.dropped(), 0);
    }

    #[test]
    fn zero_capacity_is_usable() {
        let (mut client, _stream) = Client::new("/x", "", 0);
        assert_eq!(client.enqueue(msg("a")), EnqueueOutcome::Queued);
    }

    #[tokio::test]
    async fn stream_impl_yields_until_closed() {
        let (mut client, stream) = Client::new("/x", "", 8);
        let _ = client.enqueue(msg("1"));
        let _ = client.enqueue(msg("2"));
        client.close();
        let all: Vec<Arc<Message>> = stream.collect().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].data, vec!["2"]);
    }

    #[tokio::test]
    async fn shared_message_not_cloned() {
        let (mut a, mut sa) = Client::new("/x", "", 4);
        let (mut b, mut sb) = Client::new("/x", "", 4);
        let m = msg("shared");
        let _ = a.enqueue(Arc::clone(&m));
        let _ = b.enqueue(Arc::clone(&m));
        drop(m);
        let ma = sa.recv().await.unwrap();
        let mb = sb.recv().await.unwrap();
        assert!(Arc::ptr_eq(&ma, &mb));
    }

    #[test]
    fn info_is_snapshot_of_identity() {
        let (client, _stream) = Client::new("/x", "9", 4);
        let info = client.info().clone();
        assert_eq!(&info.id, client.id());
        assert_eq!(info.channel, "/x");
        assert_eq!(info.last_event_id, "9");
        assert!(info.age() < Duration::from_secs(5));
    }
}
