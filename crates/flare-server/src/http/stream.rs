//! SSE stream endpoint.
//!
//! Every path not claimed by an admin route lands here. A `GET` becomes a
//! subscriber of the channel its [`ChannelNamer`](super::ChannelNamer)
//! picks; the response body drains that subscriber's queue.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::Stream;
use tracing::debug;

use crate::dispatch::{Client, ClientInfo, ClientStream, Server};
use crate::server::AppState;

/// Request header carrying the id of the last event a reconnecting peer saw.
pub const LAST_EVENT_ID: HeaderName = HeaderName::from_static("last-event-id");

/// Fallback handler: `GET` streams, `OPTIONS` answers `200`, anything else `405`.
///
/// Configured extra headers go on every response; the event-stream headers
/// are written after them and win on conflict.
pub async fn sse_handler(State(state): State<AppState>, request: Request) -> Response {
    let (parts, _body) = request.into_parts();

    let mut response = match parts.method {
        Method::GET => open_stream(&state, &parts),
        Method::OPTIONS => StatusCode::OK.into_response(),
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    };

    let headers = response.headers_mut();
    for (name, value) in state.headers.iter() {
        let _ = headers.insert(name.clone(), value.clone());
    }
    if parts.method == Method::GET {
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
        let _ = headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        let _ = headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    }
    response
}

fn open_stream(state: &AppState, parts: &Parts) -> Response {
    let channel = (state.namer)(parts);
    let last_event_id = parts
        .headers
        .get(LAST_EVENT_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let (client, stream) = Client::new(channel, last_event_id, state.queue_capacity);
    let info = client.info().clone();
    debug!(channel = %info.channel, client_id = %info.id, "stream opened");
    state.dispatch.connect(client);

    Response::new(Body::from_stream(EventStream::new(
        stream,
        state.dispatch.clone(),
        info,
    )))
}

/// Response body for one subscriber: rendered messages until the queue
/// closes. Dropping it reports the disconnect.
pub struct EventStream {
    inner: ClientStream,
    _guard: DisconnectGuard,
}

impl EventStream {
    /// Wrap `inner`; `info` is reported to `dispatch` when this is dropped.
    pub fn new(inner: ClientStream, dispatch: Server, info: ClientInfo) -> Self {
        Self {
            inner,
            _guard: DisconnectGuard { dispatch, info },
        }
    }
}

impl Stream for EventStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner)
            .poll_next(cx)
            .map(|next| next.map(|message| Ok(message.render())))
    }
}

/// Fires exactly one disconnect, whether the peer went away or the
/// dispatcher ended the stream first.
struct DisconnectGuard {
    dispatch: Server,
    info: ClientInfo,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        debug!(channel = %self.info.channel, client_id = %self.info.id, "stream closed");
        self.dispatch.disconnect(&self.info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ServerOptions;
    use flare_core::Message;
    use futures::StreamExt;

    #[tokio::test]
    async fn event_stream_renders_messages() {
        let dispatch = Server::new(ServerOptions::default());
        let (client, stream) = Client::new("/a", "", 8);
        let info = client.info().clone();
        dispatch.connect(client);
        let mut body = EventStream::new(stream, dispatch.clone(), info);

        dispatch.broadcast("/a", Message::new("hi").with_id("7"));
        let chunk = body.next().await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"id:7\ndata:hi\n\n");
    }

    #[tokio::test]
    async fn dropping_event_stream_disconnects_once() {
        let dispatch = Server::new(ServerOptions::default());
        let (client, stream) = Client::new("/a", "", 8);
        let info = client.info().clone();
        dispatch.connect(client);
        assert_eq!(dispatch.client_count().await, 1);

        drop(EventStream::new(stream, dispatch.clone(), info));
        assert_eq!(dispatch.client_count().await, 0);
        assert!(!dispatch.has_channel("/a").await);
    }

    #[tokio::test]
    async fn event_stream_ends_when_channel_closes() {
        let dispatch = Server::new(ServerOptions::default());
        let (client, stream) = Client::new("/a", "", 8);
        let info = client.info().clone();
        dispatch.connect(client);
        let mut body = EventStream::new(stream, dispatch.clone(), info);

        dispatch.close_channel("/a");
        assert!(body.next().await.is_none());
    }
}
