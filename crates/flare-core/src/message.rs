//! Server-Sent-Events message record and its `text/event-stream` framing.
//!
//! A [`Message`] is immutable once handed to the broadcaster. The retry hint
//! is not chosen by producers: the dispatch actor stamps the server-wide
//! retry interval onto every message before fan-out.
//!
//! ## Framing
//!
//! ```text
//! id:<id>            (only when id is non-empty)
//! event:<event>      (only when event is set and non-empty)
//! retry:<millis>     (only when retry is non-zero)
//! data:<line 1>      (one line per payload line)
//! data:<line n>
//! <blank line>
//! ```

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;

/// One event record delivered to subscribers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawMessage")]
pub struct Message {
    /// Event id echoed back by browsers in `Last-Event-ID` on reconnect.
    pub id: String,
    /// Event name (`addEventListener` type); `None` means the default `message`.
    pub event: Option<String>,
    /// Payload lines. Each becomes one `data:` line.
    pub data: Vec<String>,
    /// Reconnect delay hint sent to the peer.
    pub retry: Option<Duration>,
}

impl Message {
    /// Create a message from a (possibly multi-line) payload.
    ///
    /// Lines are split on `\n`, `\r\n` and lone `\r`. A single trailing line
    /// break does not produce an extra empty line; an empty payload produces
    /// no data lines at all.
    #[must_use]
    pub fn new(data: impl AsRef<str>) -> Self {
        Self {
            data: split_lines(data.as_ref()),
            ..Self::default()
        }
    }

    /// Create a message from payload lines that are already split.
    #[must_use]
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            data: lines.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Set the event id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the event name.
    #[must_use]
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Set the retry hint.
    #[must_use]
    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Payload joined back with `\n`.
    pub fn payload(&self) -> String {
        self.data.join("\n")
    }

    /// Render the wire framing.
    pub fn render(&self) -> Bytes {
        Bytes::from(self.to_string())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = single_line(&self.id);
        if !id.is_empty() {
            writeln!(f, "id:{id}")?;
        }
        if let Some(event) = self.event.as_deref().map(single_line).filter(|e| !e.is_empty()) {
            writeln!(f, "event:{event}")?;
        }
        if let Some(retry) = self.retry.filter(|r| !r.is_zero()) {
            writeln!(f, "retry:{}", retry.as_millis())?;
        }
        for line in &self.data {
            if line.contains(['\r', '\n']) {
                for part in split_lines(line) {
                    writeln!(f, "data:{part}")?;
                }
            } else {
                writeln!(f, "data:{line}")?;
            }
        }
        f.write_str("\n")
    }
}

/// JSON shape accepted from producers: `data` is a single string.
#[derive(Deserialize)]
struct RawMessage {
    #[serde(default)]
    id: String,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    data: String,
}

impl From<RawMessage> for Message {
    fn from(raw: RawMessage) -> Self {
        let mut message = Message::new(&raw.data).with_id(raw.id);
        message.event = raw.event;
        message
    }
}

/// `id` and `event` are single-line fields: line breaks are removed so a
/// value can never start another field.
fn single_line(value: &str) -> Cow<'_, str> {
    if value.contains(['\r', '\n']) {
        Cow::Owned(value.replace(['\r', '\n'], ""))
    } else {
        Cow::Borrowed(value)
    }
}

fn split_lines(data: &str) -> Vec<String> {
    if data.is_empty() {
        return Vec::new();
    }
    let mut lines: Vec<String> = data
        .split("\r\n")
        .flat_map(|chunk| chunk.split(['\r', '\n']))
        .map(str::to_owned)
        .collect();
    if data.ends_with(['\r', '\n']) {
        let _ = lines.pop();
    }
    lines
}
