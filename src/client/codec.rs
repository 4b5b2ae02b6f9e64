//! Conversion between websocket frames and typed messages. This is the only
//! place raw payloads are parsed.

use gesture_realtime_types::{ClientEvent, MessageKind, ServerEvent};
use tokio_tungstenite::tungstenite::Message;

/// A parsed inbound message.
#[derive(Debug, Clone)]
pub enum Inbound {
    Event(ServerEvent),
    /// An opaque binary media frame.
    Media(Vec<u8>),
}

impl Inbound {
    pub fn kind(&self) -> MessageKind {
        match self {
            Inbound::Event(event) => event.kind(),
            Inbound::Media(_) => MessageKind::Media,
        }
    }
}

/// A message to send to the backend.
#[derive(Debug, Clone)]
pub enum Outbound {
    Event(ClientEvent),
    Media(Vec<u8>),
}

impl From<ClientEvent> for Outbound {
    fn from(value: ClientEvent) -> Self {
        Outbound::Event(value)
    }
}

#[derive(Debug)]
pub(crate) enum Frame {
    Inbound(Inbound),
    Close(Option<String>),
    /// Ping/pong and raw frames; tungstenite answers pings itself.
    Control,
}

/// Why an inbound frame could not become an [`Inbound`]. Neither case is
/// fatal to the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DecodeError {
    /// Not JSON, no `type` tag, or a tag outside the known set.
    Unknown { tag: Option<String>, raw: String },
    /// A known tag whose fields do not match.
    Malformed { kind: MessageKind, reason: String },
}

pub(crate) fn decode(message: Message) -> Result<Frame, DecodeError> {
    match message {
        Message::Text(text) => decode_text(text).map(Frame::Inbound),
        Message::Binary(bytes) => Ok(Frame::Inbound(Inbound::Media(bytes))),
        Message::Close(reason) => Ok(Frame::Close(reason.map(|v| format!("{:?}", v)))),
        _ => Ok(Frame::Control),
    }
}

fn decode_text(text: String) -> Result<Inbound, DecodeError> {
    let json = match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => json,
        Err(_) => return Err(DecodeError::Unknown { tag: None, raw: text }),
    };

    let tag = json.get("type").and_then(|v| v.as_str()).map(str::to_string);
    tracing::debug!("received message: {}", tag.as_deref().unwrap_or("unknown"));

    let Some(kind) = tag.as_deref().and_then(MessageKind::from_tag) else {
        return Err(DecodeError::Unknown { tag, raw: text });
    };

    serde_json::from_value::<ServerEvent>(json)
        .map(Inbound::Event)
        .map_err(|e| DecodeError::Malformed {
            kind,
            reason: e.to_string(),
        })
}

pub(crate) fn encode(message: &Outbound) -> Result<Message, serde_json::Error> {
    match message {
        Outbound::Event(event) => Ok(Message::Text(serde_json::to_string(event)?)),
        Outbound::Media(bytes) => Ok(Message::Binary(bytes.clone())),
    }
}
