//! Socket.IO v4 text framing over an Engine.IO WebSocket transport
//!
//! Only the default namespace and text frames are supported. An event frame
//! looks like `42["chat_message",{"token":"...","message":"..."}]`: Engine.IO
//! type `4` (message), Socket.IO type `2` (event), then a JSON array of event
//! name and payload.

use crate::error::ClientError;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("empty frame")]
    Empty,

    #[error("unknown packet type {0:?}")]
    UnknownType(String),

    #[error("unsupported namespace in frame {0:?}")]
    Namespace(String),

    #[error("malformed payload: {0}")]
    Payload(String),
}

impl From<PacketError> for ClientError {
    fn from(e: PacketError) -> Self {
        Self::Chat(e.to_string())
    }
}

/// A decoded frame
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Engine.IO handshake carrying session parameters
    Open(Value),
    Close,
    Ping,
    Pong,
    Noop,
    /// Namespace connect request (client) or acknowledgement (server)
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, data: Value },
    ConnectError(Value),
}

impl Packet {
    pub fn event(name: impl Into<String>, data: Value) -> Self {
        Self::Event {
            name: name.into(),
            data,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Self::Open(data) => format!("0{data}"),
            Self::Close => "1".into(),
            Self::Ping => "2".into(),
            Self::Pong => "3".into(),
            Self::Noop => "6".into(),
            Self::Connect(None) => "40".into(),
            Self::Connect(Some(data)) => format!("40{data}"),
            Self::Disconnect => "41".into(),
            Self::Event { name, data } => {
                format!("42{}", Value::Array(vec![Value::String(name.clone()), data.clone()]))
            }
            Self::ConnectError(data) => format!("44{data}"),
        }
    }

    pub fn decode(frame: &str) -> Result<Self, PacketError> {
        let mut chars = frame.chars();
        let engine = chars.next().ok_or(PacketError::Empty)?;
        let rest = chars.as_str();

        match engine {
            '0' => Ok(Self::Open(parse_json(rest)?)),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping),
            '3' => Ok(Self::Pong),
            '6' => Ok(Self::Noop),
            '4' => Self::decode_socket(rest),
            other => Err(PacketError::UnknownType(other.to_string())),
        }
    }

    fn decode_socket(frame: &str) -> Result<Self, PacketError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        let rest = chars.as_str();
        if rest.starts_with('/') {
            return Err(PacketError::Namespace(frame.to_string()));
        }

        match kind {
            '0' if rest.is_empty() => Ok(Self::Connect(None)),
            '0' => Ok(Self::Connect(Some(parse_json(rest)?))),
            '1' => Ok(Self::Disconnect),
            '2' => {
                // Skip an optional ack id preceding the payload
                let payload = rest.trim_start_matches(|c: char| c.is_ascii_digit());
                let Value::Array(mut items) = parse_json(payload)? else {
                    return Err(PacketError::Payload("event payload is not an array".into()));
                };
                if items.is_empty() {
                    return Err(PacketError::Payload("event without a name".into()));
                }
                let Value::String(name) = items.remove(0) else {
                    return Err(PacketError::Payload("event name is not a string".into()));
                };
                let data = if items.is_empty() {
                    Value::Null
                } else {
                    items.remove(0)
                };
                Ok(Self::Event { name, data })
            }
            '4' => Ok(Self::ConnectError(parse_json(rest)?)),
            other => Err(PacketError::UnknownType(format!("4{other}"))),
        }
    }
}

fn parse_json(raw: &str) -> Result<Value, PacketError> {
    serde_json::from_str(raw).map_err(|e| PacketError::Payload(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encodes_chat_message_event() {
        let packet = Packet::event("chat_message", json!({ "token": "A1", "message": "hello" }));
        let frame = packet.encode();
        assert!(frame.starts_with("42[\"chat_message\","));
        assert_eq!(Packet::decode(&frame).unwrap(), packet);
    }

    #[test]
    fn decodes_engine_control_frames() {
        assert_eq!(Packet::decode("2").unwrap(), Packet::Ping);
        assert_eq!(Packet::decode("3").unwrap(), Packet::Pong);
        assert_eq!(Packet::decode("40").unwrap(), Packet::Connect(None));
        assert_eq!(
            Packet::decode(r#"40{"sid":"abc"}"#).unwrap(),
            Packet::Connect(Some(json!({ "sid": "abc" })))
        );
        assert!(matches!(
            Packet::decode(r#"0{"sid":"x","pingInterval":25000}"#).unwrap(),
            Packet::Open(_)
        ));
    }

    #[test]
    fn event_with_ack_id_and_no_payload() {
        assert_eq!(
            Packet::decode(r#"4212["ping_me"]"#).unwrap(),
            Packet::event("ping_me", Value::Null)
        );
    }

    #[test]
    fn rejects_malformed_frames() {
        assert_eq!(Packet::decode(""), Err(PacketError::Empty));
        assert!(matches!(Packet::decode("9"), Err(PacketError::UnknownType(_))));
        assert!(matches!(
            Packet::decode(r#"42/admin,["x"]"#),
            Err(PacketError::Namespace(_))
        ));
        assert!(matches!(Packet::decode(r#"42{"a":1}"#), Err(PacketError::Payload(_))));
        assert!(matches!(Packet::decode("42[1]"), Err(PacketError::Payload(_))));
    }
}
