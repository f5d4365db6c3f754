//! Text frame codec.
//!
//! The socket carries two kinds of text frames:
//!
//! - **control frames**: bare protocol digits, optionally followed by a JSON
//!   object (`0{...}` open, `2` ping, `3` pong, `40` namespace connect or its
//!   confirmation, `41` namespace disconnect, `44{...}` connect error);
//! - **event frames**: `42[name, payload, sequence?]`, optionally with a
//!   `/namespace,` segment and an acknowledgement id between the prefix and
//!   the array.
//!
//! [`Frame::parse`] strips all protocol prefixes; [`Frame::encode`] adds them
//! back.

use serde_json::Value;

use crate::coerce;
use crate::WireError;

/// Parameters announced by the server in its open frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpenInfo {
    /// Server-assigned socket session id.
    pub sid: Option<String>,
    /// Server's transport-level ping interval.
    pub ping_interval_ms: Option<u64>,
    /// Server's transport-level ping timeout.
    pub ping_timeout_ms: Option<u64>,
}

impl OpenInfo {
    fn from_json(value: &Value) -> Self {
        Self {
            sid: coerce::field_str(value, "sid").map(str::to_string),
            ping_interval_ms: coerce::field_u64(value, "pingInterval"),
            ping_timeout_ms: coerce::field_u64(value, "pingTimeout"),
        }
    }

    fn to_json(&self) -> Value {
        let mut obj = serde_json::Map::new();
        if let Some(sid) = &self.sid {
            obj.insert("sid".into(), Value::from(sid.clone()));
        }
        if let Some(v) = self.ping_interval_ms {
            obj.insert("pingInterval".into(), Value::from(v));
        }
        if let Some(v) = self.ping_timeout_ms {
            obj.insert("pingTimeout".into(), Value::from(v));
        }
        Value::Object(obj)
    }
}

/// A named event with its payload and optional integer sequence tag.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFrame {
    /// Event name, e.g. `game/123/move`.
    pub name: String,
    /// Event payload (`Null` when absent).
    pub payload: Value,
    /// Optional sequence number carried as the third array element.
    pub sequence: Option<u64>,
}

impl EventFrame {
    /// Create an untagged event.
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
            sequence: None,
        }
    }

    /// Attach a sequence tag.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }
}

/// One decoded text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Transport open (`0`), sent once by the server after the socket opens.
    Open(OpenInfo),
    /// Transport close (`1`).
    Close,
    /// Transport ping (`2`), with optional probe data.
    Ping(Option<String>),
    /// Transport pong (`3`), with optional probe data.
    Pong(Option<String>),
    /// Namespace connect (`40`). Sent bare by the client; the server's
    /// confirmation carries a JSON object.
    Connect(Option<Value>),
    /// Namespace disconnect (`41`).
    Disconnect,
    /// Namespace connect refused (`44`).
    ConnectError(Option<Value>),
    /// Application event (`42[...]`).
    Event(EventFrame),
}

impl Frame {
    /// Decode a text frame.
    pub fn parse(text: &str) -> Result<Self, WireError> {
        let text = text.trim();
        let mut chars = text.chars();
        let packet = chars.next().ok_or(WireError::EmptyFrame)?;
        let rest = chars.as_str();

        match packet {
            '0' => {
                let info = optional_json(rest)?
                    .map(|v| OpenInfo::from_json(&v))
                    .unwrap_or_default();
                Ok(Frame::Open(info))
            }
            '1' => Ok(Frame::Close),
            '2' => Ok(Frame::Ping(non_empty(rest))),
            '3' => Ok(Frame::Pong(non_empty(rest))),
            '4' => parse_socket_packet(rest),
            other => Err(WireError::UnknownPacket(other.to_string())),
        }
    }

    /// Encode to the text sent on the wire.
    pub fn encode(&self) -> String {
        match self {
            Frame::Open(info) => format!("0{}", info.to_json()),
            Frame::Close => "1".to_string(),
            Frame::Ping(data) => format!("2{}", data.as_deref().unwrap_or("")),
            Frame::Pong(data) => format!("3{}", data.as_deref().unwrap_or("")),
            Frame::Connect(None) => "40".to_string(),
            Frame::Connect(Some(v)) => format!("40{}", v),
            Frame::Disconnect => "41".to_string(),
            Frame::ConnectError(None) => "44".to_string(),
            Frame::ConnectError(Some(v)) => format!("44{}", v),
            Frame::Event(event) => {
                let mut items = vec![Value::from(event.name.clone()), event.payload.clone()];
                if let Some(seq) = event.sequence {
                    items.push(Value::from(seq));
                }
                format!("42{}", Value::Array(items))
            }
        }
    }

    /// Shorthand for an event frame.
    pub fn event(name: impl Into<String>, payload: Value) -> Self {
        Frame::Event(EventFrame::new(name, payload))
    }
}

fn parse_socket_packet(rest: &str) -> Result<Frame, WireError> {
    let mut chars = rest.chars();
    let kind = chars
        .next()
        .ok_or_else(|| WireError::UnknownPacket("4".to_string()))?;
    let body = strip_namespace(chars.as_str());

    match kind {
        '0' => Ok(Frame::Connect(optional_json(body)?)),
        '1' => Ok(Frame::Disconnect),
        '2' => parse_event(body).map(Frame::Event),
        '4' => Ok(Frame::ConnectError(optional_json(body)?)),
        other => Err(WireError::UnknownPacket(format!("4{}", other))),
    }
}

/// Drop a leading `/namespace,` segment.
fn strip_namespace(body: &str) -> &str {
    if !body.starts_with('/') {
        return body;
    }
    match body.find(',') {
        Some(idx) => &body[idx + 1..],
        None => "",
    }
}

fn parse_event(body: &str) -> Result<EventFrame, WireError> {
    // An acknowledgement id may sit between the prefix and the array.
    let body = body.trim_start_matches(|c: char| c.is_ascii_digit());
    let value: Value = serde_json::from_str(body)?;
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(WireError::MalformedEvent(format!(
                "expected array, got {}",
                json_kind(&other)
            )))
        }
    };

    let mut items = items.into_iter();
    let name = match items.next() {
        Some(Value::String(name)) if !name.is_empty() => name,
        _ => return Err(WireError::MalformedEvent("missing event name".into())),
    };
    let payload = items.next().unwrap_or(Value::Null);
    let sequence = items.next().as_ref().and_then(coerce::as_u64);

    Ok(EventFrame {
        name,
        payload,
        sequence,
    })
}

fn optional_json(body: &str) -> Result<Option<Value>, WireError> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(body)?))
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_open_frame() {
        let frame = Frame::parse(r#"0{"sid":"abc","pingInterval":25000,"pingTimeout":"20000"}"#)
            .unwrap();
        match frame {
            Frame::Open(info) => {
                assert_eq!(info.sid.as_deref(), Some("abc"));
                assert_eq!(info.ping_interval_ms, Some(25_000));
                assert_eq!(info.ping_timeout_ms, Some(20_000));
            }
            other => panic!("Expected Open, got {:?}", other),
        }
    }

    #[test]
    fn parses_bare_control_markers() {
        assert_eq!(Frame::parse("2").unwrap(), Frame::Ping(None));
        assert_eq!(Frame::parse("3").unwrap(), Frame::Pong(None));
        assert_eq!(Frame::parse("1").unwrap(), Frame::Close);
        assert_eq!(Frame::parse("40").unwrap(), Frame::Connect(None));
        assert_eq!(Frame::parse("41").unwrap(), Frame::Disconnect);
    }

    #[test]
    fn parses_namespace_confirmation() {
        let frame = Frame::parse(r#"40{"sid":"xyz"}"#).unwrap();
        assert_eq!(frame, Frame::Connect(Some(json!({"sid": "xyz"}))));
    }

    #[test]
    fn parses_event_with_sequence() {
        let frame = Frame::parse(r#"42["game/1/move",{"move_number":3},"17"]"#).unwrap();
        match frame {
            Frame::Event(ev) => {
                assert_eq!(ev.name, "game/1/move");
                assert_eq!(ev.payload, json!({"move_number": 3}));
                assert_eq!(ev.sequence, Some(17));
            }
            other => panic!("Expected Event, got {:?}", other),
        }
    }

    #[test]
    fn strips_namespace_and_ack_id() {
        let frame = Frame::parse(r#"42/lobby,12["seekgraph/global",[]]"#).unwrap();
        match frame {
            Frame::Event(ev) => {
                assert_eq!(ev.name, "seekgraph/global");
                assert_eq!(ev.payload, json!([]));
                assert_eq!(ev.sequence, None);
            }
            other => panic!("Expected Event, got {:?}", other),
        }
    }

    #[test]
    fn event_without_payload_has_null() {
        let frame = Frame::parse(r#"42["net/ping"]"#).unwrap();
        assert_eq!(frame, Frame::event("net/ping", Value::Null));
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(matches!(Frame::parse(""), Err(WireError::EmptyFrame)));
        assert!(matches!(Frame::parse("9"), Err(WireError::UnknownPacket(_))));
        assert!(matches!(Frame::parse("45[]"), Err(WireError::UnknownPacket(_))));
        assert!(matches!(Frame::parse("42{not json"), Err(WireError::Json(_))));
        assert!(matches!(
            Frame::parse(r#"42{"a":1}"#),
            Err(WireError::MalformedEvent(_))
        ));
        assert!(matches!(
            Frame::parse("42[5, {}]"),
            Err(WireError::MalformedEvent(_))
        ));
    }

    #[test]
    fn encodes_events_with_and_without_sequence() {
        let plain = Frame::event("game/connect", json!({"game_id": 4}));
        assert_eq!(plain.encode(), r#"42["game/connect",{"game_id":4}]"#);

        let tagged =
            Frame::Event(EventFrame::new("game/move", json!({"move": "dd"})).with_sequence(8));
        assert_eq!(tagged.encode(), r#"42["game/move",{"move":"dd"},8]"#);
    }

    #[test]
    fn encodes_control_frames() {
        assert_eq!(Frame::Connect(None).encode(), "40");
        assert_eq!(Frame::Pong(None).encode(), "3");
        assert_eq!(Frame::Ping(Some("probe".into())).encode(), "2probe");
    }

    #[test]
    fn encoded_event_parses_back() {
        let frame = Frame::Event(EventFrame::new("x/y", json!({"k": [1, 2]})).with_sequence(2));
        assert_eq!(Frame::parse(&frame.encode()).unwrap(), frame);
    }
}
