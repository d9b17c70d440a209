use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::types::{Command, InboundMessage, Mode, ScheduleEntry, TelemetrySnapshot};
use crate::error::{ChargelinkError, Result};

/// Inbound discriminants in dispatch priority order
pub const TAG_DATA: &str = "Data";
pub const TAG_MODE: &str = "Mode";
pub const TAG_EVENTS: &str = "Events";

/// Why an inbound frame could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    Syntax(String),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("frame object is empty")]
    Empty,

    /// Only `decode_command` reads a payload strictly
    #[error("invalid {tag} payload: {message}")]
    Payload { tag: &'static str, message: String },
}

#[derive(Serialize)]
struct OutboundFrame<'a> {
    cmd: &'a Command,
}

#[derive(Deserialize)]
struct InstructionFrame {
    cmd: Command,
}

/// Encode a command as one `{"cmd": ...}` text frame
pub fn encode(command: &Command) -> Result<String> {
    serde_json::to_string(&OutboundFrame { cmd: command }).map_err(|e| {
        ChargelinkError::protocol(format!("Failed to encode {}: {}", command.kind(), e))
    })
}

/// Decode one inbound text frame.
///
/// Classification looks at the keys only. The payload under a known key is
/// read leniently and never fails, so every `Data`, `Mode` or `Events`
/// frame reaches the sink. Objects without a known key come back as
/// `Unrecognised`; only text that is not a non-empty JSON object is an
/// error.
pub fn decode(text: &str) -> std::result::Result<InboundMessage, DecodeError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::Syntax(e.to_string()))?;
    let Value::Object(mut map) = value else {
        return Err(DecodeError::NotAnObject);
    };
    if map.is_empty() {
        return Err(DecodeError::Empty);
    }

    if let Some(payload) = map.remove(TAG_DATA) {
        return Ok(InboundMessage::Data(TelemetrySnapshot::from(payload)));
    }
    if let Some(payload) = map.remove(TAG_MODE) {
        return Ok(InboundMessage::Mode(Mode::from(payload)));
    }
    if let Some(payload) = map.remove(TAG_EVENTS) {
        return Ok(InboundMessage::Events(ScheduleEntry::list_from(payload)));
    }

    let tag = map.keys().next().cloned().unwrap_or_default();
    Ok(InboundMessage::Unrecognised { tag })
}

/// Decode an outbound `{"cmd": ...}` frame back into a command
pub fn decode_command(text: &str) -> std::result::Result<Command, DecodeError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::Syntax(e.to_string()))?;
    if !value.is_object() {
        return Err(DecodeError::NotAnObject);
    }
    serde_json::from_value::<InstructionFrame>(value)
        .map(|frame| frame.cmd)
        .map_err(|e| DecodeError::Payload {
            tag: "cmd",
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::{Mode, ModeName};

    #[test]
    fn bare_commands_encode_as_strings() {
        assert_eq!(encode(&Command::GetData).unwrap(), r#"{"cmd":"GetData"}"#);
        assert_eq!(encode(&Command::GetJson).unwrap(), r#"{"cmd":"GetJson"}"#);
    }

    #[test]
    fn set_mode_by_name() {
        let frame = encode(&Command::SetMode(ModeName::Sleep.into())).unwrap();
        assert_eq!(frame, r#"{"cmd":{"SetMode":"Sleep"}}"#);
    }

    #[test]
    fn decode_prefers_data_over_mode() {
        let msg = decode(r#"{"Mode":"Sleep","Data":{"soc":10}}"#).unwrap();
        assert_eq!(msg.tag(), "Data");
    }

    #[test]
    fn decode_unknown_tag_is_not_an_error() {
        let msg = decode(r#"{"ack":"ok"}"#).unwrap();
        assert_eq!(
            msg,
            InboundMessage::Unrecognised {
                tag: "ack".to_string()
            }
        );
    }

    #[test]
    fn decode_rejects_non_objects() {
        assert!(matches!(decode("not json"), Err(DecodeError::Syntax(_))));
        assert_eq!(decode("[1,2]"), Err(DecodeError::NotAnObject));
        assert_eq!(decode("{}"), Err(DecodeError::Empty));
    }

    #[test]
    fn decode_keeps_events_it_cannot_read() {
        let msg = decode(r#"{"Events":[{"time":"nope","action":"Sleep"}]}"#).unwrap();
        let InboundMessage::Events(entries) = msg else {
            panic!("expected Events, got {:?}", msg);
        };
        assert_eq!(entries.len(), 1);
        assert!(entries[0].event().is_none());
    }

    #[test]
    fn decode_command_reports_bad_instructions() {
        let err = decode_command(r#"{"cmd":"Reboot"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Payload { tag: "cmd", .. }));
    }

    #[test]
    fn decode_mode_message() {
        let msg = decode(r#"{"Mode":"V2h"}"#).unwrap();
        assert_eq!(msg, InboundMessage::Mode(Mode::Named(ModeName::V2h)));
    }
}
