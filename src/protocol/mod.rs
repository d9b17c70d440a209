//! Wire protocol spoken with the charge controller
//!
//! Every frame is one JSON object in a WebSocket text message. Outbound
//! commands are wrapped as `{"cmd": ...}`; inbound messages are keyed by
//! `Data`, `Mode` or `Events`.

pub mod codec;
pub mod types;

pub use codec::{DecodeError, decode, decode_command, encode};
pub use types::{
    Action, ChargeParameters, Command, InboundMessage, Mode, ModeName, ParameterisedMode,
    ScheduleEntry, ScheduledEvent, TelemetrySnapshot, hms,
};
