//! Inbound message routing
//!
//! Classifies decoded messages by tag and forwards the payload to the UI
//! sink. Holds no connection state and performs no I/O.

use serde::Serialize;

use crate::protocol::{InboundMessage, Mode, ScheduleEntry, TelemetrySnapshot};

/// Connection indicator shown to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    /// Channel dropped; a reconnect is scheduled
    Lost,
}

/// Receiver of everything the core surfaces to the operator
pub trait UiSink: Send + 'static {
    fn on_snapshot(&mut self, snapshot: &TelemetrySnapshot);
    fn on_mode(&mut self, mode: &Mode);
    /// Replaces the whole schedule
    fn on_schedule(&mut self, events: &[ScheduleEntry]);
    fn on_connection_change(&mut self, status: ConnectionStatus);
}

/// What a recognised inbound message turns into
#[derive(Debug, Clone, PartialEq)]
pub enum Notification<'a> {
    Snapshot(&'a TelemetrySnapshot),
    Mode(&'a Mode),
    Schedule(&'a [ScheduleEntry]),
}

/// Map a message to its notification; unknown tags map to nothing
pub fn classify(message: &InboundMessage) -> Option<Notification<'_>> {
    match message {
        InboundMessage::Data(snapshot) => Some(Notification::Snapshot(snapshot)),
        InboundMessage::Mode(mode) => Some(Notification::Mode(mode)),
        InboundMessage::Events(events) => Some(Notification::Schedule(events)),
        InboundMessage::Unrecognised { .. } => None,
    }
}

/// Forward a message to the sink. Returns whether a notification was delivered.
pub fn route<S: UiSink + ?Sized>(message: &InboundMessage, sink: &mut S) -> bool {
    match classify(message) {
        Some(Notification::Snapshot(snapshot)) => sink.on_snapshot(snapshot),
        Some(Notification::Mode(mode)) => sink.on_mode(mode),
        Some(Notification::Schedule(events)) => sink.on_schedule(events),
        None => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ModeName, decode};

    #[derive(Default)]
    struct Counting {
        snapshots: usize,
        modes: Vec<String>,
        schedules: usize,
    }

    impl UiSink for Counting {
        fn on_snapshot(&mut self, _snapshot: &TelemetrySnapshot) {
            self.snapshots += 1;
        }
        fn on_mode(&mut self, mode: &Mode) {
            self.modes.push(mode.label());
        }
        fn on_schedule(&mut self, _events: &[ScheduleEntry]) {
            self.schedules += 1;
        }
        fn on_connection_change(&mut self, _status: ConnectionStatus) {}
    }

    #[test]
    fn classify_maps_each_tag() {
        let msg = InboundMessage::Mode(ModeName::Eco.into());
        assert!(matches!(classify(&msg), Some(Notification::Mode(_))));
        let msg = InboundMessage::Events(vec![]);
        assert!(matches!(classify(&msg), Some(Notification::Schedule(e)) if e.is_empty()));
        let msg = InboundMessage::Unrecognised {
            tag: "ack".into(),
        };
        assert_eq!(classify(&msg), None);
    }

    #[test]
    fn route_forwards_exactly_once() {
        let mut sink = Counting::default();
        let frames = [
            r#"{"Data":{"soc":1}}"#,
            r#"{"Mode":"Charge"}"#,
            r#"{"Events":[]}"#,
            r#"{"ack":"ok"}"#,
        ];
        let delivered = frames
            .iter()
            .map(|f| decode(f).unwrap())
            .filter(|m| route(m, &mut sink))
            .count();
        assert_eq!(delivered, 3);
        assert_eq!(sink.snapshots, 1);
        assert_eq!(sink.modes, vec!["Charge".to_string()]);
        assert_eq!(sink.schedules, 1);
    }
}
