#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chargelink::dispatch::{ConnectionStatus, UiSink};
use chargelink::error::{ChargelinkError, Result};
use chargelink::protocol::{Mode, ScheduleEntry, TelemetrySnapshot};
use chargelink::transport::{ChannelEvent, Connection, Transport};
use tokio::sync::mpsc;

/// Controller side of one mock connection
pub struct MockPeer {
    pub outbound: mpsc::UnboundedReceiver<String>,
    pub inbound: mpsc::UnboundedSender<ChannelEvent>,
}

impl MockPeer {
    /// Next frame the client transmitted
    pub async fn next_frame(&mut self) -> String {
        self.outbound.recv().await.unwrap()
    }

    pub async fn next_frames(&mut self, n: usize) -> Vec<String> {
        let mut frames = Vec::with_capacity(n);
        for _ in 0..n {
            frames.push(self.next_frame().await);
        }
        frames
    }

    /// Deliver a text frame to the client
    pub fn push(&self, frame: &str) {
        self.inbound
            .send(ChannelEvent::Frame(frame.to_string()))
            .unwrap();
    }

    pub fn close(self, reason: &str) {
        let _ = self.inbound.send(ChannelEvent::Closed {
            reason: Some(reason.to_string()),
        });
    }
}

/// In-memory transport handing every accepted connection to the test
pub struct MockTransport {
    peers: mpsc::UnboundedSender<MockPeer>,
    refusals: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MockPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        (
            Self {
                peers,
                refusals: Arc::new(AtomicUsize::new(0)),
            },
            rx,
        )
    }

    /// Refuse the next `n` connect attempts
    pub fn refusing(self, n: usize) -> Self {
        self.refusals.store(n, Ordering::SeqCst);
        self
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn connect(&self, _url: &str) -> Result<Connection> {
        if self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ChargelinkError::connection("connection refused"));
        }
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let _ = self.peers.send(MockPeer {
            outbound: out_rx,
            inbound: in_tx,
        });
        Ok(Connection {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

/// What a `RecordingSink` was told
#[derive(Debug, Clone, PartialEq)]
pub enum Seen {
    Snapshot(TelemetrySnapshot),
    Mode(Mode),
    Schedule(Vec<ScheduleEntry>),
    Connection(ConnectionStatus),
}

pub struct RecordingSink {
    tx: mpsc::UnboundedSender<Seen>,
}

impl RecordingSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Seen>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl UiSink for RecordingSink {
    fn on_snapshot(&mut self, snapshot: &TelemetrySnapshot) {
        let _ = self.tx.send(Seen::Snapshot(snapshot.clone()));
    }

    fn on_mode(&mut self, mode: &Mode) {
        let _ = self.tx.send(Seen::Mode(mode.clone()));
    }

    fn on_schedule(&mut self, events: &[ScheduleEntry]) {
        let _ = self.tx.send(Seen::Schedule(events.to_vec()));
    }

    fn on_connection_change(&mut self, status: ConnectionStatus) {
        let _ = self.tx.send(Seen::Connection(status));
    }
}

/// Skip notifications until one matches
pub async fn wait_for(seen: &mut mpsc::UnboundedReceiver<Seen>, wanted: &Seen) {
    loop {
        match seen.recv().await {
            Some(s) if &s == wanted => return,
            Some(_) => continue,
            None => panic!("sink closed while waiting for {:?}", wanted),
        }
    }
}

pub const DASHBOARD_BURST: [&str; 3] = [
    r#"{"cmd":"GetData"}"#,
    r#"{"cmd":"GetMode"}"#,
    r#"{"cmd":"GetEvents"}"#,
];

pub const DASHBOARD_POLL: [&str; 2] = [r#"{"cmd":"GetData"}"#, r#"{"cmd":"GetMode"}"#];
