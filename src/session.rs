//! Connection lifecycle for one controller channel
//!
//! The `SessionManager` owns all session state and runs as a single event
//! loop. Connecting, reading the channel and both timers happen in small
//! tasks that post generation-tagged `SessionEvent`s back into the loop;
//! an event whose generation is not the current one is ignored.

mod task;

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::{QueryProfile, SessionConfig};
use crate::dispatch::{ConnectionStatus, UiSink, route};
use crate::error::ChargelinkError;
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::protocol::{Command, decode, encode};
use crate::transport::{ChannelEvent, Connection, Transport};

use task::{TaskGuard, TimerHandle};

impl QueryProfile {
    /// Queries sent once right after the channel opens
    pub fn initial_queries(self) -> Vec<Command> {
        match self {
            QueryProfile::Dashboard => vec![Command::GetData, Command::GetMode, Command::GetEvents],
            QueryProfile::Minimal => vec![Command::GetJson],
        }
    }

    /// Queries re-sent on every poll tick
    pub fn poll_queries(self) -> Vec<Command> {
        match self {
            QueryProfile::Dashboard => vec![Command::GetData, Command::GetMode],
            QueryProfile::Minimal => vec![Command::GetJson],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Not started, or shut down
    Disconnected,
    Connecting,
    Open,
    /// Disconnected with exactly one retry timer pending
    RetryScheduled,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::RetryScheduled => "retry scheduled",
        };
        f.write_str(s)
    }
}

/// Counters kept over the lifetime of a manager
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub connect_attempts: u64,
    pub connect_failures: u64,
    pub opens: u64,
    pub losses: u64,
    pub initial_bursts: u64,
    pub poll_timers_armed: u64,
    pub poll_timers_cancelled: u64,
    pub poll_ticks: u64,
    pub retries_scheduled: u64,
    pub retries_fired: u64,
    pub frames_sent: u64,
    pub frames_received: u64,
    pub commands_dropped: u64,
    pub decode_errors: u64,
    pub notifications: u64,
    pub stale_events: u64,
}

/// Everything the event loop reacts to, tagged with the generation it was created under
#[derive(Debug)]
pub(crate) enum SessionEvent {
    Connected {
        generation: u64,
        connection: Connection,
    },
    ConnectFailed {
        generation: u64,
        error: ChargelinkError,
    },
    Channel {
        generation: u64,
        event: ChannelEvent,
    },
    PollTick {
        generation: u64,
    },
    RetryDue {
        generation: u64,
    },
}

impl SessionEvent {
    fn generation(&self) -> u64 {
        match self {
            SessionEvent::Connected { generation, .. }
            | SessionEvent::ConnectFailed { generation, .. }
            | SessionEvent::Channel { generation, .. }
            | SessionEvent::PollTick { generation }
            | SessionEvent::RetryDue { generation } => *generation,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Connected { .. } => "connected",
            SessionEvent::ConnectFailed { .. } => "connect_failed",
            SessionEvent::Channel {
                event: ChannelEvent::Frame(_),
                ..
            } => "frame",
            SessionEvent::Channel { .. } => "closed",
            SessionEvent::PollTick { .. } => "poll_tick",
            SessionEvent::RetryDue { .. } => "retry_due",
        }
    }
}

#[derive(Debug)]
enum Control {
    Send(Command),
    Shutdown,
}

/// Cheap handle for issuing commands into a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    control: mpsc::UnboundedSender<Control>,
}

impl SessionHandle {
    /// Fire-and-forget. Dropped by the session unless the channel is open.
    pub fn send(&self, command: Command) {
        let _ = self.control.send(Control::Send(command));
    }

    /// Ask the event loop to tear down and return
    pub fn shutdown(&self) {
        let _ = self.control.send(Control::Shutdown);
    }
}

pub struct SessionManager<T: Transport, S: UiSink> {
    config: SessionConfig,
    url: String,
    transport: Arc<T>,
    sink: S,
    state: SessionState,
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<String>>,
    connect_task: Option<TaskGuard>,
    reader: Option<TaskGuard>,
    poll_timer: Option<TimerHandle>,
    retry_timer: Option<TimerHandle>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    control_tx: mpsc::UnboundedSender<Control>,
    control_rx: mpsc::UnboundedReceiver<Control>,
    stats: SessionStats,
    last_error: Option<ChargelinkError>,
    logger: StructuredLogger,
}

impl<T: Transport, S: UiSink> SessionManager<T, S> {
    pub fn new(config: SessionConfig, url: impl Into<String>, transport: T, sink: S) -> Self {
        let url = url.into();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let logger = get_logger_with_context(LogContext::new("session").with_endpoint(url.clone()));
        Self {
            config,
            url,
            transport: Arc::new(transport),
            sink,
            state: SessionState::Disconnected,
            generation: 0,
            outbound: None,
            connect_task: None,
            reader: None,
            poll_timer: None,
            retry_timer: None,
            events_tx,
            events_rx,
            control_tx,
            control_rx,
            stats: SessionStats::default(),
            last_error: None,
            logger,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            control: self.control_tx.clone(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Why the most recent connect attempt or channel failed; cleared on open
    pub fn last_error(&self) -> Option<&ChargelinkError> {
        self.last_error.as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Begin the first connect attempt. No-op unless disconnected.
    pub fn start(&mut self) {
        if self.state == SessionState::Disconnected {
            self.begin_connect();
        }
    }

    /// Run until `SessionHandle::shutdown`, then hand the manager back
    pub async fn run(mut self) -> Self {
        self.start();
        loop {
            tokio::select! {
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                control = self.control_rx.recv() => match control {
                    Some(Control::Send(command)) => {
                        self.send(&command);
                    }
                    Some(Control::Shutdown) | None => break,
                },
            }
        }
        self.teardown();
        self
    }

    /// Transmit a command if the channel is open. Returns whether it was sent.
    pub fn send(&mut self, command: &Command) -> bool {
        if self.state != SessionState::Open {
            self.stats.commands_dropped += 1;
            self.logger.debug(&format!(
                "Dropping {} command while {}",
                command.kind(),
                self.state
            ));
            return false;
        }
        self.transmit(command)
    }

    pub(crate) fn handle_event(&mut self, event: SessionEvent) {
        if event.generation() != self.generation {
            self.stats.stale_events += 1;
            self.logger.trace(&format!(
                "Ignoring stale {} event from generation {} (current {})",
                event.kind(),
                event.generation(),
                self.generation
            ));
            return;
        }

        match event {
            SessionEvent::Connected { connection, .. } => self.on_connected(connection),
            SessionEvent::ConnectFailed { error, .. } => self.on_connect_failed(error),
            SessionEvent::Channel {
                event: ChannelEvent::Frame(text),
                ..
            } => self.on_frame(&text),
            SessionEvent::Channel {
                event: ChannelEvent::Closed { reason },
                ..
            } => self.on_closed(reason),
            SessionEvent::PollTick { .. } => self.on_poll_tick(),
            SessionEvent::RetryDue { .. } => self.on_retry_due(),
        }
    }

    fn begin_connect(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        self.state = SessionState::Connecting;
        self.stats.connect_attempts += 1;
        self.logger = get_logger_with_context(
            LogContext::new("session")
                .with_session_id(uuid::Uuid::new_v4().to_string())
                .with_endpoint(self.url.clone())
                .with_generation(generation),
        );
        self.logger.info(&format!("Connecting to {}", self.url));
        self.sink.on_connection_change(ConnectionStatus::Connecting);

        let transport = Arc::clone(&self.transport);
        let url = self.url.clone();
        let timeout = self.config.connect_timeout();
        let events = self.events_tx.clone();
        self.connect_task = Some(TaskGuard::spawn(async move {
            let event = match tokio::time::timeout(timeout, transport.connect(&url)).await {
                Ok(Ok(connection)) => SessionEvent::Connected {
                    generation,
                    connection,
                },
                Ok(Err(error)) => SessionEvent::ConnectFailed { generation, error },
                Err(_) => SessionEvent::ConnectFailed {
                    generation,
                    error: ChargelinkError::timeout(format!(
                        "Connect timed out after {}ms",
                        timeout.as_millis()
                    )),
                },
            };
            let _ = events.send(event);
        }));
    }

    fn on_connected(&mut self, connection: Connection) {
        if self.state != SessionState::Connecting {
            self.logger.debug("Discarding connection established outside Connecting");
            return;
        }
        self.connect_task = None;
        self.last_error = None;

        let Connection {
            outbound,
            mut inbound,
        } = connection;
        self.outbound = Some(outbound);
        self.state = SessionState::Open;
        self.stats.opens += 1;

        let generation = self.generation;
        let events = self.events_tx.clone();
        self.reader = Some(TaskGuard::spawn(async move {
            while let Some(event) = inbound.recv().await {
                let closed = matches!(event, ChannelEvent::Closed { .. });
                if events.send(SessionEvent::Channel { generation, event }).is_err() || closed {
                    return;
                }
            }
            // transport went away without saying so
            let _ = events.send(SessionEvent::Channel {
                generation,
                event: ChannelEvent::Closed { reason: None },
            });
        }));

        self.logger.info("Connected to controller");
        self.sink.on_connection_change(ConnectionStatus::Connected);

        for command in self.config.profile.initial_queries() {
            self.transmit(&command);
        }
        self.stats.initial_bursts += 1;

        let events = self.events_tx.clone();
        self.poll_timer = Some(TimerHandle::every(
            "poll",
            self.config.poll_interval(),
            events,
            move || SessionEvent::PollTick { generation },
        ));
        self.stats.poll_timers_armed += 1;
    }

    fn on_connect_failed(&mut self, error: ChargelinkError) {
        if self.state != SessionState::Connecting {
            return;
        }
        self.connect_task = None;
        self.stats.connect_failures += 1;
        self.logger.warn(&format!("Connect to {} failed: {}", self.url, error));
        self.last_error = Some(error);
        self.sink.on_connection_change(ConnectionStatus::Lost);
        self.schedule_retry();
    }

    fn on_closed(&mut self, reason: Option<String>) {
        if self.state != SessionState::Open {
            return;
        }
        self.close_channel();
        self.stats.losses += 1;
        let error =
            ChargelinkError::connection(reason.unwrap_or_else(|| "channel closed".to_string()));
        self.logger.warn(&format!("Connection lost: {}", error));
        self.last_error = Some(error);
        self.sink.on_connection_change(ConnectionStatus::Lost);
        self.schedule_retry();
    }

    fn on_frame(&mut self, text: &str) {
        if self.state != SessionState::Open {
            return;
        }
        self.stats.frames_received += 1;
        match decode(text) {
            Ok(message) => {
                if route(&message, &mut self.sink) {
                    self.stats.notifications += 1;
                } else {
                    self.logger
                        .debug(&format!("Ignoring message with tag '{}'", message.tag()));
                }
            }
            Err(e) => {
                self.stats.decode_errors += 1;
                self.logger.warn(&format!("Dropping malformed frame: {}", e));
            }
        }
    }

    fn on_poll_tick(&mut self) {
        if self.state != SessionState::Open {
            return;
        }
        self.stats.poll_ticks += 1;
        for command in self.config.profile.poll_queries() {
            self.transmit(&command);
        }
    }

    fn on_retry_due(&mut self) {
        if self.state != SessionState::RetryScheduled {
            return;
        }
        self.retry_timer = None;
        self.stats.retries_fired += 1;
        self.begin_connect();
    }

    fn schedule_retry(&mut self) {
        let delay = self.config.retry_delay();
        self.state = SessionState::RetryScheduled;
        self.retry_timer = Some(TimerHandle::after(
            "retry",
            delay,
            self.events_tx.clone(),
            SessionEvent::RetryDue {
                generation: self.generation,
            },
        ));
        self.stats.retries_scheduled += 1;
        self.logger
            .info(&format!("Reconnecting in {}ms", delay.as_millis()));
    }

    /// Leave `Open`: stop polling and release the channel
    fn close_channel(&mut self) {
        if let Some(timer) = self.poll_timer.take() {
            self.logger.debug(&format!("Cancelling {} timer", timer.name()));
            timer.cancel();
            self.stats.poll_timers_cancelled += 1;
        }
        self.outbound = None;
        self.reader = None;
    }

    fn transmit(&mut self, command: &Command) -> bool {
        let Some(outbound) = self.outbound.as_ref() else {
            return false;
        };
        let frame = match encode(command) {
            Ok(frame) => frame,
            Err(e) => {
                self.logger
                    .error(&format!("Failed to encode {} command: {}", command.kind(), e));
                return false;
            }
        };
        if outbound.send(frame).is_err() {
            // writer is gone; the closed event follows
            self.logger
                .debug(&format!("Channel closed before {} was sent", command.kind()));
            return false;
        }
        self.stats.frames_sent += 1;
        true
    }

    fn teardown(&mut self) {
        self.close_channel();
        self.connect_task = None;
        if let Some(timer) = self.retry_timer.take() {
            timer.cancel();
        }
        self.state = SessionState::Disconnected;
        self.logger.info(&format!(
            "Session stopped after {} connect attempts, {} frames sent",
            self.stats.connect_attempts, self.stats.frames_sent
        ));
    }
}
