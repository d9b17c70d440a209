//! # Chargelink - operator client for a bidirectional EV charge controller
//!
//! Keeps one WebSocket session to the controller alive, polls it for
//! telemetry, mode and schedule, and feeds what comes back into a live
//! telemetry table, a rolling plot buffer and an editable schedule.
//!
//! ## Architecture
//!
//! - `config`: YAML configuration and validation
//! - `logging`: Structured logging and tracing
//! - `protocol`: Wire types and the JSON frame codec
//! - `transport`: Channel abstraction and the WebSocket transport
//! - `session`: Connection state machine, polling and reconnects
//! - `dispatch`: Routing of inbound messages to the UI sink
//! - `series`: Rolling per-metric plot buffer
//! - `table`: Newest-first telemetry table
//! - `schedule`: Local schedule editor
//! - `dashboard`: The sink the binary drives
//! - `console`: Line-oriented operator commands

pub mod config;
pub mod console;
pub mod dashboard;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod schedule;
pub mod series;
pub mod session;
pub mod table;
pub mod transport;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::{ConnectionStatus, UiSink};
pub use error::{ChargelinkError, Result};
pub use session::{SessionHandle, SessionManager, SessionStats};
