//! Newest-first telemetry table

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;

use crate::error::{ChargelinkError, Result};
use crate::protocol::TelemetrySnapshot;

/// Rows shown by default
pub const DEFAULT_TABLE_ROWS: usize = 100;

/// One rendered row of the telemetry table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    /// Local arrival time, `HH:MM:SS`
    pub time: String,
    pub soc: Option<f64>,
    pub state: Option<String>,
    pub temp: Option<f64>,
    pub fan: Option<f64>,
    pub watts: Option<f64>,
}

impl TableRow {
    pub fn from_snapshot(received_at: DateTime<Local>, snapshot: &TelemetrySnapshot) -> Self {
        Self {
            time: received_at.format("%H:%M:%S").to_string(),
            soc: snapshot.soc,
            state: snapshot.state.clone(),
            temp: snapshot.temp,
            fan: snapshot.fan,
            watts: snapshot.watts(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryTable {
    max_rows: usize,
    rows: VecDeque<TableRow>,
}

impl TelemetryTable {
    pub fn new(max_rows: usize) -> Result<Self> {
        if max_rows == 0 {
            return Err(ChargelinkError::validation(
                "series.table_rows",
                "Must be greater than 0",
            ));
        }
        Ok(Self {
            max_rows,
            rows: VecDeque::with_capacity(max_rows),
        })
    }

    /// Insert at the top, dropping the bottom row past the cap
    pub fn insert(&mut self, row: TableRow) {
        self.rows.push_front(row);
        self.rows.truncate(self.max_rows);
    }

    /// Rows, newest first
    pub fn rows(&self) -> impl Iterator<Item = &TableRow> + '_ {
        self.rows.iter()
    }

    pub fn newest(&self) -> Option<&TableRow> {
        self.rows.front()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Default for TelemetryTable {
    fn default() -> Self {
        Self {
            max_rows: DEFAULT_TABLE_ROWS,
            rows: VecDeque::with_capacity(DEFAULT_TABLE_ROWS),
        }
    }
}
