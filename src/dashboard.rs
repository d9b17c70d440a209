//! Operator-facing view state
//!
//! `Dashboard` is the `UiSink` the binary hands to the session manager. It
//! keeps the newest-first telemetry table, the plot buffer, the last mode
//! reported by the controller and the schedule editor.

use chrono::{DateTime, Local};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::SeriesConfig;
use crate::dispatch::{ConnectionStatus, UiSink};
use crate::error::Result;
use crate::logging::{StructuredLogger, get_logger};
use crate::protocol::{Mode, ScheduleEntry, TelemetrySnapshot};
use crate::schedule::ScheduleEditor;
use crate::series::SeriesBuffer;
use crate::table::{TableRow, TelemetryTable};

/// Dashboard shared between the session loop and the console
pub type SharedDashboard = Arc<Mutex<Dashboard>>;

pub struct Dashboard {
    table: TelemetryTable,
    series: SeriesBuffer,
    schedule: ScheduleEditor,
    mode: Option<Mode>,
    connection: Option<ConnectionStatus>,
    last_update: Option<DateTime<Local>>,
    logger: StructuredLogger,
}

impl Dashboard {
    pub fn new(config: &SeriesConfig) -> Result<Self> {
        Ok(Self {
            table: TelemetryTable::new(config.table_rows)?,
            series: SeriesBuffer::new(config.capacity)?,
            schedule: ScheduleEditor::new(),
            mode: None,
            connection: None,
            last_update: None,
            logger: get_logger("dashboard"),
        })
    }

    pub fn shared(self) -> SharedDashboard {
        Arc::new(Mutex::new(self))
    }

    pub fn table(&self) -> &TelemetryTable {
        &self.table
    }

    pub fn series(&self) -> &SeriesBuffer {
        &self.series
    }

    pub fn schedule(&self) -> &ScheduleEditor {
        &self.schedule
    }

    pub fn schedule_mut(&mut self) -> &mut ScheduleEditor {
        &mut self.schedule
    }

    /// Mode last reported by the controller
    pub fn mode(&self) -> Option<&Mode> {
        self.mode.as_ref()
    }

    pub fn connection(&self) -> Option<ConnectionStatus> {
        self.connection
    }

    pub fn last_update(&self) -> Option<DateTime<Local>> {
        self.last_update
    }

    /// Record a snapshot as received at `at`
    pub fn record_snapshot_at(&mut self, at: DateTime<Local>, snapshot: &TelemetrySnapshot) {
        self.table.insert(TableRow::from_snapshot(at, snapshot));
        let pushed = self.series.push_snapshot(at, snapshot);
        self.last_update = Some(at);
        self.logger.trace(&format!(
            "Snapshot recorded: soc={:?} state={:?}, {} metrics plotted",
            snapshot.soc,
            snapshot.state_label(),
            pushed
        ));
    }

    /// One-line summary for the status command
    pub fn status_line(&self) -> String {
        let connection = match self.connection {
            Some(ConnectionStatus::Connected) => "connected",
            Some(ConnectionStatus::Connecting) => "connecting",
            Some(ConnectionStatus::Lost) => "reconnecting",
            None => "idle",
        };
        let mode = self
            .mode
            .as_ref()
            .map_or_else(|| "-".to_string(), Mode::label);
        let soc = self
            .table
            .newest()
            .and_then(|row| row.soc)
            .map_or_else(|| "-".to_string(), |soc| format!("{:.0}%", soc));
        let updated = self
            .last_update
            .map_or_else(|| "never".to_string(), |t| t.format("%H:%M:%S").to_string());
        format!(
            "link: {} | mode: {} | soc: {} | last update: {}",
            connection, mode, soc, updated
        )
    }
}

impl UiSink for Dashboard {
    fn on_snapshot(&mut self, snapshot: &TelemetrySnapshot) {
        self.record_snapshot_at(Local::now(), snapshot);
    }

    fn on_mode(&mut self, mode: &Mode) {
        if self.mode.as_ref() != Some(mode) {
            self.logger.info(&format!("Controller mode: {}", mode.label()));
        }
        self.mode = Some(mode.clone());
    }

    fn on_schedule(&mut self, events: &[ScheduleEntry]) {
        self.schedule.replace(events);
        let unreadable = events.iter().filter(|e| e.event().is_none()).count();
        if unreadable > 0 {
            self.logger.warn(&format!(
                "Schedule received with {} events, {} kept unread",
                events.len(),
                unreadable
            ));
        } else {
            self.logger
                .info(&format!("Schedule received with {} events", events.len()));
        }
    }

    fn on_connection_change(&mut self, status: ConnectionStatus) {
        match status {
            ConnectionStatus::Connecting => self.logger.debug("Connecting to controller"),
            ConnectionStatus::Connected => self.logger.info("Controller connected"),
            ConnectionStatus::Lost => self
                .logger
                .warn("Connection lost. Attempting to reconnect..."),
        }
        self.connection = Some(status);
    }
}

/// Lock the dashboard, recovering the data if a previous holder panicked
pub fn lock(dashboard: &SharedDashboard) -> MutexGuard<'_, Dashboard> {
    dashboard
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl UiSink for SharedDashboard {
    fn on_snapshot(&mut self, snapshot: &TelemetrySnapshot) {
        lock(self).on_snapshot(snapshot);
    }

    fn on_mode(&mut self, mode: &Mode) {
        lock(self).on_mode(mode);
    }

    fn on_schedule(&mut self, events: &[ScheduleEntry]) {
        lock(self).on_schedule(events);
    }

    fn on_connection_change(&mut self, status: ConnectionStatus) {
        lock(self).on_connection_change(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Action, ModeName, ScheduledEvent};
    use crate::series::Metric;
    use chrono::{NaiveTime, TimeZone};

    fn dashboard() -> Dashboard {
        Dashboard::new(&SeriesConfig {
            capacity: 3,
            table_rows: 2,
        })
        .unwrap()
    }

    #[test]
    fn snapshots_feed_table_and_plot() {
        let mut dash = dashboard();
        for (i, soc) in [10.0, 20.0, 30.0, 40.0].into_iter().enumerate() {
            let at = Local.with_ymd_and_hms(2024, 5, 1, 12, 0, i as u32).unwrap();
            dash.record_snapshot_at(
                at,
                &TelemetrySnapshot {
                    soc: Some(soc),
                    ..Default::default()
                },
            );
        }
        assert_eq!(dash.table().len(), 2);
        assert_eq!(dash.table().newest().unwrap().soc, Some(40.0));
        assert_eq!(dash.series().len(Metric::Soc), 3);
        assert_eq!(dash.series().len(Metric::Temp), 0);
        assert_eq!(dash.last_update().unwrap().format("%S").to_string(), "03");
    }

    #[test]
    fn schedule_refresh_replaces_rows() {
        let mut dash = dashboard();
        dash.schedule_mut().add_row().unwrap();
        let early = NaiveTime::from_hms_opt(1, 30, 0).unwrap();
        dash.on_schedule(&[ScheduledEvent::new(early, Action::Eco).into()]);
        assert_eq!(dash.schedule().rows().len(), 1);
        assert_eq!(
            dash.schedule().rows()[0].event().map(|e| &e.action),
            Some(&Action::Eco)
        );
    }

    #[test]
    fn shared_dashboard_is_a_sink() {
        let mut shared = dashboard().shared();
        shared.on_mode(&Mode::from(ModeName::V2h));
        shared.on_connection_change(ConnectionStatus::Lost);
        let dash = lock(&shared);
        assert_eq!(dash.mode(), Some(&Mode::Named(ModeName::V2h)));
        assert!(dash.status_line().contains("reconnecting"));
        assert!(dash.status_line().contains("mode: V2h"));
    }
}
