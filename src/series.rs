//! Rolling time-series storage feeding the live plot
//!
//! One bounded, oldest-first-evicting sequence per tracked metric. The same
//! capacity applies to every metric.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

use crate::error::{ChargelinkError, Result};
use crate::protocol::TelemetrySnapshot;

/// Metrics plotted from `Data` snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    DcKw,
    Amps,
    Fan,
    RequestedAmps,
    Soc,
    Temp,
    MeterKw,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::DcKw,
        Metric::Amps,
        Metric::Fan,
        Metric::RequestedAmps,
        Metric::Soc,
        Metric::Temp,
        Metric::MeterKw,
    ];

    /// Field name in the `Data` payload
    pub fn field(self) -> &'static str {
        match self {
            Metric::DcKw => "dc_kw",
            Metric::Amps => "amps",
            Metric::Fan => "fan",
            Metric::RequestedAmps => "requested_amps",
            Metric::Soc => "soc",
            Metric::Temp => "temp",
            Metric::MeterKw => "meter_kw",
        }
    }

    /// Percent-scaled metrics share the secondary axis
    pub fn axis(self) -> Axis {
        match self {
            Metric::Soc | Metric::Temp | Metric::Fan => Axis::Secondary,
            _ => Axis::Primary,
        }
    }

    pub fn value_in(self, snapshot: &TelemetrySnapshot) -> Option<f64> {
        match self {
            Metric::DcKw => snapshot.dc_kw,
            Metric::Amps => snapshot.amps,
            Metric::Fan => snapshot.fan,
            Metric::RequestedAmps => snapshot.requested_amps,
            Metric::Soc => snapshot.soc,
            Metric::Temp => snapshot.temp,
            Metric::MeterKw => snapshot.meter_kw,
        }
    }
}

/// Plot axis a series is drawn against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Primary,
    /// Fixed 0..100 range
    Secondary,
}

impl Axis {
    pub fn range(self) -> Option<(f64, f64)> {
        match self {
            Axis::Primary => None,
            Axis::Secondary => Some((0.0, 100.0)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Local>,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(timestamp: DateTime<Local>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Plot-ready projection of one metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotSeries {
    pub name: &'static str,
    pub axis: Axis,
    pub range: Option<(f64, f64)>,
    /// `HH:MM:SS` local time labels
    pub x: Vec<String>,
    pub y: Vec<f64>,
}

/// Fixed-capacity per-metric buffer
#[derive(Debug, Clone)]
pub struct SeriesBuffer {
    capacity: usize,
    series: BTreeMap<Metric, VecDeque<SeriesPoint>>,
}

impl SeriesBuffer {
    /// Capacity 0 is rejected
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ChargelinkError::validation(
                "series.capacity",
                "Must be greater than 0",
            ));
        }
        Ok(Self {
            capacity,
            series: BTreeMap::new(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a point, returning the evicted oldest point when full
    pub fn push(&mut self, metric: Metric, point: SeriesPoint) -> Option<SeriesPoint> {
        let points = self
            .series
            .entry(metric)
            .or_insert_with(|| VecDeque::with_capacity(self.capacity.min(1024)));
        points.push_back(point);
        if points.len() > self.capacity {
            points.pop_front()
        } else {
            None
        }
    }

    /// Push every tracked metric present in the snapshot; returns how many were pushed
    pub fn push_snapshot(&mut self, timestamp: DateTime<Local>, snapshot: &TelemetrySnapshot) -> usize {
        let mut pushed = 0;
        for metric in Metric::ALL {
            if let Some(value) = metric.value_in(snapshot) {
                self.push(metric, SeriesPoint::new(timestamp, value));
                pushed += 1;
            }
        }
        pushed
    }

    pub fn len(&self, metric: Metric) -> usize {
        self.series.get(&metric).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(VecDeque::is_empty)
    }

    pub fn points(&self, metric: Metric) -> impl Iterator<Item = &SeriesPoint> + '_ {
        self.series.get(&metric).into_iter().flatten()
    }

    pub fn latest(&self, metric: Metric) -> Option<&SeriesPoint> {
        self.series.get(&metric).and_then(VecDeque::back)
    }

    pub fn clear(&mut self) {
        self.series.clear();
    }

    /// Plot-ready series for every metric, in `Metric::ALL` order
    pub fn render(&self) -> Vec<PlotSeries> {
        Metric::ALL
            .into_iter()
            .map(|metric| {
                let (x, y) = self
                    .points(metric)
                    .map(|p| (p.timestamp.format("%H:%M:%S").to_string(), p.value))
                    .unzip();
                PlotSeries {
                    name: metric.field(),
                    axis: metric.axis(),
                    range: metric.axis().range(),
                    x,
                    y,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn zero_capacity_is_invalid() {
        assert!(SeriesBuffer::new(0).is_err());
    }

    #[test]
    fn push_evicts_oldest_first() {
        let mut buf = SeriesBuffer::new(2).unwrap();
        let t0 = Local::now();
        assert!(buf.push(Metric::Soc, SeriesPoint::new(t0, 1.0)).is_none());
        assert!(buf.push(Metric::Soc, SeriesPoint::new(t0, 2.0)).is_none());
        let evicted = buf.push(Metric::Soc, SeriesPoint::new(t0, 3.0)).unwrap();
        assert_eq!(evicted.value, 1.0);
        let values: Vec<f64> = buf.points(Metric::Soc).map(|p| p.value).collect();
        assert_eq!(values, vec![2.0, 3.0]);
    }

    #[test]
    fn metrics_are_independent() {
        let mut buf = SeriesBuffer::new(1).unwrap();
        let t0 = Local::now();
        buf.push(Metric::Soc, SeriesPoint::new(t0, 50.0));
        buf.push(Metric::Temp, SeriesPoint::new(t0 + Duration::seconds(5), 21.0));
        assert_eq!(buf.len(Metric::Soc), 1);
        assert_eq!(buf.len(Metric::Temp), 1);
        assert_eq!(buf.len(Metric::Fan), 0);
    }

    #[test]
    fn push_snapshot_skips_absent_fields() {
        let mut buf = SeriesBuffer::new(10).unwrap();
        let snap = TelemetrySnapshot {
            soc: Some(80.0),
            temp: Some(25.0),
            ..Default::default()
        };
        assert_eq!(buf.push_snapshot(Local::now(), &snap), 2);
        assert_eq!(buf.len(Metric::DcKw), 0);
    }

    #[test]
    fn render_does_not_mutate() {
        let mut buf = SeriesBuffer::new(3).unwrap();
        buf.push(Metric::Fan, SeriesPoint::new(Local::now(), 40.0));
        let first = buf.render();
        let second = buf.render();
        assert_eq!(first, second);
        assert_eq!(buf.len(Metric::Fan), 1);
        let fan = first.iter().find(|s| s.name == "fan").unwrap();
        assert_eq!(fan.axis, Axis::Secondary);
        assert_eq!(fan.range, Some((0.0, 100.0)));
        assert_eq!(fan.y, vec![40.0]);
    }
}
