use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{ChargelinkError, Result};

/// Operating modes the controller understands by bare name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModeName {
    Charge,
    Discharge,
    Sleep,
    V2h,
    Eco,
    Idle,
}

impl ModeName {
    pub const ALL: [ModeName; 6] = [
        ModeName::Charge,
        ModeName::Discharge,
        ModeName::Sleep,
        ModeName::V2h,
        ModeName::Eco,
        ModeName::Idle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModeName::Charge => "Charge",
            ModeName::Discharge => "Discharge",
            ModeName::Sleep => "Sleep",
            ModeName::V2h => "V2h",
            ModeName::Eco => "Eco",
            ModeName::Idle => "Idle",
        }
    }
}

impl fmt::Display for ModeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModeName {
    type Err = ChargelinkError;

    fn from_str(s: &str) -> Result<Self> {
        ModeName::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ChargelinkError::validation("mode", &format!("unknown mode '{}'", s)))
    }
}

/// Parameters attached to a charge mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChargeParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amps: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eco: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soc_limit: Option<u8>,
}

impl ChargeParameters {
    pub fn new(amps: u8, eco: bool, soc_limit: u8) -> Self {
        Self {
            amps: Some(amps),
            eco: Some(eco),
            soc_limit: Some(soc_limit),
        }
    }
}

/// A mode carrying parameters, encoded as `{"Charge": {...}}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterisedMode {
    Charge(ChargeParameters),
}

/// Controller operating mode as seen on the wire.
///
/// Bare names encode as a string, parameterised modes as a single-key
/// object. Anything else the controller reports is kept verbatim in
/// `Unrecognised` so newer firmware never breaks decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Mode {
    Named(ModeName),
    Parameterised(ParameterisedMode),
    Unrecognised(Value),
}

impl Mode {
    /// Charge with explicit amps, eco flag and state-of-charge limit
    pub fn charge(amps: u8, eco: bool, soc_limit: u8) -> Self {
        Mode::Parameterised(ParameterisedMode::Charge(ChargeParameters::new(
            amps, eco, soc_limit,
        )))
    }

    /// The mode's name when it is one the client knows
    pub fn name(&self) -> Option<ModeName> {
        match self {
            Mode::Named(name) => Some(*name),
            Mode::Parameterised(ParameterisedMode::Charge(_)) => Some(ModeName::Charge),
            Mode::Unrecognised(_) => None,
        }
    }

    /// Parameters when the mode carries any
    pub fn parameters(&self) -> Option<&ChargeParameters> {
        match self {
            Mode::Parameterised(ParameterisedMode::Charge(p)) => Some(p),
            _ => None,
        }
    }

    /// Display label, also for modes the client does not know
    pub fn label(&self) -> String {
        if let Some(name) = self.name() {
            return name.as_str().to_string();
        }
        match self {
            Mode::Unrecognised(Value::String(s)) => s.clone(),
            Mode::Unrecognised(Value::Object(map)) if map.len() == 1 => {
                map.keys().next().cloned().unwrap_or_default()
            }
            _ => "Unknown".to_string(),
        }
    }
}

impl From<ModeName> for Mode {
    fn from(name: ModeName) -> Self {
        Mode::Named(name)
    }
}

impl From<Value> for Mode {
    fn from(value: Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or(Mode::Unrecognised(value))
    }
}

/// Action of a scheduled event: one of the mode labels.
///
/// Labels this client does not know are carried as `Unrecognised` and
/// written back unchanged when the schedule is pushed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum Action {
    Charge,
    Discharge,
    #[default]
    Sleep,
    V2h,
    Eco,
    Idle,
    Unrecognised(String),
}

impl Action {
    pub const KNOWN: [Action; 6] = [
        Action::Charge,
        Action::Discharge,
        Action::Sleep,
        Action::V2h,
        Action::Eco,
        Action::Idle,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Action::Charge => "Charge",
            Action::Discharge => "Discharge",
            Action::Sleep => "Sleep",
            Action::V2h => "V2h",
            Action::Eco => "Eco",
            Action::Idle => "Idle",
            Action::Unrecognised(label) => label,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Action::Unrecognised(_))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Operator input: only known labels, in any case
impl FromStr for Action {
    type Err = ChargelinkError;

    fn from_str(s: &str) -> Result<Self> {
        Action::KNOWN
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                ChargelinkError::validation("action", &format!("unknown action '{}'", s))
            })
    }
}

impl From<String> for Action {
    fn from(label: String) -> Self {
        Action::KNOWN
            .into_iter()
            .find(|a| a.as_str() == label)
            .unwrap_or(Action::Unrecognised(label))
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        match action {
            Action::Unrecognised(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

/// One entry of the controller's daily schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduledEvent {
    #[serde(with = "hms")]
    pub time: NaiveTime,
    pub action: Action,
}

impl ScheduledEvent {
    pub fn new(time: NaiveTime, action: Action) -> Self {
        Self { time, action }
    }

    /// Build from `HH:MM:SS` (or `HH:MM`) text
    pub fn parse(time: &str, action: Action) -> Result<Self> {
        Ok(Self::new(hms::parse(time)?, action))
    }
}

impl Default for ScheduledEvent {
    fn default() -> Self {
        Self::new(NaiveTime::default(), Action::default())
    }
}

impl fmt::Display for ScheduledEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", hms::format(&self.time), self.action)
    }
}

/// One row of a schedule as exchanged with the controller.
///
/// Entries that do not read as `{"time", "action"}` are kept as the raw
/// JSON the controller sent and pushed back as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScheduleEntry {
    Event(ScheduledEvent),
    Unreadable(Value),
}

impl ScheduleEntry {
    /// Split an `Events` payload into entries. A payload that is not an
    /// array becomes a single unreadable entry; `null` is an empty schedule.
    pub fn list_from(payload: Value) -> Vec<ScheduleEntry> {
        match payload {
            Value::Array(items) => items.into_iter().map(ScheduleEntry::from).collect(),
            Value::Null => Vec::new(),
            other => vec![ScheduleEntry::Unreadable(other)],
        }
    }

    pub fn event(&self) -> Option<&ScheduledEvent> {
        match self {
            ScheduleEntry::Event(event) => Some(event),
            ScheduleEntry::Unreadable(_) => None,
        }
    }
}

impl From<ScheduledEvent> for ScheduleEntry {
    fn from(event: ScheduledEvent) -> Self {
        ScheduleEntry::Event(event)
    }
}

impl From<Value> for ScheduleEntry {
    fn from(value: Value) -> Self {
        match serde_json::from_value(value.clone()) {
            Ok(event) => ScheduleEntry::Event(event),
            Err(_) => ScheduleEntry::Unreadable(value),
        }
    }
}

impl fmt::Display for ScheduleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleEntry::Event(event) => event.fmt(f),
            ScheduleEntry::Unreadable(value) => write!(f, "? {}", value),
        }
    }
}

/// `HH:MM:SS` encoding of a time of day; `HH:MM` is also accepted on input
pub mod hms {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%H:%M:%S";

    pub fn format(time: &NaiveTime) -> String {
        time.format(FORMAT).to_string()
    }

    pub fn parse(text: &str) -> Result<NaiveTime, chrono::ParseError> {
        let text = text.trim();
        NaiveTime::parse_from_str(text, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse(&text).map_err(serde::de::Error::custom)
    }
}

/// One `Data` report from the controller.
///
/// Reading a report never fails. Numbers may arrive as JSON numbers or
/// numeric strings; any field the client cannot read as its type, and any
/// field it does not model, stays in `extra` untouched. `state` is the
/// controller's charger state label (`Idle`, `Stage1`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(from = "Value")]
pub struct TelemetrySnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soc: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ac_w: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dc_kw: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volts: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meter_kw: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_amps: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TelemetrySnapshot {
    /// AC watts as reported, else volts times amps
    pub fn watts(&self) -> Option<f64> {
        self.ac_w
            .or_else(|| Some(self.volts? * self.amps?))
    }

    pub fn state_label(&self) -> Option<&str> {
        self.state.as_deref()
    }
}

impl From<Value> for TelemetrySnapshot {
    /// Non-object payloads carry nothing readable and give an empty snapshot
    fn from(payload: Value) -> Self {
        let Value::Object(mut fields) = payload else {
            return Self::default();
        };
        Self {
            soc: take_number(&mut fields, "soc"),
            state: take_label(&mut fields, "state"),
            temp: take_number(&mut fields, "temp"),
            fan: take_number(&mut fields, "fan"),
            ac_w: take_number(&mut fields, "ac_w"),
            dc_kw: take_number(&mut fields, "dc_kw"),
            amps: take_number(&mut fields, "amps"),
            volts: take_number(&mut fields, "volts"),
            meter_kw: take_number(&mut fields, "meter_kw"),
            requested_amps: take_number(&mut fields, "requested_amps"),
            extra: fields,
        }
    }
}

fn take_number(fields: &mut Map<String, Value>, key: &str) -> Option<f64> {
    let value = fields.remove(key)?;
    let number = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite());
    if number.is_none() && !value.is_null() {
        fields.insert(key.to_string(), value);
    }
    number
}

fn take_label(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key)? {
        Value::String(label) => Some(label),
        Value::Null => None,
        scalar @ (Value::Number(_) | Value::Bool(_)) => Some(scalar.to_string()),
        other => {
            fields.insert(key.to_string(), other);
            None
        }
    }
}

/// Outbound command, wrapped as `{"cmd": ...}` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    GetJson,
    GetData,
    GetMode,
    GetEvents,
    SetMode(Mode),
    SetEvents(Vec<ScheduleEntry>),
}

impl Command {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Command::GetJson => "GetJson",
            Command::GetData => "GetData",
            Command::GetMode => "GetMode",
            Command::GetEvents => "GetEvents",
            Command::SetMode(_) => "SetMode",
            Command::SetEvents(_) => "SetEvents",
        }
    }
}

/// Decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Data(TelemetrySnapshot),
    Mode(Mode),
    Events(Vec<ScheduleEntry>),
    /// A well-formed object whose key the client does not handle
    Unrecognised { tag: String },
}

impl InboundMessage {
    pub fn tag(&self) -> &str {
        match self {
            InboundMessage::Data(_) => "Data",
            InboundMessage::Mode(_) => "Mode",
            InboundMessage::Events(_) => "Events",
            InboundMessage::Unrecognised { tag } => tag,
        }
    }
}
