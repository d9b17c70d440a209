//! Line-oriented operator console
//!
//! Reads commands from a line source (stdin in the binary), turns them into
//! `ConsoleAction`s with the pure `parse_line`, and applies them to the
//! session handle and the shared dashboard. Row numbers are 1-based.
//! Replies are rendered into a buffer and written to an async sink.

use std::fmt::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::dashboard::{SharedDashboard, lock};
use crate::error::{ChargelinkError, Result};
use crate::logging::get_logger;
use crate::protocol::{Action, Command, Mode, ModeName, ScheduleEntry, ScheduledEvent, hms};
use crate::series::Axis;
use crate::session::SessionHandle;

pub const HELP: &str = "\
Commands:
  mode <Name>                       set mode (Charge, Discharge, Sleep, V2h, Eco, Idle)
  charge <amps> <on|off> <soc_limit> charge with parameters, eco on or off
  refresh                           reload the schedule from the controller
  events                            show the local schedule
  add                               append a 00:00:00 Sleep row
  edit <n>                          open row n for editing
  set <HH:MM:SS> <Action>           change the row being edited (any mode name)
  save                              commit the row being edited
  cancel                            discard changes to the row being edited
  delete <n>                        remove row n
  push                              send the schedule to the controller
  plot                              summarise the live plot series
  status                            show connection, mode and latest telemetry
  help                              this text
  quit                              exit";

/// One parsed console command
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleAction {
    SetMode(Mode),
    Refresh,
    ShowEvents,
    AddRow,
    /// Zero-based row index
    EditRow(usize),
    SetDraft(ScheduledEvent),
    SaveRow,
    CancelEdit,
    /// Zero-based row index
    DeleteRow(usize),
    Push,
    Plot,
    Status,
    Help,
    Quit,
}

/// Whether the console keeps reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Why the console stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    Quit,
    EndOfInput,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleAction>> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, args)) = words.split_first() else {
        return Ok(None);
    };

    let action = match (verb.to_ascii_lowercase().as_str(), args) {
        ("mode", [name]) => ConsoleAction::SetMode(Mode::Named(name.parse::<ModeName>()?)),
        ("charge", [amps, eco, soc_limit]) => ConsoleAction::SetMode(Mode::charge(
            parse_number("amps", amps)?,
            parse_switch(eco)?,
            parse_percent(soc_limit)?,
        )),
        ("refresh", []) => ConsoleAction::Refresh,
        ("events", []) => ConsoleAction::ShowEvents,
        ("add", []) => ConsoleAction::AddRow,
        ("edit", [row]) => ConsoleAction::EditRow(parse_row(row)?),
        ("set", [time, action]) => {
            ConsoleAction::SetDraft(ScheduledEvent::parse(time, action.parse::<Action>()?)?)
        }
        ("save", []) => ConsoleAction::SaveRow,
        ("cancel", []) => ConsoleAction::CancelEdit,
        ("delete", [row]) => ConsoleAction::DeleteRow(parse_row(row)?),
        ("push", []) => ConsoleAction::Push,
        ("plot", []) => ConsoleAction::Plot,
        ("status", []) => ConsoleAction::Status,
        ("help", _) | ("?", _) => ConsoleAction::Help,
        ("quit", []) | ("exit", []) => ConsoleAction::Quit,
        (verb, _) => {
            return Err(ChargelinkError::validation(
                "command",
                &format!("unknown command or wrong arguments: '{}' (try 'help')", verb),
            ));
        }
    };
    Ok(Some(action))
}

fn parse_number(field: &'static str, text: &str) -> Result<u8> {
    text.parse::<u8>().map_err(|_| {
        ChargelinkError::validation(field, &format!("'{}' is not a number from 0 to 255", text))
    })
}

fn parse_percent(text: &str) -> Result<u8> {
    let value = parse_number("soc_limit", text)?;
    if value > 100 {
        return Err(ChargelinkError::validation(
            "soc_limit",
            "Must be between 0 and 100",
        ));
    }
    Ok(value)
}

fn parse_switch(text: &str) -> Result<bool> {
    match text.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(ChargelinkError::validation(
            "eco",
            &format!("expected on or off, got '{}'", other),
        )),
    }
}

fn parse_row(text: &str) -> Result<usize> {
    match text.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(ChargelinkError::validation(
            "row",
            &format!("'{}' is not a row number", text),
        )),
    }
}

/// Apply one action, appending any operator output to `out`
pub fn execute(
    action: ConsoleAction,
    session: &SessionHandle,
    dashboard: &SharedDashboard,
    out: &mut String,
) -> Result<Flow> {
    match action {
        ConsoleAction::SetMode(mode) => session.send(Command::SetMode(mode)),
        ConsoleAction::Refresh => session.send(Command::GetEvents),
        ConsoleAction::ShowEvents => write_events(dashboard, out)?,
        ConsoleAction::AddRow => {
            let index = lock(dashboard).schedule_mut().add_row()?;
            writeln!(out, "added row {}", index + 1)?;
        }
        ConsoleAction::EditRow(index) => {
            lock(dashboard).schedule_mut().begin_edit(index)?;
            writeln!(out, "editing row {}", index + 1)?;
        }
        ConsoleAction::SetDraft(event) => {
            lock(dashboard)
                .schedule_mut()
                .update_draft(event.time, event.action)?;
        }
        ConsoleAction::SaveRow => {
            let event = lock(dashboard).schedule_mut().finish_edit()?;
            writeln!(out, "saved {}", event)?;
        }
        ConsoleAction::CancelEdit => lock(dashboard).schedule_mut().cancel_edit(),
        ConsoleAction::DeleteRow(index) => {
            let entry = lock(dashboard).schedule_mut().delete_row(index)?;
            writeln!(out, "deleted {}", entry)?;
        }
        ConsoleAction::Push => {
            let command = lock(dashboard).schedule().push_command()?;
            session.send(command);
        }
        ConsoleAction::Plot => write_plot(dashboard, out)?,
        ConsoleAction::Status => writeln!(out, "{}", lock(dashboard).status_line())?,
        ConsoleAction::Help => writeln!(out, "{}", HELP)?,
        ConsoleAction::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

fn write_events(dashboard: &SharedDashboard, out: &mut String) -> Result<()> {
    let dash = lock(dashboard);
    let schedule = dash.schedule();
    if schedule.rows().is_empty() {
        writeln!(out, "no scheduled events")?;
    }
    for (index, entry) in schedule.rows().iter().enumerate() {
        let marker = if schedule.editing_index() == Some(index) {
            '*'
        } else {
            ' '
        };
        write!(out, "{} {:>2}  ", marker, index + 1)?;
        match entry {
            ScheduleEntry::Event(event) => {
                write!(out, "{}  {:<9}", hms::format(&event.time), event.action)?
            }
            ScheduleEntry::Unreadable(raw) => write!(out, "(unreadable) {}", raw)?,
        }
        match schedule.draft() {
            Some(draft) if schedule.editing_index() == Some(index) => {
                writeln!(out, " (editing: {})", draft)?
            }
            _ => writeln!(out)?,
        }
    }
    Ok(())
}

fn write_plot(dashboard: &SharedDashboard, out: &mut String) -> Result<()> {
    let series = lock(dashboard).series().render();
    for s in series.iter().filter(|s| !s.y.is_empty()) {
        let min = s.y.iter().copied().fold(f64::INFINITY, f64::min);
        let max = s.y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let axis = match s.axis {
            Axis::Primary => "y1",
            Axis::Secondary => "y2",
        };
        writeln!(
            out,
            "{:<15} {} {:>4} pts  min {:>8.2}  max {:>8.2}  last {:>8.2} @ {}",
            s.name,
            axis,
            s.y.len(),
            min,
            max,
            s.y.last().copied().unwrap_or_default(),
            s.x.last().map_or("-", String::as_str)
        )?;
    }
    if series.iter().all(|s| s.y.is_empty()) {
        writeln!(out, "no telemetry yet")?;
    }
    Ok(())
}

/// Read and apply commands until `quit` or end of input
pub async fn run_console<R, W>(
    input: R,
    session: SessionHandle,
    dashboard: SharedDashboard,
    mut out: W,
) -> Result<ConsoleExit>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let logger = get_logger("console");
    let mut lines = input.lines();
    let mut reply = String::new();
    while let Some(line) = lines.next_line().await? {
        reply.clear();
        match parse_line(&line) {
            Ok(Some(action)) => {
                logger.debug(&format!("Console action: {:?}", action));
                match execute(action, &session, &dashboard, &mut reply) {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Quit) => return Ok(ConsoleExit::Quit),
                    Err(e) => writeln!(reply, "{}", e)?,
                }
            }
            Ok(None) => {}
            Err(e) => writeln!(reply, "{}", e)?,
        }
        if !reply.is_empty() {
            out.write_all(reply.as_bytes()).await?;
            out.flush().await?;
        }
    }
    Ok(ConsoleExit::EndOfInput)
}
