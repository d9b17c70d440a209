//! Local editable mirror of the controller's event schedule
//!
//! Edits stay local until pushed as one `SetEvents` command. Only one row
//! can be open for editing; while it is, pushing and adding rows are
//! refused. Rows the client could not read are pushed back untouched
//! unless the operator edits them.

use chrono::NaiveTime;

use crate::error::{ChargelinkError, Result};
use crate::logging::get_logger;
use crate::protocol::{Action, Command, ScheduleEntry, ScheduledEvent};

/// Row currently open for editing and its uncommitted values
#[derive(Debug, Clone, PartialEq, Eq)]
struct Draft {
    index: usize,
    event: ScheduledEvent,
}

pub struct ScheduleEditor {
    rows: Vec<ScheduleEntry>,
    draft: Option<Draft>,
    logger: crate::logging::StructuredLogger,
}

impl ScheduleEditor {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            draft: None,
            logger: get_logger("schedule"),
        }
    }

    pub fn rows(&self) -> &[ScheduleEntry] {
        &self.rows
    }

    pub fn is_editing(&self) -> bool {
        self.draft.is_some()
    }

    /// Index of the row open for editing
    pub fn editing_index(&self) -> Option<usize> {
        self.draft.as_ref().map(|d| d.index)
    }

    /// Uncommitted values of the row open for editing
    pub fn draft(&self) -> Option<&ScheduledEvent> {
        self.draft.as_ref().map(|d| &d.event)
    }

    pub fn can_push(&self) -> bool {
        !self.is_editing()
    }

    pub fn can_add_row(&self) -> bool {
        !self.is_editing()
    }

    /// Replace everything with the controller's schedule, discarding any open edit
    pub fn replace(&mut self, events: &[ScheduleEntry]) {
        if let Some(draft) = self.draft.take() {
            self.logger.warn(&format!(
                "Discarding unsaved edit of row {} on schedule refresh",
                draft.index
            ));
        }
        self.rows = events.to_vec();
        self.logger
            .debug(&format!("Schedule replaced with {} events", self.rows.len()));
    }

    /// Append a default `00:00:00 Sleep` row
    pub fn add_row(&mut self) -> Result<usize> {
        self.ensure_unlocked("add a row")?;
        self.rows.push(ScheduledEvent::default().into());
        Ok(self.rows.len() - 1)
    }

    /// Open a row for editing. An unreadable row starts from the default event.
    pub fn begin_edit(&mut self, index: usize) -> Result<()> {
        let event = self.row(index)?.event().cloned().unwrap_or_default();
        match self.editing_index() {
            Some(editing) if editing == index => Ok(()),
            Some(editing) => Err(ChargelinkError::schedule(format!(
                "Row {} is already being edited",
                editing
            ))),
            None => {
                self.draft = Some(Draft { index, event });
                Ok(())
            }
        }
    }

    /// Change the open row's uncommitted values
    pub fn update_draft(&mut self, time: NaiveTime, action: Action) -> Result<()> {
        let draft = self
            .draft
            .as_mut()
            .ok_or_else(|| ChargelinkError::schedule("No row is being edited"))?;
        draft.event = ScheduledEvent::new(time, action);
        Ok(())
    }

    /// Commit the open row and release the edit lock
    pub fn finish_edit(&mut self) -> Result<ScheduledEvent> {
        let draft = self
            .draft
            .take()
            .ok_or_else(|| ChargelinkError::schedule("No row is being edited"))?;
        let slot = self
            .rows
            .get_mut(draft.index)
            .ok_or_else(|| ChargelinkError::schedule(format!("Row {} no longer exists", draft.index)))?;
        *slot = draft.event.clone().into();
        Ok(draft.event)
    }

    /// Drop the open row's changes and release the edit lock
    pub fn cancel_edit(&mut self) {
        self.draft = None;
    }

    /// Remove a row. Removing the edited row releases the lock.
    pub fn delete_row(&mut self, index: usize) -> Result<ScheduleEntry> {
        self.row(index)?;
        let removed = self.rows.remove(index);
        match self.editing_index() {
            Some(editing) if editing == index => self.draft = None,
            Some(editing) if editing > index => {
                if let Some(draft) = self.draft.as_mut() {
                    draft.index -= 1;
                }
            }
            _ => {}
        }
        Ok(removed)
    }

    /// Bulk `SetEvents` command for the whole schedule
    pub fn push_command(&self) -> Result<Command> {
        self.ensure_unlocked("push the schedule")?;
        Ok(Command::SetEvents(self.rows.clone()))
    }

    fn row(&self, index: usize) -> Result<&ScheduleEntry> {
        self.rows.get(index).ok_or_else(|| {
            ChargelinkError::schedule(format!(
                "Row {} out of range ({} rows)",
                index,
                self.rows.len()
            ))
        })
    }

    fn ensure_unlocked(&self, what: &str) -> Result<()> {
        match self.editing_index() {
            Some(editing) => Err(ChargelinkError::schedule(format!(
                "Cannot {} while row {} is being edited",
                what, editing
            ))),
            None => Ok(()),
        }
    }
}

impl Default for ScheduleEditor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn editor_with_two_rows() -> ScheduleEditor {
        let mut ed = ScheduleEditor::new();
        ed.replace(&[
            ScheduledEvent::new(t(1, 0), Action::Charge).into(),
            ScheduledEvent::new(t(7, 0), Action::V2h).into(),
        ]);
        ed
    }

    #[test]
    fn second_editor_is_refused() {
        let mut ed = editor_with_two_rows();
        ed.begin_edit(0).unwrap();
        assert!(ed.begin_edit(1).is_err());
        // re-opening the same row is harmless
        ed.begin_edit(0).unwrap();
    }

    #[test]
    fn deleting_an_earlier_row_keeps_the_lock_on_the_same_row() {
        let mut ed = editor_with_two_rows();
        ed.begin_edit(1).unwrap();
        ed.delete_row(0).unwrap();
        assert_eq!(ed.editing_index(), Some(0));
        assert_eq!(ed.draft().unwrap().action, Action::V2h);
    }

    #[test]
    fn deleting_the_edited_row_releases_the_lock() {
        let mut ed = editor_with_two_rows();
        ed.begin_edit(0).unwrap();
        ed.delete_row(0).unwrap();
        assert!(!ed.is_editing());
        assert!(ed.can_push());
    }

    #[test]
    fn cancel_keeps_original_row() {
        let mut ed = editor_with_two_rows();
        ed.begin_edit(0).unwrap();
        ed.update_draft(t(2, 0), Action::Sleep).unwrap();
        ed.cancel_edit();
        assert_eq!(
            ed.rows()[0].event(),
            Some(&ScheduledEvent::new(t(1, 0), Action::Charge))
        );
    }

    #[test]
    fn unreadable_rows_survive_until_edited() {
        let raw = serde_json::json!({"time": "06:00:00"});
        let mut ed = ScheduleEditor::new();
        ed.replace(&[ScheduleEntry::Unreadable(raw.clone())]);
        assert_eq!(
            ed.push_command().unwrap(),
            Command::SetEvents(vec![ScheduleEntry::Unreadable(raw)])
        );

        ed.begin_edit(0).unwrap();
        assert_eq!(ed.draft(), Some(&ScheduledEvent::default()));
        ed.update_draft(t(6, 0), Action::Idle).unwrap();
        ed.finish_edit().unwrap();
        assert_eq!(
            ed.rows()[0].event(),
            Some(&ScheduledEvent::new(t(6, 0), Action::Idle))
        );
    }
}
