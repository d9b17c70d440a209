use chargelink::protocol::{Action, Command, ScheduleEntry, ScheduledEvent, encode};
use chargelink::schedule::ScheduleEditor;
use chrono::NaiveTime;

fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, s).unwrap()
}

#[test]
fn add_edit_save_push() {
    let mut editor = ScheduleEditor::new();
    let index = editor.add_row().unwrap();
    assert_eq!(editor.rows()[index].event(), Some(&ScheduledEvent::default()));

    editor.begin_edit(index).unwrap();
    assert!(!editor.can_push());
    assert!(!editor.can_add_row());
    assert!(editor.push_command().is_err());
    assert!(editor.add_row().is_err());

    editor.update_draft(hms(23, 15, 0), Action::Discharge).unwrap();
    let saved = editor.finish_edit().unwrap();
    assert_eq!(saved, ScheduledEvent::new(hms(23, 15, 0), Action::Discharge));
    assert!(editor.can_push());

    let command = editor.push_command().unwrap();
    assert_eq!(
        encode(&command).unwrap(),
        r#"{"cmd":{"SetEvents":[{"time":"23:15:00","action":"Discharge"}]}}"#
    );
}

#[test]
fn controller_refresh_discards_open_edit() {
    let mut editor = ScheduleEditor::new();
    editor.add_row().unwrap();
    editor.begin_edit(0).unwrap();
    editor.update_draft(hms(5, 0, 0), Action::Eco).unwrap();

    editor.replace(&[
        ScheduledEvent::new(hms(1, 0, 0), Action::Charge).into(),
        ScheduledEvent::new(hms(2, 0, 0), Action::Sleep).into(),
    ]);
    assert!(!editor.is_editing());
    assert_eq!(editor.rows().len(), 2);
    assert!(editor.finish_edit().is_err());
}

#[test]
fn out_of_range_rows_are_errors() {
    let mut editor = ScheduleEditor::new();
    assert!(editor.begin_edit(0).is_err());
    assert!(editor.delete_row(3).is_err());
    assert!(editor.update_draft(hms(1, 0, 0), Action::Sleep).is_err());
}

#[test]
fn empty_schedule_pushes_empty_list() {
    let editor = ScheduleEditor::default();
    assert_eq!(editor.push_command().unwrap(), Command::SetEvents(vec![]));
}

#[test]
fn controller_labels_round_trip_through_a_push() {
    let mut editor = ScheduleEditor::new();
    editor.replace(&[
        ScheduledEvent::new(hms(6, 0, 0), Action::Idle).into(),
        ScheduledEvent::new(hms(7, 0, 0), Action::Unrecognised("Boost".into())).into(),
        ScheduleEntry::Unreadable(serde_json::json!({"time": "08:00:00"})),
    ]);
    editor.delete_row(1).unwrap();
    assert_eq!(
        encode(&editor.push_command().unwrap()).unwrap(),
        r#"{"cmd":{"SetEvents":[{"time":"06:00:00","action":"Idle"},{"time":"08:00:00"}]}}"#
    );
}
