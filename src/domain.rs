use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Local, NaiveDate, Utc};
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use serde::{Deserialize, Deserializer, Serialize};

const ID_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub task_id: String,
    pub task_name: String,
    pub duration: i64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub tasks: Vec<Task>,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    DuplicateName(String),
    TrackingInProgress,
    NoTaskSelected,
    NoActiveSession,
    InvalidShape(String),
}

impl Display for TrackerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackerError::DuplicateName(name) => write!(f, "task already exists: {name}"),
            TrackerError::TrackingInProgress => {
                write!(f, "stop the current session before selecting another task")
            }
            TrackerError::NoTaskSelected => write!(f, "no task selected"),
            TrackerError::NoActiveSession => write!(f, "no active session"),
            TrackerError::InvalidShape(detail) => write!(f, "invalid snapshot: {detail}"),
        }
    }
}

impl std::error::Error for TrackerError {}

#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    NoSelection,
    Selected {
        task: Task,
    },
    Tracking {
        task: Task,
        started_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Tracker {
    pub tasks: Vec<Task>,
    pub history: Vec<HistoryEntry>,
    session: SessionState,
}

impl Tracker {
    pub fn new(tasks: Vec<Task>, mut history: Vec<HistoryEntry>) -> Self {
        sort_history(&mut history);
        Self {
            tasks,
            history,
            session: SessionState::NoSelection,
        }
    }

    /// Adds a task with a fresh id. Whitespace-only names are a tolerated
    /// no-op; names matching an existing task ignoring case are rejected.
    pub fn add_task(
        &mut self,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, TrackerError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let lowered = name.to_lowercase();
        if self.tasks.iter().any(|task| task.name.to_lowercase() == lowered) {
            return Err(TrackerError::DuplicateName(name.to_string()));
        }

        let task = Task {
            id: generate_id(),
            name: name.to_string(),
            created_at: now.timestamp_millis(),
        };
        self.tasks.push(task.clone());
        Ok(Some(task))
    }

    /// Binds the selection to the task with the given id, or clears it when
    /// the id is unknown. Rejected while a session is being tracked.
    pub fn select_task(&mut self, task_id: &str) -> Result<Option<&Task>, TrackerError> {
        if matches!(self.session, SessionState::Tracking { .. }) {
            return Err(TrackerError::TrackingInProgress);
        }

        let found = self.tasks.iter().find(|task| task.id == task_id).cloned();
        self.session = match found {
            Some(task) => SessionState::Selected { task },
            None => SessionState::NoSelection,
        };
        Ok(self.selected_task())
    }

    pub fn selected_task(&self) -> Option<&Task> {
        match &self.session {
            SessionState::NoSelection => None,
            SessionState::Selected { task } | SessionState::Tracking { task, .. } => Some(task),
        }
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.session, SessionState::Tracking { .. })
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), TrackerError> {
        match &self.session {
            SessionState::NoSelection => Err(TrackerError::NoTaskSelected),
            SessionState::Tracking { .. } => Err(TrackerError::TrackingInProgress),
            SessionState::Selected { task } => {
                let task = task.clone();
                self.session = SessionState::Tracking {
                    task,
                    started_at: now,
                };
                Ok(())
            }
        }
    }

    /// Whole seconds elapsed since the session started, clamped to zero.
    /// A pure projection: zero whenever no session is being tracked.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        match &self.session {
            SessionState::Tracking { started_at, .. } => (now - *started_at).num_seconds().max(0),
            _ => 0,
        }
    }

    /// Ends the running session. An entry is recorded only when at least one
    /// full second elapsed; the task stays selected either way.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Result<Option<HistoryEntry>, TrackerError> {
        let SessionState::Tracking { task, started_at } = &self.session else {
            return Err(TrackerError::NoActiveSession);
        };

        let task = task.clone();
        let elapsed = (now - *started_at).num_seconds().max(0);
        self.session = SessionState::Selected { task: task.clone() };

        if elapsed == 0 {
            return Ok(None);
        }

        let entry = HistoryEntry {
            id: generate_id(),
            task_id: task.id,
            task_name: task.name,
            duration: elapsed,
            timestamp: now.timestamp_millis(),
        };
        self.record(entry.clone());
        Ok(Some(entry))
    }

    pub fn record(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
        sort_history(&mut self.history);
    }

    pub fn export_snapshot(&self) -> Snapshot {
        Snapshot {
            tasks: self.tasks.clone(),
            history: self.history.clone(),
        }
    }

    /// Replaces both collections wholesale. The document must carry `tasks`
    /// and `history` arrays whose elements deserialize cleanly; nothing is
    /// mutated on failure. The running session is left untouched.
    pub fn import_snapshot(&mut self, document: &serde_json::Value) -> Result<(), TrackerError> {
        let tasks = require_array(document, "tasks")?;
        let history = require_array(document, "history")?;

        let tasks: Vec<Task> = serde_json::from_value(tasks.clone())
            .map_err(|err| TrackerError::InvalidShape(format!("tasks: {err}")))?;
        let mut history: Vec<HistoryEntry> = serde_json::from_value(history.clone())
            .map_err(|err| TrackerError::InvalidShape(format!("history: {err}")))?;

        sort_history(&mut history);
        self.tasks = tasks;
        self.history = history;
        Ok(())
    }

    pub fn total_time(&self) -> i64 {
        self.history.iter().map(|entry| entry.duration).sum()
    }

    pub fn per_task_totals(&self) -> Vec<(String, i64)> {
        let mut totals: HashMap<String, i64> = HashMap::new();
        for entry in &self.history {
            *totals.entry(entry.task_name.clone()).or_insert(0) += entry.duration;
        }

        let mut rows = totals.into_iter().collect::<Vec<_>>();
        rows.sort_by(|left, right| right.1.cmp(&left.1).then_with(|| left.0.cmp(&right.0)));
        rows
    }

    pub fn per_day_totals(&self) -> BTreeMap<NaiveDate, i64> {
        let mut totals = BTreeMap::new();
        for entry in &self.history {
            *totals.entry(day_utc(entry.timestamp)).or_insert(0) += entry.duration;
        }
        totals
    }

    pub fn average_daily_time(&self) -> i64 {
        let days = self.per_day_totals().len() as i64;
        if days == 0 {
            return 0;
        }
        self.total_time() / days
    }

    /// Entries bucketed by their local calendar day for display, most recent
    /// day first, ledger order within each day.
    pub fn group_by_local_day(&self) -> Vec<(NaiveDate, Vec<HistoryEntry>)> {
        let mut groups: Vec<(NaiveDate, Vec<HistoryEntry>)> = Vec::new();
        for entry in &self.history {
            let day = day_local(entry.timestamp);
            match groups.last_mut() {
                Some((current, entries)) if *current == day => entries.push(entry.clone()),
                _ => groups.push((day, vec![entry.clone()])),
            }
        }
        groups
    }
}

fn sort_history(history: &mut [HistoryEntry]) {
    // Stable sort keeps insertion order for entries sharing a timestamp.
    history.sort_by(|left, right| right.timestamp.cmp(&left.timestamp));
}

fn require_array<'a>(
    document: &'a serde_json::Value,
    field: &str,
) -> Result<&'a serde_json::Value, TrackerError> {
    let value = document
        .get(field)
        .ok_or_else(|| TrackerError::InvalidShape(format!("missing field: {field}")))?;
    if !value.is_array() {
        return Err(TrackerError::InvalidShape(format!("{field} is not an array")));
    }
    Ok(value)
}

fn day_utc(timestamp_ms: i64) -> NaiveDate {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|moment| moment.date_naive())
        .unwrap_or(NaiveDate::MIN)
}

fn day_local(timestamp_ms: i64) -> NaiveDate {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|moment| moment.with_timezone(&Local).date_naive())
        .unwrap_or(NaiveDate::MIN)
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Millis(i64),
        Float(f64),
        Text(String),
    }

    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Millis(value) => Ok(value),
        RawTimestamp::Float(value) => Ok(value as i64),
        RawTimestamp::Text(text) => parse_timestamp_text(&text).map_err(serde::de::Error::custom),
    }
}

fn parse_timestamp_text(text: &str) -> Result<i64, String> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.timestamp_millis());
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc().timestamp_millis());
        }
    }

    Err(format!("unrecognized timestamp: {text}"))
}

pub fn generate_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

pub fn format_elapsed(seconds: i64) -> String {
    let total = seconds.max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    use super::{HistoryEntry, Tracker, TrackerError, format_elapsed, generate_id};

    fn moment(hour: u32, minute: u32, second: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, hour, minute, second).unwrap()
    }

    #[test]
    fn rejects_duplicate_names_ignoring_case() {
        let mut tracker = Tracker::default();
        tracker
            .add_task("Reading", moment(9, 0, 0))
            .expect("first add should work");

        let result = tracker.add_task("reading", moment(9, 0, 1));
        assert_eq!(
            result,
            Err(TrackerError::DuplicateName("reading".to_string()))
        );
        assert_eq!(tracker.tasks.len(), 1);
        assert_eq!(tracker.tasks[0].name, "Reading");
    }

    #[test]
    fn ignores_whitespace_only_names() {
        let mut tracker = Tracker::default();
        let added = tracker
            .add_task("   ", moment(9, 0, 0))
            .expect("blank input is not an error");
        assert!(added.is_none());
        assert!(tracker.tasks.is_empty());
    }

    #[test]
    fn selecting_unknown_id_clears_selection() {
        let mut tracker = Tracker::default();
        let task = tracker
            .add_task("Reading", moment(9, 0, 0))
            .expect("add should work")
            .expect("task should be created");

        tracker.select_task(&task.id).expect("select should work");
        assert!(tracker.selected_task().is_some());

        tracker.select_task("missing").expect("select should work");
        assert!(tracker.selected_task().is_none());
    }

    #[test]
    fn selection_is_rejected_while_tracking() {
        let mut tracker = Tracker::default();
        let task = tracker
            .add_task("Reading", moment(9, 0, 0))
            .expect("add should work")
            .expect("task should be created");
        tracker.select_task(&task.id).expect("select should work");
        tracker.start(moment(9, 1, 0)).expect("start should work");

        let result = tracker.select_task(&task.id);
        assert!(matches!(result, Err(TrackerError::TrackingInProgress)));
        assert!(tracker.is_tracking());
        assert_eq!(tracker.elapsed_seconds(moment(9, 1, 30)), 30);
    }

    #[test]
    fn start_requires_a_selection() {
        let mut tracker = Tracker::default();
        assert_eq!(
            tracker.start(moment(9, 0, 0)),
            Err(TrackerError::NoTaskSelected)
        );
    }

    #[test]
    fn start_is_rejected_while_tracking() {
        let mut tracker = Tracker::default();
        let task = tracker
            .add_task("Reading", moment(9, 0, 0))
            .expect("add should work")
            .expect("task should be created");
        tracker.select_task(&task.id).expect("select should work");
        tracker.start(moment(9, 1, 0)).expect("start should work");

        assert_eq!(
            tracker.start(moment(9, 2, 0)),
            Err(TrackerError::TrackingInProgress)
        );
    }

    #[test]
    fn stop_without_session_fails() {
        let mut tracker = Tracker::default();
        let task = tracker
            .add_task("Reading", moment(9, 0, 0))
            .expect("add should work")
            .expect("task should be created");
        tracker.select_task(&task.id).expect("select should work");

        assert_eq!(
            tracker.stop(moment(9, 1, 0)),
            Err(TrackerError::NoActiveSession)
        );
    }

    #[test]
    fn stop_records_elapsed_seconds() {
        let mut tracker = Tracker::default();
        let task = tracker
            .add_task("Reading", moment(9, 0, 0))
            .expect("add should work")
            .expect("task should be created");
        tracker.select_task(&task.id).expect("select should work");

        let started = moment(9, 1, 0);
        tracker.start(started).expect("start should work");
        let stopped = started + Duration::seconds(125);
        let entry = tracker
            .stop(stopped)
            .expect("stop should work")
            .expect("entry should be recorded");

        assert_eq!(entry.duration, 125);
        assert_eq!(entry.task_id, task.id);
        assert_eq!(entry.task_name, "Reading");
        assert_eq!(entry.timestamp, stopped.timestamp_millis());
        assert_eq!(format_elapsed(entry.duration), "02:05");
        assert_eq!(tracker.history.len(), 1);
        assert!(!tracker.is_tracking());
        assert_eq!(tracker.selected_task().map(|t| t.id.clone()), Some(task.id));
        assert_eq!(tracker.elapsed_seconds(stopped + Duration::seconds(5)), 0);
    }

    #[test]
    fn zero_second_sessions_leave_no_entry() {
        let mut tracker = Tracker::default();
        let task = tracker
            .add_task("Reading", moment(9, 0, 0))
            .expect("add should work")
            .expect("task should be created");
        tracker.select_task(&task.id).expect("select should work");

        let started = moment(9, 1, 0);
        tracker.start(started).expect("start should work");
        let entry = tracker.stop(started).expect("stop should work");

        assert!(entry.is_none());
        assert!(tracker.history.is_empty());
        assert!(!tracker.is_tracking());
    }

    #[test]
    fn history_stays_sorted_descending() {
        let mut tracker = Tracker::default();
        tracker.record(entry_at("a", 2_000));
        tracker.record(entry_at("b", 5_000));
        tracker.record(entry_at("c", 1_000));
        tracker.record(entry_at("d", 5_000));

        let timestamps = tracker
            .history
            .iter()
            .map(|entry| entry.timestamp)
            .collect::<Vec<_>>();
        assert_eq!(timestamps, vec![5_000, 5_000, 2_000, 1_000]);

        // Stable: "b" was recorded before "d" at the same timestamp.
        assert_eq!(tracker.history[0].id, "b");
        assert_eq!(tracker.history[1].id, "d");
    }

    #[test]
    fn aggregates_per_task_and_per_day() {
        let mut tracker = Tracker::default();
        let day = moment(10, 0, 0);
        tracker.record(entry_named("Reading", 600, day.timestamp_millis()));
        tracker.record(entry_named(
            "Writing",
            1_800,
            (day + Duration::hours(2)).timestamp_millis(),
        ));
        tracker.record(entry_named(
            "Reading",
            300,
            (day + Duration::days(1)).timestamp_millis(),
        ));

        assert_eq!(tracker.total_time(), 2_700);

        let per_task = tracker.per_task_totals();
        assert_eq!(
            per_task,
            vec![("Writing".to_string(), 1_800), ("Reading".to_string(), 900)]
        );

        let per_day = tracker.per_day_totals();
        assert_eq!(per_day.len(), 2);
        assert_eq!(per_day.get(&day.date_naive()), Some(&2_400));
        assert_eq!(
            per_day.get(&(day + Duration::days(1)).date_naive()),
            Some(&300)
        );

        assert_eq!(tracker.average_daily_time(), 1_350);
    }

    #[test]
    fn average_daily_time_is_zero_for_empty_ledger() {
        let tracker = Tracker::default();
        assert_eq!(tracker.average_daily_time(), 0);
    }

    #[test]
    fn snapshot_round_trips_through_import() {
        let mut tracker = Tracker::default();
        tracker
            .add_task("Reading", moment(9, 0, 0))
            .expect("add should work");
        tracker.record(entry_at("a", 2_000));
        tracker.record(entry_at("b", 1_000));

        let snapshot = tracker.export_snapshot();
        let document = serde_json::to_value(&snapshot).expect("snapshot should serialize");

        let mut restored = Tracker::default();
        restored
            .import_snapshot(&document)
            .expect("import should work");

        assert_eq!(restored.tasks, tracker.tasks);
        assert_eq!(restored.history, tracker.history);
    }

    #[test]
    fn import_rejects_non_array_collections() {
        let mut tracker = Tracker::default();
        tracker
            .add_task("Reading", moment(9, 0, 0))
            .expect("add should work");
        tracker.record(entry_at("a", 2_000));

        let document = json!({ "tasks": "not-an-array", "history": [] });
        let result = tracker.import_snapshot(&document);

        assert!(matches!(result, Err(TrackerError::InvalidShape(_))));
        assert_eq!(tracker.tasks.len(), 1);
        assert_eq!(tracker.history.len(), 1);
    }

    #[test]
    fn import_rejects_malformed_elements() {
        let mut tracker = Tracker::default();
        let document = json!({
            "tasks": [{ "id": "t1" }],
            "history": [],
        });

        let result = tracker.import_snapshot(&document);
        assert!(matches!(result, Err(TrackerError::InvalidShape(_))));
        assert!(tracker.tasks.is_empty());
    }

    #[test]
    fn import_normalizes_string_timestamps() {
        let mut tracker = Tracker::default();
        let document = json!({
            "tasks": [],
            "history": [
                {
                    "id": "a",
                    "taskId": "t1",
                    "taskName": "Reading",
                    "duration": 60,
                    "timestamp": "2026-03-14T10:00:00Z",
                },
                {
                    "id": "b",
                    "taskId": "t1",
                    "taskName": "Reading",
                    "duration": 30,
                    "timestamp": 1_500_000_000_000_i64,
                },
            ],
        });

        tracker.import_snapshot(&document).expect("import should work");
        let expected = moment(10, 0, 0).timestamp_millis();
        assert_eq!(tracker.history[0].timestamp, expected);
        assert_eq!(tracker.history[1].timestamp, 1_500_000_000_000);
    }

    #[test]
    fn formats_elapsed_time() {
        assert_eq!(format_elapsed(0), "00:00");
        assert_eq!(format_elapsed(59), "00:59");
        assert_eq!(format_elapsed(125), "02:05");
        assert_eq!(format_elapsed(3_600), "01:00:00");
        assert_eq!(format_elapsed(3_725), "01:02:05");
        assert_eq!(format_elapsed(36_125), "10:02:05");
        assert_eq!(format_elapsed(-5), "00:00");
    }

    fn entry_at(id: &str, timestamp: i64) -> HistoryEntry {
        entry_named_with_id(id, "Reading", 60, timestamp)
    }

    fn entry_named(task_name: &str, duration: i64, timestamp: i64) -> HistoryEntry {
        entry_named_with_id(&generate_id(), task_name, duration, timestamp)
    }

    fn entry_named_with_id(
        id: &str,
        task_name: &str,
        duration: i64,
        timestamp: i64,
    ) -> HistoryEntry {
        HistoryEntry {
            id: id.to_string(),
            task_id: "t1".to_string(),
            task_name: task_name.to_string(),
            duration,
            timestamp,
        }
    }
}
