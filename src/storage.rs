use std::fmt::{Display, Formatter};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::{HistoryEntry, Snapshot, Task, Tracker};

pub const TASKS_KEY: &str = "tasks";
pub const HISTORY_KEY: &str = "history";

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    JsonDecode(serde_json::Error),
    JsonEncode(serde_json::Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(err) => write!(f, "io error: {err}"),
            StoreError::JsonDecode(err) => write!(f, "failed to parse JSON: {err}"),
            StoreError::JsonEncode(err) => write!(f, "failed to encode JSON: {err}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Key-value store backed by one JSON document per key. Every write is a
/// full rewrite of the document; the process is the only writer.
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn open(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let raw = match fs::read_to_string(self.key_path(key)) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::Io(err)),
        };

        let value = serde_json::from_str(&raw).map_err(StoreError::JsonDecode)?;
        Ok(Some(value))
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(StoreError::Io)?;
        let encoded = serde_json::to_string(value).map_err(StoreError::JsonEncode)?;
        fs::write(self.key_path(key), encoded).map_err(StoreError::Io)
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

/// Reads both collections. Absent keys are empty collections; unreadable or
/// malformed documents degrade to empty collections with a warning.
pub fn load_tracker(store: &Store) -> Tracker {
    let tasks: Vec<Task> = load_collection(store, TASKS_KEY);
    let history: Vec<HistoryEntry> = load_collection(store, HISTORY_KEY);
    Tracker::new(tasks, history)
}

pub fn save_tracker(store: &Store, tracker: &Tracker) -> Result<(), StoreError> {
    store.set(TASKS_KEY, &tracker.tasks)?;
    store.set(HISTORY_KEY, &tracker.history)
}

fn load_collection<T: DeserializeOwned>(store: &Store, key: &str) -> Vec<T> {
    let value = match store.get(key) {
        Ok(Some(value)) => value,
        Ok(None) => return Vec::new(),
        Err(err) => {
            eprintln!("warning: failed to read stored {key}: {err}");
            return Vec::new();
        }
    };

    match serde_json::from_value(value) {
        Ok(collection) => collection,
        Err(err) => {
            eprintln!("warning: stored {key} has an unexpected shape, starting empty: {err}");
            Vec::new()
        }
    }
}

pub fn export_file_name(today: NaiveDate) -> String {
    format!("activity_tracker_data_{}.json", today.format("%Y-%m-%d"))
}

pub fn write_export(path: &Path, snapshot: &Snapshot) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(StoreError::Io)?;
        }
    }

    let document = serde_json::to_string_pretty(snapshot).map_err(StoreError::JsonEncode)?;
    fs::write(path, document).map_err(StoreError::Io)
}

pub fn read_import(path: &Path) -> Result<serde_json::Value, StoreError> {
    let raw = fs::read_to_string(path).map_err(StoreError::Io)?;
    serde_json::from_str(&raw).map_err(StoreError::JsonDecode)
}
