//! Append-only CSV event log (`Date,Time,Event,Detail`).

use chrono::{Local, NaiveDateTime};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

const HEADER: [&str; 4] = ["Date", "Time", "Event", "Detail"];

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("journal io ({path}): {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("journal row ({path}): {source}")]
    Csv { path: PathBuf, source: csv::Error },
}

/// Event kinds written to the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    SecurityAlert,
    AiAnalysis,
    AccessGranted,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::SecurityAlert => "SECURITY ALERT",
            EventKind::AiAnalysis => "AI Analysis",
            EventKind::AccessGranted => "ACCESS GRANTED",
        }
    }
}

/// Shared handle to the CSV log. Appends from different threads are serialized.
#[derive(Debug)]
pub struct EventJournal {
    path: PathBuf,
    write: Mutex<()>,
}

impl EventJournal {
    /// Open the journal, creating it with a header row if absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| JournalError::Io {
                path: path.clone(),
                source,
            })?;
        }

        let journal = Self {
            path,
            write: Mutex::new(()),
        };
        if !journal.path.exists() {
            journal.write_record(&HEADER)?;
            tracing::info!(path = %journal.path.display(), "created event journal");
        }
        Ok(journal)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a row stamped with the local wall clock.
    pub fn append(&self, kind: EventKind, detail: &str) -> Result<(), JournalError> {
        self.append_at(Local::now().naive_local(), kind, detail)
    }

    /// Append a row stamped with `at`. Line breaks in `detail` become spaces
    /// so every event stays on one line.
    pub fn append_at(
        &self,
        at: NaiveDateTime,
        kind: EventKind,
        detail: &str,
    ) -> Result<(), JournalError> {
        let date = at.format("%Y-%m-%d").to_string();
        let time = at.format("%H:%M:%S%.6f").to_string();
        let detail = detail.replace(['\r', '\n'], " ");
        self.write_record(&[date.as_str(), time.as_str(), kind.as_str(), detail.as_str()])
    }

    fn write_record(&self, record: &[&str]) -> Result<(), JournalError> {
        let _guard = self.write.lock().unwrap_or_else(PoisonError::into_inner);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;

        let mut wtr = row_writer(file);
        wtr.write_record(record).map_err(|source| JournalError::Csv {
            path: self.path.clone(),
            source,
        })?;
        wtr.flush().map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> JournalError {
        JournalError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn row_writer(file: File) -> csv::Writer<File> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(file)
}
