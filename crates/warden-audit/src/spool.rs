//! Disk spool: the write-ahead record for audit events.
//!
//! One append-only JSON-lines file per calendar day, keyed by the event's
//! own timestamp. An event written late still lands in the file matching
//! its day, and removal looks the file up the same way. A day file is
//! deleted once empty, except the file for the current day, which is
//! always retained.
//!
//! All operations are serialized behind a single mutex per spooler
//! instance, so concurrent producers never interleave partial writes.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{NaiveDate, Utc};
use tracing::warn;
use warden_types::AuditEvent;

const SPOOL_PREFIX: &str = "audit_spool_";
const SPOOL_SUFFIX: &str = ".json";

/// Errors from spool operations.
#[derive(Debug, thiserror::Error)]
pub enum SpoolError {
    /// The underlying storage is out of space.
    ///
    /// Distinguished from generic I/O failures so callers can decide
    /// whether to fail the request or proceed without a durable record.
    #[error("audit spool disk full: {path}")]
    DiskFull { path: PathBuf },

    /// Underlying OS I/O error.
    #[error("audit spool I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: io::Error,
    },

    /// Event serialization error.
    #[error("audit event serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for spool operations.
pub type Result<T> = std::result::Result<T, SpoolError>;

/// Append-only, per-day disk spool for audit events.
pub struct AuditSpooler {
    dir: PathBuf,
    /// Serializes all disk access. One spooler instance per tenant bounds
    /// contention; this is a simplicity/throughput trade-off.
    lock: Mutex<()>,
}

impl AuditSpooler {
    /// Opens a spooler over the given directory, creating it if absent.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| map_io(&dir, source))?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    /// Appends an event to the file for the event's own day.
    pub fn append(&self, event: &AuditEvent) -> Result<()> {
        let line = serde_json::to_string(event)?;
        let path = self.day_path(event.day());

        let _guard = self.lock.lock().expect("spool lock poisoned");
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| map_io(&path, source))?;
        writeln!(file, "{line}").map_err(|source| map_io(&path, source))?;
        file.flush().map_err(|source| map_io(&path, source))?;
        Ok(())
    }

    /// Removes an event from its day file after confirmed delivery.
    ///
    /// Matching is by line equality against the event's serialization, not
    /// an id lookup, so no secondary index is needed. Only the first
    /// matching line is dropped. If the file ends up empty and is not the
    /// current day's file, it is deleted.
    pub fn remove(&self, event: &AuditEvent) -> Result<()> {
        let line = serde_json::to_string(event)?;
        let day = event.day();
        let path = self.day_path(day);

        let _guard = self.lock.lock().expect("spool lock poisoned");
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(source) => return Err(map_io(&path, source)),
        };

        let mut dropped = false;
        let remaining: Vec<&str> = contents
            .lines()
            .filter(|candidate| {
                if !dropped && *candidate == line {
                    dropped = true;
                    false
                } else {
                    true
                }
            })
            .collect();

        if remaining.is_empty() && day != Utc::now().date_naive() {
            fs::remove_file(&path).map_err(|source| map_io(&path, source))?;
            return Ok(());
        }

        let mut rewritten = remaining.join("\n");
        if !rewritten.is_empty() {
            rewritten.push('\n');
        }
        fs::write(&path, rewritten).map_err(|source| map_io(&path, source))
    }

    /// Loads every event still on disk, oldest day first.
    ///
    /// Lines that no longer parse are skipped with a warning rather than
    /// poisoning recovery of the rest.
    pub fn load_all(&self) -> Result<Vec<AuditEvent>> {
        let _guard = self.lock.lock().expect("spool lock poisoned");

        let mut paths: Vec<PathBuf> = Vec::new();
        let entries = fs::read_dir(&self.dir).map_err(|source| map_io(&self.dir, source))?;
        for entry in entries {
            let entry = entry.map_err(|source| map_io(&self.dir, source))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(SPOOL_PREFIX) && name.ends_with(SPOOL_SUFFIX) {
                paths.push(entry.path());
            }
        }
        paths.sort();

        let mut events = Vec::new();
        for path in paths {
            let contents = fs::read_to_string(&path).map_err(|source| map_io(&path, source))?;
            for line in contents.lines() {
                match serde_json::from_str::<AuditEvent>(line) {
                    Ok(event) => events.push(event),
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "skipping unparseable spool line");
                    }
                }
            }
        }
        Ok(events)
    }

    /// The spool directory this instance writes to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn day_path(&self, day: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{SPOOL_PREFIX}{day}{SPOOL_SUFFIX}"))
    }
}

/// Maps an OS error to the spool taxonomy, distinguishing out-of-space.
fn map_io(path: &Path, source: io::Error) -> SpoolError {
    if is_disk_full(&source) {
        SpoolError::DiskFull {
            path: path.to_path_buf(),
        }
    } else {
        SpoolError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn is_disk_full(err: &io::Error) -> bool {
    // ENOSPC fallback for platforms where the kind is generic.
    err.kind() == io::ErrorKind::StorageFull || err.raw_os_error() == Some(28)
}
