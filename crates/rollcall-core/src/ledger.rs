use std::collections::{BTreeSet, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveTime, Timelike};
use nix::fcntl::{Flock, FlockArg};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::errors::{AppError, AppResult};

const LEDGER_PREFIX: &str = "Attendance_";

/// Date shape used both in ledger filenames and for `--day` on the CLI.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// One row of a daily attendance file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Timestamp", with = "hms")]
    pub timestamp: NaiveTime,
}

mod hms {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M:%S";

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&time.format(FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&value, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Result of one flush: which names were newly written and what the file
/// holds now.
#[derive(Debug, Clone, Serialize)]
pub struct FlushOutcome {
    pub day: NaiveDate,
    pub path: PathBuf,
    pub appended: Vec<String>,
    pub total_rows: usize,
    pub updated: bool,
    pub logs: Vec<String>,
}

pub fn ledger_path(reports_dir: &Path, day: NaiveDate) -> PathBuf {
    reports_dir.join(format!("{LEDGER_PREFIX}{}.csv", day.format(DAY_FORMAT)))
}

fn lock_path(reports_dir: &Path, day: NaiveDate) -> PathBuf {
    reports_dir.join(format!("{LEDGER_PREFIX}{}.lock", day.format(DAY_FORMAT)))
}

/// Reads a daily ledger. A missing file is an empty ledger; a file that is
/// present but unparseable is fatal, nothing is silently dropped.
pub fn read_ledger(path: &Path) -> AppResult<Vec<AttendanceRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path).map_err(|source| AppError::LedgerRead {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let record: AttendanceRecord = row.map_err(|err| AppError::InvalidLedger {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Merges `names` into the ledger for `day`.
///
/// Existing rows keep their timestamps; names not yet present are appended
/// with `timestamp` (truncated to whole seconds). The merged rows are
/// re-sorted by time, then name, and written atomically via a temp file
/// rename. A sidecar lock file serialises concurrent flushes so parallel
/// sessions cannot lose each other's rows. An empty `names` set performs no
/// I/O at all.
pub fn flush_attendance(
    reports_dir: &Path,
    day: NaiveDate,
    timestamp: NaiveTime,
    names: &BTreeSet<String>,
) -> AppResult<FlushOutcome> {
    let path = ledger_path(reports_dir, day);
    let mut logs = Vec::new();

    if names.is_empty() {
        debug!(day = %day, "no attendees recognized; leaving the ledger untouched");
        logs.push("No attendees recognized; leaving the ledger untouched".to_string());
        return Ok(FlushOutcome {
            day,
            path,
            appended: Vec::new(),
            total_rows: 0,
            updated: false,
            logs,
        });
    }

    std::fs::create_dir_all(reports_dir).map_err(|source| AppError::LedgerWrite {
        path: reports_dir.to_path_buf(),
        source,
    })?;

    let lock_path = lock_path(reports_dir, day);
    let lock_file = OpenOptions::new()
        .create(true)
        .write(true)
        .open(&lock_path)
        .map_err(|source| AppError::LedgerWrite {
            path: lock_path.clone(),
            source,
        })?;
    let _lock = Flock::lock(lock_file, FlockArg::LockExclusive).map_err(|(_, errno)| {
        AppError::LedgerLock {
            path: lock_path.clone(),
            source: errno,
        }
    })?;

    let mut records = read_ledger(&path)?;
    let existing: HashSet<String> = records.iter().map(|record| record.name.clone()).collect();
    let timestamp = timestamp.with_nanosecond(0).unwrap_or(timestamp);

    let mut appended = Vec::new();
    for name in names {
        if existing.contains(name) {
            continue;
        }
        records.push(AttendanceRecord {
            name: name.clone(),
            timestamp,
        });
        appended.push(name.clone());
    }

    if appended.is_empty() {
        debug!(day = %day, "every recognized attendee is already recorded");
        logs.push(format!(
            "All {} recognized attendee(s) already recorded for {day}",
            names.len()
        ));
        return Ok(FlushOutcome {
            day,
            path,
            appended,
            total_rows: records.len(),
            updated: false,
            logs,
        });
    }

    records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.name.cmp(&b.name)));
    write_ledger(&path, &records)?;

    info!(
        day = %day,
        appended = appended.len(),
        total = records.len(),
        path = %path.display(),
        "attendance ledger updated"
    );
    logs.push(format!(
        "Recorded {} new attendee(s) in {}",
        appended.len(),
        path.display()
    ));

    Ok(FlushOutcome {
        day,
        path,
        appended,
        total_rows: records.len(),
        updated: true,
        logs,
    })
}

fn write_ledger(path: &Path, records: &[AttendanceRecord]) -> AppResult<()> {
    let parent = path.parent().ok_or_else(|| AppError::LedgerWrite {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "ledger path has no parent"),
    })?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|source| AppError::LedgerWrite {
        path: path.to_path_buf(),
        source,
    })?;

    {
        let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
        for record in records {
            writer.serialize(record).map_err(|err| {
                let message = err.to_string();
                match err.into_kind() {
                    csv::ErrorKind::Io(source) => AppError::LedgerWrite {
                        path: path.to_path_buf(),
                        source,
                    },
                    _ => AppError::InvalidLedger {
                        path: path.to_path_buf(),
                        message,
                    },
                }
            })?;
        }
        writer.flush().map_err(|source| AppError::LedgerWrite {
            path: path.to_path_buf(),
            source,
        })?;
    }

    tmp.as_file_mut()
        .flush()
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|source| AppError::LedgerWrite {
            path: path.to_path_buf(),
            source,
        })?;
    tmp.persist(path).map_err(|err| AppError::LedgerWrite {
        path: path.to_path_buf(),
        source: err.error,
    })?;
    Ok(())
}
