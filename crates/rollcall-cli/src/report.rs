use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use serde::Serialize;

use rollcall_core::errors::{AppError, AppResult};
use rollcall_core::ledger::{ledger_path, read_ledger, AttendanceRecord, DAY_FORMAT};

use crate::cli::ReportArgs;
use crate::config::load_app_config;

#[derive(Debug, Clone, Serialize)]
pub struct ReportOutcome {
    pub day: NaiveDate,
    pub path: PathBuf,
    pub exists: bool,
    pub records: Vec<AttendanceRecord>,
}

pub fn parse_report_day(value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DAY_FORMAT).map_err(|_| AppError::InvalidDate {
        value: value.to_string(),
    })
}

pub fn run_report(args: &ReportArgs) -> AppResult<ReportOutcome> {
    let loaded = load_app_config()?;
    let reports_dir = args
        .reports_dir
        .clone()
        .unwrap_or(loaded.resolved.reports_dir);
    let day = match &args.day {
        Some(value) => parse_report_day(value)?,
        None => Local::now().date_naive(),
    };
    report_for(&reports_dir, day)
}

/// Reads one day's ledger. A day with no ledger file reports as empty
/// rather than failing.
pub fn report_for(reports_dir: &Path, day: NaiveDate) -> AppResult<ReportOutcome> {
    let path = ledger_path(reports_dir, day);
    let exists = path.exists();
    let records = read_ledger(&path)?;
    Ok(ReportOutcome {
        day,
        path,
        exists,
        records,
    })
}
