use std::error::Error;
use std::io::{self, Write};

use serde_json::json;

use rollcall_core::enrollment::EnrollmentOutcome;
use rollcall_core::errors::{AppError, AppResult};

use crate::cli::OutputMode;
use crate::doctor::{CheckStatus, DoctorOutcome};
use crate::report::ReportOutcome;
use crate::roster::RosterOutcome;
use crate::session::AttendanceRunOutcome;

pub fn render_enroll(outcome: &EnrollmentOutcome, mode: OutputMode, verbose: bool) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            for line in &outcome.logs {
                println!("{line}");
            }
            if outcome.completed {
                println!(
                    "Enrolled '{}' with {} snapshots in {}",
                    outcome.person,
                    outcome.captured,
                    outcome.person_dir.display()
                );
            } else {
                println!(
                    "Enrollment for '{}' stopped after {} snapshot(s); kept files in {}",
                    outcome.person,
                    outcome.captured,
                    outcome.person_dir.display()
                );
            }
            if verbose {
                for path in &outcome.saved_files {
                    println!("  {}", path.display());
                }
            }
        }
        OutputMode::Json => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            let payload = serde_json::to_string(outcome)?;
            handle.write_all(payload.as_bytes())?;
            handle.write_all(b"\n")?;
        }
    }
    Ok(())
}

pub fn render_attendance(outcome: &AttendanceRunOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            for line in outcome
                .gallery_logs
                .iter()
                .chain(&outcome.session.logs)
                .chain(&outcome.flush.logs)
            {
                println!("{line}");
            }
            if outcome.session.recognized.is_empty() {
                println!("No attendees recognized this session.");
            } else {
                println!(
                    "Recognized {} attendee(s); {} newly recorded in {}",
                    outcome.session.recognized.len(),
                    outcome.flush.appended.len(),
                    outcome.flush.path.display()
                );
            }
        }
        OutputMode::Json => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            let payload = serde_json::to_string(outcome)?;
            handle.write_all(payload.as_bytes())?;
            handle.write_all(b"\n")?;
        }
    }
    Ok(())
}

pub fn render_roster(outcome: &RosterOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            if outcome.entries.is_empty() {
                println!("No identities enrolled under {}", outcome.dir.display());
            } else {
                println!(
                    "{} enrolled under {}:",
                    outcome.entries.len(),
                    outcome.dir.display()
                );
                for entry in &outcome.entries {
                    println!("  {:<24} {} image(s)", entry.name, entry.images);
                }
            }
        }
        OutputMode::Json => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            let payload = serde_json::to_string(outcome)?;
            handle.write_all(payload.as_bytes())?;
            handle.write_all(b"\n")?;
        }
    }
    Ok(())
}

pub fn render_report(outcome: &ReportOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            if !outcome.exists {
                println!(
                    "No attendance recorded for {} ({} not found)",
                    outcome.day,
                    outcome.path.display()
                );
            } else {
                println!("Attendance for {}:", outcome.day);
                for record in &outcome.records {
                    println!("  {}  {}", record.timestamp.format("%H:%M:%S"), record.name);
                }
                println!("{} attendee(s)", outcome.records.len());
            }
        }
        OutputMode::Json => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            let payload = serde_json::to_string(outcome)?;
            handle.write_all(payload.as_bytes())?;
            handle.write_all(b"\n")?;
        }
    }
    Ok(())
}

pub fn render_doctor(outcome: &DoctorOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            for check in &outcome.checks {
                println!("[{}] {}: {}", check.status.label(), check.name, check.message);
            }
            if outcome.ok {
                println!("All checks passed.");
            } else {
                let failed = outcome
                    .checks
                    .iter()
                    .filter(|check| check.status == CheckStatus::Fail)
                    .count();
                println!("{failed} check(s) failed.");
            }
        }
        OutputMode::Json => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            let payload = serde_json::to_string(outcome)?;
            handle.write_all(payload.as_bytes())?;
            handle.write_all(b"\n")?;
        }
    }
    Ok(())
}

pub fn render_error(err: &AppError, mode: OutputMode) {
    match mode {
        OutputMode::Human => {
            eprintln!("error: {}", err.human_message());
            if let Some(source) = err.source() {
                eprintln!("cause: {source}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "success": false,
                "error": err.human_message(),
            });
            if let Ok(json) = serde_json::to_string(&payload) {
                println!("{json}");
            }
            if let Some(source) = err.source() {
                eprintln!("cause: {source}");
            }
        }
    }
}
