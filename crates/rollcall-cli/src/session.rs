use std::collections::BTreeSet;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use chrono::{Local, Timelike};
use serde::Serialize;
use tracing::info;

use rollcall_config::ResolvedConfig;
use rollcall_core::capture::{open_video_device, CaptureSettings, DeviceLocator, V4lFrameSource};
use rollcall_core::errors::{AppError, AppResult};
use rollcall_core::faces::{load_gallery, resolve_model_paths, DlibAnalyzer, Gallery, GalleryLoadOutcome};
use rollcall_core::ledger::{flush_attendance, FlushOutcome};
use rollcall_core::live::{run_live_session_with, LiveSessionConfig, SessionOutcome};

use crate::cli::RunArgs;
use crate::config::load_app_config;

/// Everything an attendance session needs, after CLI flags have been merged
/// over the config file and built-in defaults.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub known_faces_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub tolerance: f64,
    pub frame_interval: u32,
    pub device: String,
    pub pixel_format: String,
    pub warmup_frames: u32,
    pub landmark_model: Option<PathBuf>,
    pub encoder_model: Option<PathBuf>,
    pub jitters: u32,
}

/// CLI flags win over config values, which win over built-in defaults.
pub fn build_session_settings(args: &RunArgs, config: &ResolvedConfig) -> SessionSettings {
    SessionSettings {
        known_faces_dir: args
            .known_faces_dir
            .clone()
            .unwrap_or_else(|| config.known_faces_dir.clone()),
        reports_dir: args
            .reports_dir
            .clone()
            .unwrap_or_else(|| config.reports_dir.clone()),
        tolerance: args.tolerance.unwrap_or(config.tolerance),
        frame_interval: args.interval.unwrap_or(config.frame_interval).max(1),
        device: args
            .device
            .clone()
            .unwrap_or_else(|| config.video_device.clone()),
        pixel_format: config.pixel_format.clone(),
        warmup_frames: config.warmup_frames,
        landmark_model: args
            .landmark_model
            .clone()
            .or_else(|| config.landmark_model.clone()),
        encoder_model: args
            .encoder_model
            .clone()
            .or_else(|| config.encoder_model.clone()),
        jitters: args.jitters.unwrap_or(config.jitters),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceRunOutcome {
    pub gallery_logs: Vec<String>,
    pub session: SessionOutcome,
    pub flush: FlushOutcome,
}

/// Runs a full attendance session: load the gallery, watch the camera until
/// the operator quits, then flush whoever was recognized to today's ledger.
pub fn run_attendance(args: &RunArgs) -> AppResult<AttendanceRunOutcome> {
    let loaded = load_app_config()?;
    let settings = build_session_settings(args, &loaded.resolved);

    let models = resolve_model_paths(
        settings.landmark_model.as_deref(),
        settings.encoder_model.as_deref(),
    )?;
    let analyzer = DlibAnalyzer::new(&models, settings.jitters)?;

    run_attendance_with(
        &settings,
        |settings| load_gallery(&settings.known_faces_dir, &analyzer),
        |settings, gallery| run_camera_session(settings, gallery, &analyzer),
        |settings, names| {
            let now = Local::now();
            let time = now.time().with_nanosecond(0).unwrap_or_else(|| now.time());
            flush_attendance(&settings.reports_dir, now.date_naive(), time, names)
        },
    )
}

/// The session pipeline with its three phases injectable, so the flow can be
/// exercised without a camera or dlib models.
pub fn run_attendance_with<G, L, F>(
    settings: &SessionSettings,
    load: G,
    run_loop: L,
    flush: F,
) -> AppResult<AttendanceRunOutcome>
where
    G: FnOnce(&SessionSettings) -> AppResult<GalleryLoadOutcome>,
    L: FnOnce(&SessionSettings, &Gallery) -> AppResult<SessionOutcome>,
    F: FnOnce(&SessionSettings, &BTreeSet<String>) -> AppResult<FlushOutcome>,
{
    let load_outcome = load(settings)?;
    if load_outcome.gallery.is_empty() {
        return Err(AppError::NoKnownIdentities {
            dir: settings.known_faces_dir.clone(),
        });
    }

    let session = run_loop(settings, &load_outcome.gallery)?;
    let flush_outcome = flush(settings, &session.recognized)?;

    Ok(AttendanceRunOutcome {
        gallery_logs: load_outcome.logs,
        session,
        flush: flush_outcome,
    })
}

fn run_camera_session(
    settings: &SessionSettings,
    gallery: &Gallery,
    analyzer: &DlibAnalyzer,
) -> AppResult<SessionOutcome> {
    let locator = DeviceLocator::from_option(Some(settings.device.clone()));
    let opened = open_video_device(&CaptureSettings {
        device: locator.clone(),
        pixel_format: settings.pixel_format.clone(),
        warmup_frames: settings.warmup_frames,
    })?;
    let mut source = V4lFrameSource::open(
        &opened.device,
        &locator,
        opened.format,
        settings.warmup_frames,
    )?;

    let stop = Arc::new(AtomicBool::new(false));
    spawn_quit_listener(Arc::clone(&stop));
    info!("press 'q' then Enter to end the session");

    let config = LiveSessionConfig {
        tolerance: settings.tolerance,
        frame_interval: settings.frame_interval,
    };
    let mut outcome = run_live_session_with(&config, gallery, &mut source, analyzer, stop.as_ref())?;

    let mut logs = opened.logs;
    logs.extend(outcome.logs);
    outcome.logs = logs;
    Ok(outcome)
}

/// Watches stdin for a lone `q` and flips the shared stop flag. The thread
/// is detached; it dies with the process once the session ends.
pub fn spawn_quit_listener(stop: Arc<AtomicBool>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(input) if input.trim().eq_ignore_ascii_case("q") => {
                    stop.store(true, Ordering::Relaxed);
                    break;
                }
                Ok(_) => continue,
                Err(_) => break,
            }
        }
    });
}
