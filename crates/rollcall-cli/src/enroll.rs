use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use rollcall_config::ResolvedConfig;
use rollcall_core::capture::{open_video_device, CaptureSettings, DeviceLocator, V4lFrameSource};
use rollcall_core::enrollment::{
    default_pose_plan, prepare_person_dir, run_enrollment_with, EnrollmentOutcome,
    EnrollmentRunConfig, OverwritePolicy,
};
use rollcall_core::errors::AppResult;
use rollcall_core::faces::{resolve_model_paths, DlibAnalyzer};

use crate::cli::EnrollArgs;
use crate::config::load_app_config;
use crate::session::spawn_quit_listener;

#[derive(Debug, Clone)]
pub struct EnrollSettings {
    pub name: String,
    pub overwrite: OverwritePolicy,
    pub known_faces_dir: PathBuf,
    pub device: String,
    pub pixel_format: String,
    pub warmup_frames: u32,
    pub min_capture_delay: Duration,
    pub landmark_model: Option<PathBuf>,
    pub encoder_model: Option<PathBuf>,
    pub jitters: u32,
}

/// CLI flags win over config values, which win over built-in defaults.
pub fn build_enroll_settings(args: &EnrollArgs, config: &ResolvedConfig) -> EnrollSettings {
    let delay_secs = args.delay.unwrap_or(config.snapshot_delay_secs).max(0.0);
    EnrollSettings {
        name: args.name.clone(),
        overwrite: if args.overwrite {
            OverwritePolicy::Replace
        } else {
            OverwritePolicy::Reject
        },
        known_faces_dir: args
            .known_faces_dir
            .clone()
            .unwrap_or_else(|| config.known_faces_dir.clone()),
        device: args
            .device
            .clone()
            .unwrap_or_else(|| config.video_device.clone()),
        pixel_format: config.pixel_format.clone(),
        warmup_frames: config.warmup_frames,
        min_capture_delay: Duration::from_secs_f64(delay_secs),
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

/// Walks a person through the pose plan in front of the camera and saves
/// each accepted snapshot under their gallery directory.
pub fn run_guided_enrollment(args: &EnrollArgs) -> AppResult<EnrollmentOutcome> {
    let loaded = load_app_config()?;
    let settings = build_enroll_settings(args, &loaded.resolved);

    run_guided_enrollment_with(
        &settings,
        |settings| prepare_person_dir(&settings.known_faces_dir, &settings.name, settings.overwrite),
        capture_pose_plan,
    )
}

/// Enrollment split into its two phases: claim the person's directory, then
/// capture. Name validation and the overwrite check run before the camera
/// or the models are touched.
pub fn run_guided_enrollment_with<P, C>(
    settings: &EnrollSettings,
    prepare: P,
    capture: C,
) -> AppResult<EnrollmentOutcome>
where
    P: FnOnce(&EnrollSettings) -> AppResult<PathBuf>,
    C: FnOnce(&EnrollSettings, &Path) -> AppResult<EnrollmentOutcome>,
{
    let person_dir = prepare(settings)?;
    capture(settings, &person_dir)
}

fn capture_pose_plan(settings: &EnrollSettings, person_dir: &Path) -> AppResult<EnrollmentOutcome> {
    let models = resolve_model_paths(
        settings.landmark_model.as_deref(),
        settings.encoder_model.as_deref(),
    )?;
    let analyzer = DlibAnalyzer::new(&models, settings.jitters)?;

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
    info!("press 'q' then Enter to cancel; snapshots already taken are kept");

    let config = EnrollmentRunConfig {
        person: settings.name.clone(),
        person_dir: person_dir.to_path_buf(),
        min_capture_delay: settings.min_capture_delay,
    };
    let mut outcome =
        run_enrollment_with(&config, &default_pose_plan(), &mut source, &analyzer, stop.as_ref())?;

    let mut logs = opened.logs;
    logs.extend(outcome.logs);
    outcome.logs = logs;
    Ok(outcome)
}
