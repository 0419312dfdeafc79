use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::capture::{to_rgb, write_frame, FrameSource};
use crate::errors::{AppError, AppResult};
use crate::faces::analyzer::FaceAnalyzer;
use crate::live::StopSignal;

/// Characters that would break the per-person directory name.
const FORBIDDEN_NAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// One prompt in the guided capture sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoseStage {
    pub prompt: String,
    pub slug: String,
    pub required: u32,
}

impl PoseStage {
    pub fn new(prompt: &str, slug: &str, required: u32) -> Self {
        Self {
            prompt: prompt.to_string(),
            slug: slug.to_string(),
            required,
        }
    }
}

/// Five snapshots over four prompts: two frontal, one per side, one smiling.
pub fn default_pose_plan() -> Vec<PoseStage> {
    vec![
        PoseStage::new("Look straight at the camera", "front", 2),
        PoseStage::new("Turn your head slightly to the left", "left", 1),
        PoseStage::new("Turn your head slightly to the right", "right", 1),
        PoseStage::new("Smile", "smile", 1),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentStep {
    /// The frame was captured; details of where the plan stands now.
    Capture(CaptureReport),
    /// The frame was not usable; the reason says why.
    Hold(HoldReason),
    /// The plan was already finished; nothing happens.
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    pub prompt: String,
    pub slug: String,
    pub shot: u32,
    pub required: u32,
    pub stage_complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    /// No face in the frame.
    Searching,
    /// More than one face; enrollment captures exactly one person.
    MultipleFaces,
    /// Inside the minimum inter-capture delay window.
    TooSoon,
}

/// Tracks progress through a pose plan.
///
/// A frame advances the plan only when it shows exactly one face and the
/// minimum delay since the previous capture has elapsed. Frames arriving
/// inside the delay window are skipped without error, so holding still in
/// front of the camera does not burn through a stage instantly.
#[derive(Debug)]
pub struct EnrollmentSession {
    stages: Vec<PoseStage>,
    stage_index: usize,
    captured_in_stage: u32,
    total_captured: u32,
    last_capture_at: Option<Instant>,
    min_capture_delay: Duration,
}

impl EnrollmentSession {
    pub fn new(stages: Vec<PoseStage>, min_capture_delay: Duration) -> Self {
        Self {
            stages,
            stage_index: 0,
            captured_in_stage: 0,
            total_captured: 0,
            last_capture_at: None,
            min_capture_delay,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.stage_index >= self.stages.len()
    }

    pub fn current_stage(&self) -> Option<&PoseStage> {
        self.stages.get(self.stage_index)
    }

    pub fn current_prompt(&self) -> Option<&str> {
        self.current_stage().map(|stage| stage.prompt.as_str())
    }

    pub fn total_captured(&self) -> u32 {
        self.total_captured
    }

    pub fn observe_frame(&mut self, faces: usize, now: Instant) -> EnrollmentStep {
        let Some(stage) = self.stages.get(self.stage_index) else {
            return EnrollmentStep::Complete;
        };
        if faces == 0 {
            return EnrollmentStep::Hold(HoldReason::Searching);
        }
        if faces > 1 {
            return EnrollmentStep::Hold(HoldReason::MultipleFaces);
        }
        if let Some(last) = self.last_capture_at {
            if now.duration_since(last) < self.min_capture_delay {
                return EnrollmentStep::Hold(HoldReason::TooSoon);
            }
        }

        let (prompt, slug, required) = (stage.prompt.clone(), stage.slug.clone(), stage.required);
        self.captured_in_stage += 1;
        self.total_captured += 1;
        self.last_capture_at = Some(now);

        let report = CaptureReport {
            prompt,
            slug,
            shot: self.captured_in_stage,
            required,
            stage_complete: self.captured_in_stage >= required,
        };
        if report.stage_complete {
            self.stage_index += 1;
            self.captured_in_stage = 0;
        }
        EnrollmentStep::Capture(report)
    }
}

pub fn validate_person_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::InvalidPersonName {
            name: name.to_string(),
            message: "name is empty".to_string(),
        });
    }
    if name == "." || name == ".." {
        return Err(AppError::InvalidPersonName {
            name: name.to_string(),
            message: "name is a reserved path component".to_string(),
        });
    }
    if let Some(bad) = name.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(c)) {
        return Err(AppError::InvalidPersonName {
            name: name.to_string(),
            message: format!(r#"contains '{bad}'; the characters < > : " / \ | ? * are not allowed"#),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwritePolicy {
    /// Refuse to touch an already-enrolled person.
    Reject,
    /// Clear the person's directory and start fresh.
    Replace,
}

/// Validates the name and creates the person's capture directory. With
/// [`OverwritePolicy::Reject`] an existing enrollment fails before anything
/// on disk is modified.
pub fn prepare_person_dir(
    known_faces_dir: &Path,
    name: &str,
    overwrite: OverwritePolicy,
) -> AppResult<PathBuf> {
    validate_person_name(name)?;

    let person_dir = known_faces_dir.join(name);
    if person_dir.exists() {
        match overwrite {
            OverwritePolicy::Reject => {
                return Err(AppError::PersonExists {
                    name: name.to_string(),
                    dir: person_dir,
                })
            }
            OverwritePolicy::Replace => {
                info!(dir = %person_dir.display(), "replacing existing enrollment");
                fs::remove_dir_all(&person_dir)?;
            }
        }
    }
    fs::create_dir_all(&person_dir)?;
    Ok(person_dir)
}

fn snapshot_filename(slug: &str) -> String {
    format!("{slug}-{}.png", Utc::now().format("%Y%m%dT%H%M%S%.3fZ"))
}

#[derive(Debug, Clone)]
pub struct EnrollmentRunConfig {
    pub person: String,
    pub person_dir: PathBuf,
    pub min_capture_delay: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentOutcome {
    pub person: String,
    pub person_dir: PathBuf,
    pub captured: u32,
    pub completed: bool,
    pub saved_files: Vec<PathBuf>,
    pub logs: Vec<String>,
}

/// Drives a pose plan against a frame source.
///
/// Cancellation (stop signal, end of stream, a frame read failure) ends the
/// run early but keeps every snapshot already written; only a failure to
/// save a captured frame is fatal.
pub fn run_enrollment_with<S, A, Q>(
    config: &EnrollmentRunConfig,
    plan: &[PoseStage],
    source: &mut S,
    analyzer: &A,
    stop: &Q,
) -> AppResult<EnrollmentOutcome>
where
    S: FrameSource,
    A: FaceAnalyzer,
    Q: StopSignal,
{
    let mut machine = EnrollmentSession::new(plan.to_vec(), config.min_capture_delay);
    let mut logs = Vec::new();
    let mut saved_files = Vec::new();
    let mut completed = false;

    if let Some(prompt) = machine.current_prompt() {
        info!(person = %config.person, %prompt, "starting guided enrollment");
        logs.push(format!("Pose: {prompt}"));
    }

    loop {
        if machine.is_complete() {
            completed = true;
            break;
        }
        if stop.should_stop() {
            info!(person = %config.person, "enrollment cancelled");
            logs.push("Enrollment cancelled; keeping the snapshots already saved".to_string());
            break;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                warn!("frame source ended before the pose plan finished");
                logs.push("Camera stream ended early; keeping the snapshots already saved".to_string());
                break;
            }
            Err(err) => {
                warn!(error = %err, "failed to read frame during enrollment");
                logs.push(format!("Frame read failed: {err}"));
                break;
            }
        };

        let faces = match analyzer.detect(&to_rgb(&frame)) {
            Ok(observations) => observations.len(),
            Err(err) => {
                warn!(error = %err, "face detection failed; skipping frame");
                continue;
            }
        };

        match machine.observe_frame(faces, Instant::now()) {
            EnrollmentStep::Capture(report) => {
                let path = config.person_dir.join(snapshot_filename(&report.slug));
                write_frame(&frame, &path)?;
                saved_files.push(path.clone());
                info!(
                    pose = %report.prompt,
                    shot = report.shot,
                    required = report.required,
                    path = %path.display(),
                    "snapshot saved"
                );
                logs.push(format!(
                    "Captured {}/{} for '{}'",
                    report.shot, report.required, report.prompt
                ));
                if report.stage_complete {
                    if let Some(prompt) = machine.current_prompt() {
                        info!(%prompt, "next pose");
                        logs.push(format!("Pose: {prompt}"));
                    }
                }
            }
            EnrollmentStep::Hold(HoldReason::Searching) => {
                debug!("no face in frame; waiting");
            }
            EnrollmentStep::Hold(HoldReason::MultipleFaces) => {
                debug!("multiple faces in frame; waiting for exactly one");
            }
            EnrollmentStep::Hold(HoldReason::TooSoon) => {}
            EnrollmentStep::Complete => {
                completed = true;
                break;
            }
        }
    }

    let captured = machine.total_captured();
    if completed {
        info!(person = %config.person, captured, "enrollment complete");
        logs.push(format!(
            "Enrollment complete: {captured} snapshots saved for '{}'",
            config.person
        ));
    }

    Ok(EnrollmentOutcome {
        person: config.person.clone(),
        person_dir: config.person_dir.clone(),
        captured,
        completed,
        saved_files,
        logs,
    })
}
