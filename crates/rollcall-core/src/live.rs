use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::capture::{to_rgb, FrameSource};
use crate::errors::{AppError, AppResult};
use crate::faces::analyzer::{BoundingBox, FaceAnalyzer};
use crate::faces::gallery::Gallery;
use crate::faces::matcher::{match_descriptor, MatchOutcome};
use crate::session::{SessionEvent, SessionTracker};

/// Polled once per loop iteration; when it fires the session winds down and
/// the recognized set is still flushed by the caller.
pub trait StopSignal {
    fn should_stop(&self) -> bool;
}

impl StopSignal for AtomicBool {
    fn should_stop(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

/// A labelled face rectangle from the most recent detection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub bounding_box: BoundingBox,
    pub label: String,
}

/// Holds the annotations computed by the last detection pass so the frames
/// in between can reuse them instead of re-running the models.
#[derive(Debug, Default, Clone)]
pub struct AnnotationCache {
    annotations: Vec<Annotation>,
    frame_index: u64,
    computed_at: Option<DateTime<Utc>>,
}

impl AnnotationCache {
    pub fn replace(&mut self, annotations: Vec<Annotation>, frame_index: u64) {
        self.annotations = annotations;
        self.frame_index = frame_index;
        self.computed_at = Some(Utc::now());
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Frame index the cached annotations were computed at.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn computed_at(&self) -> Option<DateTime<Utc>> {
        self.computed_at
    }

    /// How many frames old the cache is, or `None` before the first pass.
    pub fn age_frames(&self, current_frame: u64) -> Option<u64> {
        self.computed_at
            .map(|_| current_frame.saturating_sub(self.frame_index))
    }
}

#[derive(Debug, Clone)]
pub struct LiveSessionConfig {
    pub tolerance: f64,
    pub frame_interval: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    pub recognized: BTreeSet<String>,
    pub frames_read: u64,
    pub detect_cycles: u64,
    pub stopped_by_signal: bool,
    pub logs: Vec<String>,
}

/// Runs the recognition loop until the source ends, a frame read fails or
/// the stop signal fires.
///
/// Detection runs on every `frame_interval`-th frame; the other frames
/// reuse the annotation cache. Each detected face is matched against the
/// gallery and fed to the session tracker, so an identity is logged exactly
/// once no matter how many frames it appears in. Frame-level failures end
/// the loop without discarding what was recognized so far.
pub fn run_live_session_with<S, A, Q>(
    config: &LiveSessionConfig,
    gallery: &Gallery,
    source: &mut S,
    analyzer: &A,
    stop: &Q,
) -> AppResult<SessionOutcome>
where
    S: FrameSource,
    A: FaceAnalyzer,
    Q: StopSignal,
{
    if gallery.is_empty() {
        return Err(AppError::NoKnownIdentities {
            dir: gallery.dir().to_path_buf(),
        });
    }

    let interval = u64::from(config.frame_interval.max(1));
    let mut tracker = SessionTracker::new();
    let mut cache = AnnotationCache::default();
    let mut logs = Vec::new();
    let mut frames_read = 0u64;
    let mut detect_cycles = 0u64;
    let mut stopped_by_signal = false;

    loop {
        if stop.should_stop() {
            info!("stop signal received; ending session");
            logs.push("Stop signal received; ending session".to_string());
            stopped_by_signal = true;
            break;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("frame source ended");
                logs.push("Camera stream ended; ending session".to_string());
                break;
            }
            Err(err) => {
                warn!(error = %err, "failed to read frame; ending session");
                logs.push(format!("Frame read failed: {err}"));
                break;
            }
        };
        frames_read += 1;

        if frames_read % interval != 0 {
            if let Some(age) = cache.age_frames(frames_read) {
                trace!(age_frames = age, "reusing cached annotations");
            }
            continue;
        }

        match analyzer.detect(&to_rgb(&frame)) {
            Ok(observations) => {
                detect_cycles += 1;
                let mut annotations = Vec::with_capacity(observations.len());
                for observation in &observations {
                    let outcome =
                        match_descriptor(&observation.descriptor, gallery, config.tolerance);
                    if tracker.observe(&outcome) == SessionEvent::FirstRecognition {
                        if let MatchOutcome::Recognized { identity, distance } = &outcome {
                            info!(identity = %identity, distance, "attendee recognized");
                            logs.push(format!("Recognized {identity}; added to session log"));
                        }
                    }
                    annotations.push(Annotation {
                        bounding_box: observation.bounding_box.clone(),
                        label: outcome.label().to_string(),
                    });
                }
                cache.replace(annotations, frames_read);
            }
            Err(err) => {
                warn!(error = %err, "face detection failed; skipping frame");
            }
        }
    }

    Ok(SessionOutcome {
        recognized: tracker.into_names(),
        frames_read,
        detect_cycles,
        stopped_by_signal,
        logs,
    })
}

/// Stop signal that never fires.
#[cfg(test)]
pub(crate) struct NeverStop;

#[cfg(test)]
impl StopSignal for NeverStop {
    fn should_stop(&self) -> bool {
        false
    }
}

/// Fires on the n-th poll.
#[cfg(test)]
pub(crate) struct StopAfter {
    remaining: std::cell::Cell<u32>,
}

#[cfg(test)]
impl StopAfter {
    pub(crate) fn polls(count: u32) -> Self {
        Self {
            remaining: std::cell::Cell::new(count),
        }
    }
}

#[cfg(test)]
impl StopSignal for StopAfter {
    fn should_stop(&self) -> bool {
        let remaining = self.remaining.get();
        if remaining <= 1 {
            true
        } else {
            self.remaining.set(remaining - 1);
            false
        }
    }
}
