use std::collections::BTreeSet;

use crate::faces::matcher::MatchOutcome;

/// What a single observation did to the session set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The identity entered the set for the first time this session.
    FirstRecognition,
    /// The identity was already present; nothing changed.
    Repeat,
    /// The observation matched nobody; nothing changed.
    Unrecognized,
}

/// Set of identities recognized during one run. Names only ever enter the
/// set; the snapshot grows monotonically until the session ends.
#[derive(Debug, Default, Clone)]
pub struct SessionTracker {
    recognized: BTreeSet<String>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a match outcome. Observing the same identity any number of
    /// times is equivalent to observing it once.
    pub fn observe(&mut self, outcome: &MatchOutcome) -> SessionEvent {
        match outcome {
            MatchOutcome::Recognized { identity, .. } => {
                if self.recognized.insert(identity.clone()) {
                    SessionEvent::FirstRecognition
                } else {
                    SessionEvent::Repeat
                }
            }
            MatchOutcome::Unknown => SessionEvent::Unrecognized,
        }
    }

    /// Current recognized set, iterable in name order.
    pub fn snapshot(&self) -> &BTreeSet<String> {
        &self.recognized
    }

    pub fn into_names(self) -> BTreeSet<String> {
        self.recognized
    }

    pub fn len(&self) -> usize {
        self.recognized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recognized.is_empty()
    }
}
