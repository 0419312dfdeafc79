use crate::faces::gallery::Gallery;

/// Label used for faces that match nobody in the gallery.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Result of comparing one live descriptor against the gallery.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Recognized { identity: String, distance: f64 },
    Unknown,
}

impl MatchOutcome {
    /// Display label: the identity, or [`UNKNOWN_LABEL`].
    pub fn label(&self) -> &str {
        match self {
            Self::Recognized { identity, .. } => identity,
            Self::Unknown => UNKNOWN_LABEL,
        }
    }
}

pub fn euclidean_distance(lhs: &[f64], rhs: &[f64]) -> f64 {
    debug_assert_eq!(lhs.len(), rhs.len());
    lhs.iter()
        .zip(rhs.iter())
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f64>()
        .sqrt()
}

/// Nearest-neighbour match over the pooled gallery descriptors.
///
/// The candidate with the smallest Euclidean distance wins if that distance
/// is within `tolerance`. Ties keep the first candidate in gallery order, so
/// the result is deterministic for a given gallery. An empty gallery always
/// yields [`MatchOutcome::Unknown`].
pub fn match_descriptor(descriptor: &[f64], gallery: &Gallery, tolerance: f64) -> MatchOutcome {
    let mut best: Option<(usize, f64)> = None;
    for (index, candidate) in gallery.entries().iter().enumerate() {
        let distance = euclidean_distance(descriptor, &candidate.descriptor);
        if best.map_or(true, |(_, best_distance)| distance < best_distance) {
            best = Some((index, distance));
        }
    }

    match best {
        Some((index, distance)) if distance <= tolerance => MatchOutcome::Recognized {
            identity: gallery.entries()[index].identity.clone(),
            distance,
        },
        _ => MatchOutcome::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faces::gallery::ReferenceDescriptor;
    use std::path::PathBuf;

    fn gallery(entries: &[(&str, Vec<f64>)]) -> Gallery {
        Gallery::from_entries(
            PathBuf::from("known_faces"),
            entries
                .iter()
                .map(|(identity, descriptor)| ReferenceDescriptor {
                    identity: identity.to_string(),
                    descriptor: descriptor.clone(),
                })
                .collect(),
        )
    }

    #[test]
    fn closest_candidate_within_tolerance_wins() {
        let gallery = gallery(&[
            ("alice", vec![0.3, 0.0]),
            ("bob", vec![0.9, 0.0]),
        ]);

        let outcome = match_descriptor(&[0.0, 0.0], &gallery, 0.6);

        match outcome {
            MatchOutcome::Recognized { identity, distance } => {
                assert_eq!(identity, "alice");
                assert!((distance - 0.3).abs() < 1e-9);
            }
            MatchOutcome::Unknown => panic!("expected a match"),
        }
    }

    #[test]
    fn nearest_above_tolerance_is_unknown() {
        let gallery = gallery(&[
            ("alice", vec![0.7, 0.0]),
            ("bob", vec![0.65, 0.0]),
        ]);

        let outcome = match_descriptor(&[0.0, 0.0], &gallery, 0.6);

        assert_eq!(outcome, MatchOutcome::Unknown);
    }

    #[test]
    fn distance_equal_to_tolerance_still_matches() {
        let gallery = gallery(&[("alice", vec![0.6, 0.0])]);

        let outcome = match_descriptor(&[0.0, 0.0], &gallery, 0.6);

        assert_eq!(outcome.label(), "alice");
    }

    #[test]
    fn empty_gallery_is_unknown_not_an_error() {
        let gallery = gallery(&[]);

        assert_eq!(match_descriptor(&[0.5, 0.5], &gallery, 0.6), MatchOutcome::Unknown);
    }

    #[test]
    fn exact_tie_keeps_first_gallery_entry() {
        let gallery = gallery(&[
            ("bob", vec![0.2, 0.0]),
            ("alice", vec![0.2, 0.0]),
        ]);

        let outcome = match_descriptor(&[0.0, 0.0], &gallery, 0.6);

        assert_eq!(outcome.label(), "bob");
    }

    #[test]
    fn widening_tolerance_never_loses_a_match() {
        let gallery = gallery(&[("alice", vec![0.5, 0.0])]);
        let probe = [0.0, 0.0];

        assert_eq!(match_descriptor(&probe, &gallery, 0.4), MatchOutcome::Unknown);
        for tolerance in [0.5, 0.6, 0.8, 1.0] {
            assert_eq!(
                match_descriptor(&probe, &gallery, tolerance).label(),
                "alice",
                "tolerance {tolerance} should keep the match"
            );
        }
    }

    #[test]
    fn euclidean_distance_matches_hand_computation() {
        assert_eq!(euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(euclidean_distance(&[1.0, 1.0], &[1.0, 1.0]), 0.0);
    }
}
