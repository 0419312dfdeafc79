use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::errors::{AppError, AppResult};
use crate::faces::analyzer::FaceAnalyzer;

/// One reference descriptor, tagged with the identity it belongs to. The
/// gallery pools every descriptor from every identity into one flat list so
/// matching is a single scan.
#[derive(Debug, Clone)]
pub struct ReferenceDescriptor {
    pub identity: String,
    pub descriptor: Vec<f64>,
}

/// Per-identity load statistics, in directory order.
#[derive(Debug, Clone, Serialize)]
pub struct IdentitySummary {
    pub name: String,
    pub images: usize,
    pub descriptors: usize,
}

/// Directory listing entry for an enrolled identity, without running any
/// face analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityListing {
    pub name: String,
    pub images: usize,
}

#[derive(Debug, Clone)]
pub struct Gallery {
    dir: PathBuf,
    entries: Vec<ReferenceDescriptor>,
    identities: Vec<IdentitySummary>,
}

impl Gallery {
    /// Assembles a gallery from descriptors already in memory.
    pub fn from_entries(dir: PathBuf, entries: Vec<ReferenceDescriptor>) -> Self {
        let mut identities: Vec<IdentitySummary> = Vec::new();
        for entry in &entries {
            match identities.iter_mut().find(|i| i.name == entry.identity) {
                Some(summary) => {
                    summary.images += 1;
                    summary.descriptors += 1;
                }
                None => identities.push(IdentitySummary {
                    name: entry.identity.clone(),
                    images: 1,
                    descriptors: 1,
                }),
            }
        }
        Self {
            dir,
            entries,
            identities,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entries(&self) -> &[ReferenceDescriptor] {
        &self.entries
    }

    pub fn identities(&self) -> &[IdentitySummary] {
        &self.identities
    }

    /// True when no identity contributed a single usable descriptor.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug)]
pub struct GalleryLoadOutcome {
    pub gallery: Gallery,
    pub logs: Vec<String>,
}

/// Loads the reference gallery from `dir`, one subdirectory per identity.
///
/// Subdirectories and the images inside them are visited in name order so
/// the pooled candidate list is stable across runs. Images that cannot be
/// decoded or that contain no detectable face are skipped with a warning;
/// only a missing root or a root without identity subdirectories is fatal.
/// Each image contributes at most one descriptor, taken from the first
/// detected face.
pub fn load_gallery<A: FaceAnalyzer>(dir: &Path, analyzer: &A) -> AppResult<GalleryLoadOutcome> {
    if !dir.is_dir() {
        return Err(AppError::NoKnownIdentities {
            dir: dir.to_path_buf(),
        });
    }

    let person_dirs = sorted_entries(dir, |file_type| file_type.is_dir())?;
    if person_dirs.is_empty() {
        return Err(AppError::NoKnownIdentities {
            dir: dir.to_path_buf(),
        });
    }

    let mut entries = Vec::new();
    let mut identities = Vec::new();
    let mut logs = Vec::new();

    for person_dir in person_dirs {
        let Some(name) = person_dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let mut images = 0usize;
        let mut descriptors = 0usize;

        for image_path in sorted_entries(&person_dir, |file_type| file_type.is_file())? {
            images += 1;
            let image = match image::open(&image_path) {
                Ok(image) => image.to_rgb8(),
                Err(source) => {
                    let err = AppError::ImageDecode {
                        path: image_path.clone(),
                        source,
                    };
                    warn!(error = %err, "skipping unreadable reference image");
                    logs.push(format!("Skipping {}: {err}", image_path.display()));
                    continue;
                }
            };

            match analyzer.detect(&image) {
                Ok(observations) => match observations.first() {
                    Some(observation) => {
                        entries.push(ReferenceDescriptor {
                            identity: name.clone(),
                            descriptor: observation.descriptor.clone(),
                        });
                        descriptors += 1;
                    }
                    None => {
                        warn!(path = %image_path.display(), "no face found in reference image");
                        logs.push(format!(
                            "No face found in {}; skipping",
                            image_path.display()
                        ));
                    }
                },
                Err(err) => {
                    warn!(error = %err, path = %image_path.display(), "face analysis failed");
                    logs.push(format!(
                        "Face analysis failed for {}: {err}",
                        image_path.display()
                    ));
                }
            }
        }

        identities.push(IdentitySummary {
            name,
            images,
            descriptors,
        });
    }

    info!(
        identities = identities.len(),
        descriptors = entries.len(),
        dir = %dir.display(),
        "reference gallery loaded"
    );
    logs.push(format!(
        "Loaded {} descriptors across {} identities from {}",
        entries.len(),
        identities.len(),
        dir.display()
    ));

    Ok(GalleryLoadOutcome {
        gallery: Gallery {
            dir: dir.to_path_buf(),
            entries,
            identities,
        },
        logs,
    })
}

/// Lists enrolled identities and their image counts without touching the
/// face models. A missing root is an empty roster, not an error.
pub fn list_identities(dir: &Path) -> AppResult<Vec<IdentityListing>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut listings = Vec::new();
    for person_dir in sorted_entries(dir, |file_type| file_type.is_dir())? {
        let Some(name) = person_dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let images = sorted_entries(&person_dir, |file_type| file_type.is_file())?.len();
        listings.push(IdentityListing { name, images });
    }
    Ok(listings)
}

fn sorted_entries(
    dir: &Path,
    keep: impl Fn(&fs::FileType) -> bool,
) -> AppResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if keep(&entry.file_type()?) {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faces::analyzer::StubAnalyzer;
    use image::{GrayImage, Luma};
    use tempfile::tempdir;

    fn write_png(path: &Path) {
        GrayImage::from_pixel(8, 8, Luma([200u8]))
            .save(path)
            .expect("write png");
    }

    fn person_dir(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).expect("create person dir");
        dir
    }

    #[test]
    fn loads_identities_in_name_order_and_pools_descriptors() {
        let root = tempdir().expect("tempdir");
        write_png(&person_dir(root.path(), "bob").join("face.png"));
        write_png(&person_dir(root.path(), "alice").join("face.png"));

        // Sorted traversal visits alice before bob.
        let analyzer = StubAnalyzer::scripted();
        analyzer.push_faces(vec![vec![0.1, 0.1]]);
        analyzer.push_faces(vec![vec![0.9, 0.9]]);

        let outcome = load_gallery(root.path(), &analyzer).expect("load");
        let gallery = outcome.gallery;

        assert_eq!(gallery.len(), 2);
        assert_eq!(gallery.entries()[0].identity, "alice");
        assert_eq!(gallery.entries()[0].descriptor, vec![0.1, 0.1]);
        assert_eq!(gallery.entries()[1].identity, "bob");
        assert_eq!(gallery.identities()[0].name, "alice");
        assert_eq!(gallery.identities()[1].name, "bob");
    }

    #[test]
    fn images_without_faces_are_skipped_with_one_warning_each() {
        let root = tempdir().expect("tempdir");
        let carol = person_dir(root.path(), "carol");
        write_png(&carol.join("a.png"));
        write_png(&carol.join("b.png"));
        write_png(&carol.join("c.png"));

        let analyzer = StubAnalyzer::scripted();
        analyzer.push_faces(vec![vec![0.1]]);
        analyzer.push_no_face();
        analyzer.push_faces(vec![vec![0.3]]);

        let outcome = load_gallery(root.path(), &analyzer).expect("load");

        assert_eq!(outcome.gallery.len(), 2);
        let summary = &outcome.gallery.identities()[0];
        assert_eq!(summary.images, 3);
        assert_eq!(summary.descriptors, 2);
        let warnings: Vec<_> = outcome
            .logs
            .iter()
            .filter(|line| line.contains("No face found"))
            .collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("b.png"));
    }

    #[test]
    fn unreadable_images_are_skipped_not_fatal() {
        let root = tempdir().expect("tempdir");
        let alice = person_dir(root.path(), "alice");
        fs::write(alice.join("broken.png"), b"definitely not a png").expect("write junk");
        write_png(&alice.join("good.png"));

        let analyzer = StubAnalyzer::scripted();
        analyzer.push_faces(vec![vec![0.5]]);

        let outcome = load_gallery(root.path(), &analyzer).expect("load");

        assert_eq!(outcome.gallery.len(), 1);
        assert!(outcome
            .logs
            .iter()
            .any(|line| line.contains("broken.png") && line.contains("Skipping")));
    }

    #[test]
    fn analysis_failures_are_absorbed_per_image() {
        let root = tempdir().expect("tempdir");
        let alice = person_dir(root.path(), "alice");
        write_png(&alice.join("a.png"));
        write_png(&alice.join("b.png"));

        let analyzer = StubAnalyzer::scripted();
        analyzer.push_error(AppError::FrameProcessing("detector exploded".into()));
        analyzer.push_faces(vec![vec![0.2]]);

        let outcome = load_gallery(root.path(), &analyzer).expect("load");

        assert_eq!(outcome.gallery.len(), 1);
        assert!(outcome
            .logs
            .iter()
            .any(|line| line.contains("Face analysis failed")));
    }

    #[test]
    fn multi_face_images_contribute_only_the_first_descriptor() {
        let root = tempdir().expect("tempdir");
        write_png(&person_dir(root.path(), "dave").join("crowd.png"));

        let analyzer = StubAnalyzer::scripted();
        analyzer.push_faces(vec![vec![0.1], vec![0.9]]);

        let outcome = load_gallery(root.path(), &analyzer).expect("load");

        assert_eq!(outcome.gallery.len(), 1);
        assert_eq!(outcome.gallery.entries()[0].descriptor, vec![0.1]);
    }

    #[test]
    fn missing_root_is_fatal() {
        let root = tempdir().expect("tempdir");
        let missing = root.path().join("known_faces");

        let err = load_gallery(&missing, &StubAnalyzer::scripted()).expect_err("should fail");

        match err {
            AppError::NoKnownIdentities { dir } => assert_eq!(dir, missing),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn root_without_identity_dirs_is_fatal() {
        let root = tempdir().expect("tempdir");
        fs::write(root.path().join("stray.txt"), b"not a directory").expect("write");

        let err = load_gallery(root.path(), &StubAnalyzer::scripted()).expect_err("should fail");

        assert!(matches!(err, AppError::NoKnownIdentities { .. }));
    }

    #[test]
    fn identity_without_usable_images_stays_out_of_matching() {
        let root = tempdir().expect("tempdir");
        write_png(&person_dir(root.path(), "erin").join("face.png"));

        let analyzer = StubAnalyzer::scripted();
        analyzer.push_no_face();

        let outcome = load_gallery(root.path(), &analyzer).expect("load");

        assert!(outcome.gallery.is_empty());
        assert_eq!(outcome.gallery.identities()[0].descriptors, 0);
        assert_eq!(outcome.gallery.identities()[0].images, 1);
    }

    #[test]
    fn listing_skips_face_analysis_entirely() {
        let root = tempdir().expect("tempdir");
        let alice = person_dir(root.path(), "alice");
        write_png(&alice.join("a.png"));
        write_png(&alice.join("b.png"));
        person_dir(root.path(), "zed");

        let listings = list_identities(root.path()).expect("list");

        assert_eq!(
            listings,
            vec![
                IdentityListing {
                    name: "alice".into(),
                    images: 2
                },
                IdentityListing {
                    name: "zed".into(),
                    images: 0
                },
            ]
        );
    }

    #[test]
    fn listing_missing_root_is_empty() {
        let root = tempdir().expect("tempdir");

        let listings = list_identities(&root.path().join("known_faces")).expect("list");

        assert!(listings.is_empty());
    }
}
