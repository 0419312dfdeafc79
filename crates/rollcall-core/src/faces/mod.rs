pub mod analyzer;
pub mod gallery;
pub mod matcher;

pub use analyzer::{
    resolve_model_paths, BoundingBox, DlibAnalyzer, FaceAnalyzer, FaceModelPaths, FaceObservation,
    ENCODER_MODEL_ENV, LANDMARK_MODEL_ENV,
};
pub use gallery::{
    list_identities, load_gallery, Gallery, GalleryLoadOutcome, IdentityListing, IdentitySummary,
    ReferenceDescriptor,
};
pub use matcher::{euclidean_distance, match_descriptor, MatchOutcome, UNKNOWN_LABEL};
