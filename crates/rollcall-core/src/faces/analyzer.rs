use std::env;
use std::path::{Path, PathBuf};

use dlib_face_recognition::{
    FaceDetector, FaceDetectorTrait, FaceEncoderNetwork, FaceEncoderTrait, ImageMatrix,
    LandmarkPredictor, LandmarkPredictorTrait, Rectangle,
};
use image::RgbImage;
use serde::Serialize;
use tracing::debug;

use crate::errors::{AppError, AppResult};

pub const LANDMARK_MODEL_ENV: &str = "DLIB_LANDMARK_MODEL";
pub const ENCODER_MODEL_ENV: &str = "DLIB_ENCODER_MODEL";

/// Pixel rectangle of a detected face within a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl BoundingBox {
    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }
}

impl From<&Rectangle> for BoundingBox {
    fn from(rect: &Rectangle) -> Self {
        Self {
            left: rect.left,
            top: rect.top,
            right: rect.right,
            bottom: rect.bottom,
        }
    }
}

/// One detected face: where it sits in the frame and its 128-d descriptor.
#[derive(Debug, Clone)]
pub struct FaceObservation {
    pub bounding_box: BoundingBox,
    pub descriptor: Vec<f64>,
}

/// Detection and descriptor extraction behind one seam so the pipeline can
/// run against a stub in tests.
pub trait FaceAnalyzer {
    fn detect(&self, image: &RgbImage) -> AppResult<Vec<FaceObservation>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceModelPaths {
    pub landmarks: PathBuf,
    pub encoder: PathBuf,
}

/// Resolves the two dlib model files from explicit settings first, then the
/// environment. Missing either one is fatal.
pub fn resolve_model_paths(
    landmarks: Option<&Path>,
    encoder: Option<&Path>,
) -> AppResult<FaceModelPaths> {
    Ok(FaceModelPaths {
        landmarks: resolve_model(
            landmarks,
            LANDMARK_MODEL_ENV,
            "landmark predictor",
            "--landmark-model",
        )?,
        encoder: resolve_model(
            encoder,
            ENCODER_MODEL_ENV,
            "face encoder",
            "--encoder-model",
        )?,
    })
}

fn resolve_model(
    configured: Option<&Path>,
    env_var: &'static str,
    kind: &'static str,
    flag: &'static str,
) -> AppResult<PathBuf> {
    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }
    env::var_os(env_var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .ok_or(AppError::MissingModel {
            kind,
            flag,
            env: env_var,
        })
}

/// dlib-backed analyzer: HOG detector, landmark predictor and the ResNet
/// face encoder.
pub struct DlibAnalyzer {
    detector: FaceDetector,
    predictor: LandmarkPredictor,
    encoder: FaceEncoderNetwork,
    jitters: u32,
}

impl DlibAnalyzer {
    pub fn new(models: &FaceModelPaths, jitters: u32) -> AppResult<Self> {
        debug!(path = %models.landmarks.display(), "loading landmark model");
        let predictor =
            LandmarkPredictor::open(&models.landmarks).map_err(|message| AppError::ModelLoad {
                path: models.landmarks.clone(),
                message,
            })?;
        debug!(path = %models.encoder.display(), "loading encoder model");
        let encoder =
            FaceEncoderNetwork::open(&models.encoder).map_err(|message| AppError::ModelLoad {
                path: models.encoder.clone(),
                message,
            })?;
        Ok(Self {
            detector: FaceDetector::new(),
            predictor,
            encoder,
            jitters,
        })
    }
}

impl FaceAnalyzer for DlibAnalyzer {
    fn detect(&self, image: &RgbImage) -> AppResult<Vec<FaceObservation>> {
        let matrix = ImageMatrix::from_image(image);
        let locations = self.detector.face_locations(&matrix);
        if locations.is_empty() {
            return Ok(Vec::new());
        }

        let mut landmarks = Vec::with_capacity(locations.len());
        for rect in locations.iter() {
            landmarks.push(self.predictor.face_landmarks(&matrix, rect));
        }
        let encodings = self
            .encoder
            .get_face_encodings(&matrix, &landmarks, self.jitters);

        let observations = locations
            .iter()
            .zip(encodings.iter())
            .map(|(rect, encoding)| FaceObservation {
                bounding_box: BoundingBox::from(rect),
                descriptor: encoding.as_ref().to_vec(),
            })
            .collect();
        Ok(observations)
    }
}

/// Scripted analyzer for tests. Pops one programmed response per call and
/// falls back to a constant face (or no face) once the script runs out.
#[cfg(test)]
pub(crate) struct StubAnalyzer {
    responses: std::cell::RefCell<std::collections::VecDeque<AppResult<Vec<FaceObservation>>>>,
    constant: Option<Vec<f64>>,
    calls: std::cell::Cell<usize>,
}

#[cfg(test)]
impl StubAnalyzer {
    pub(crate) fn scripted() -> Self {
        Self {
            responses: std::cell::RefCell::new(std::collections::VecDeque::new()),
            constant: None,
            calls: std::cell::Cell::new(0),
        }
    }

    /// Always reports one face with the given descriptor.
    pub(crate) fn constant(descriptor: Vec<f64>) -> Self {
        Self {
            responses: std::cell::RefCell::new(std::collections::VecDeque::new()),
            constant: Some(descriptor),
            calls: std::cell::Cell::new(0),
        }
    }

    pub(crate) fn push_faces(&self, descriptors: Vec<Vec<f64>>) {
        let observations = descriptors.into_iter().map(observation).collect();
        self.responses.borrow_mut().push_back(Ok(observations));
    }

    pub(crate) fn push_no_face(&self) {
        self.responses.borrow_mut().push_back(Ok(Vec::new()));
    }

    pub(crate) fn push_error(&self, err: AppError) {
        self.responses.borrow_mut().push_back(Err(err));
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.get()
    }
}

#[cfg(test)]
impl FaceAnalyzer for StubAnalyzer {
    fn detect(&self, _image: &RgbImage) -> AppResult<Vec<FaceObservation>> {
        self.calls.set(self.calls.get() + 1);
        if let Some(response) = self.responses.borrow_mut().pop_front() {
            return response;
        }
        match &self.constant {
            Some(descriptor) => Ok(vec![observation(descriptor.clone())]),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
pub(crate) fn observation(descriptor: Vec<f64>) -> FaceObservation {
    FaceObservation {
        bounding_box: BoundingBox {
            left: 0,
            top: 0,
            right: 16,
            bottom: 16,
        },
        descriptor,
    }
}
