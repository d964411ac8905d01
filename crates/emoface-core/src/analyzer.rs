//! Inference boundary: the backend trait, the ONNX pipeline behind it, and the
//! typed outcome every caller branches on.

use crate::classifier::{self, ClassifierError, EmotionClassifier, TensorLayout};
use crate::detector::{DetectorError, FaceDetector};
use crate::mood::Mood;
use crate::types::{BoundingBox, EmotionResult, EmotionScore};
use crate::{CLASSIFIER_MODEL_FILE, DETECTOR_MODEL_FILE};
use image::{DynamicImage, GrayImage};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Fraction of the face box added on every side before classification.
const FACE_MARGIN: f32 = 0.1;

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error("no face detected")]
    NoFaceDetected,
    #[error("classifier returned no scores")]
    EmptyScores,
}

/// Anything that can turn an image into per-face emotion results.
///
/// Results are ordered most confident face first.
pub trait EmotionBackend {
    fn analyze(&mut self, image: &DynamicImage) -> Result<Vec<EmotionResult>, AnalyzeError>;
}

/// What a caller gets back from one analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Detected { result: EmotionResult },
    NoFace,
    Failed { diagnostic: String },
}

impl Outcome {
    /// "😊 Happy", "No face detected!" or "Error: ...".
    pub fn mood_text(&self) -> String {
        match self {
            Outcome::Detected { result } => Mood::from_result(result).headline(),
            Outcome::NoFace => "No face detected!".to_string(),
            Outcome::Failed { diagnostic } => format!("Error: {diagnostic}"),
        }
    }

    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Outcome::Failed {
            diagnostic: diagnostic.into(),
        }
    }
}

/// Run the backend and keep the first face. Errors never escape: they are
/// logged and turned into [`Outcome::Failed`].
pub fn analyze<B>(backend: &mut B, image: &DynamicImage) -> Outcome
where
    B: EmotionBackend + ?Sized,
{
    match backend.analyze(image) {
        Ok(results) => match results.into_iter().next() {
            Some(result) => {
                tracing::info!(
                    mood = %Mood::from_result(&result).with_confidence(),
                    region = ?result.region(),
                    "emotion analysis complete"
                );
                Outcome::Detected { result }
            }
            None => Outcome::NoFace,
        },
        Err(AnalyzeError::NoFaceDetected) => {
            tracing::info!("no face detected");
            Outcome::NoFace
        }
        Err(e) => {
            tracing::warn!(error = %e, "emotion analysis failed");
            Outcome::failed(e.to_string())
        }
    }
}

/// Options for building an [`OnnxAnalyzer`].
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub model_dir: PathBuf,
    /// Optional labels file overriding the FER-2013 class order.
    pub labels_path: Option<PathBuf>,
    pub layout: TensorLayout,
    /// Run the face detector before classification.
    pub face_detection: bool,
    /// Report "no face" instead of classifying the whole image.
    pub enforce_detection: bool,
}

impl AnalyzerConfig {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            labels_path: None,
            layout: TensorLayout::default(),
            face_detection: true,
            enforce_detection: false,
        }
    }

    pub fn detector_model_path(&self) -> PathBuf {
        self.model_dir.join(DETECTOR_MODEL_FILE)
    }

    pub fn classifier_model_path(&self) -> PathBuf {
        self.model_dir.join(CLASSIFIER_MODEL_FILE)
    }
}

/// Finds faces in a grayscale image, most confident first.
pub(crate) trait FaceLocator: Send {
    fn locate(&mut self, image: &GrayImage) -> Result<Vec<BoundingBox>, DetectorError>;
}

/// Scores one grayscale face crop against the label set.
pub(crate) trait EmotionScorer: Send {
    fn score(&mut self, face: &GrayImage) -> Result<Vec<EmotionScore>, ClassifierError>;
}

impl FaceLocator for FaceDetector {
    fn locate(&mut self, image: &GrayImage) -> Result<Vec<BoundingBox>, DetectorError> {
        self.detect(image)
    }
}

impl EmotionScorer for EmotionClassifier {
    fn score(&mut self, face: &GrayImage) -> Result<Vec<EmotionScore>, ClassifierError> {
        self.classify(face)
    }
}

/// SCRFD face detection followed by per-face emotion classification.
pub struct OnnxAnalyzer {
    detector: Option<Box<dyn FaceLocator>>,
    classifier: Box<dyn EmotionScorer>,
    enforce_detection: bool,
}

impl OnnxAnalyzer {
    /// Load both models. Fails fast if either is missing.
    pub fn load(config: &AnalyzerConfig) -> Result<Self, AnalyzeError> {
        let labels = match &config.labels_path {
            Some(path) => classifier::load_labels(path)?,
            None => classifier::default_labels(),
        };
        let classifier =
            EmotionClassifier::load(&config.classifier_model_path(), labels, config.layout)?;

        let detector: Option<Box<dyn FaceLocator>> = if config.face_detection {
            Some(Box::new(FaceDetector::load(&config.detector_model_path())?))
        } else {
            tracing::info!("face detection disabled; classifying whole images");
            None
        };

        Ok(Self::from_parts(
            detector,
            Box::new(classifier),
            config.enforce_detection,
        ))
    }

    /// Enforcing detection needs a detector; without one the flag is dropped.
    fn from_parts(
        detector: Option<Box<dyn FaceLocator>>,
        classifier: Box<dyn EmotionScorer>,
        enforce_detection: bool,
    ) -> Self {
        let enforce = enforce_detection && detector.is_some();
        if enforce_detection && !enforce {
            tracing::warn!("enforce_detection ignored because face detection is disabled");
        }

        Self {
            detector,
            classifier,
            enforce_detection: enforce,
        }
    }
}

impl EmotionBackend for OnnxAnalyzer {
    fn analyze(&mut self, image: &DynamicImage) -> Result<Vec<EmotionResult>, AnalyzeError> {
        let gray = image.to_luma8();

        let faces = match self.detector.as_mut() {
            Some(detector) => detector.locate(&gray)?,
            None => Vec::new(),
        };

        if faces.is_empty() {
            if self.enforce_detection {
                return Err(AnalyzeError::NoFaceDetected);
            }
            tracing::debug!("no face located; classifying the whole image");
            let scores = self.classifier.score(&gray)?;
            let result = EmotionResult::from_scores(scores, None).ok_or(AnalyzeError::EmptyScores)?;
            return Ok(vec![result]);
        }

        tracing::debug!(faces = faces.len(), "classifying detected faces");
        faces
            .into_iter()
            .map(|face| {
                let crop = crop_face(&gray, &face, FACE_MARGIN);
                let scores = self.classifier.score(&crop)?;
                EmotionResult::from_scores(scores, Some(face)).ok_or(AnalyzeError::EmptyScores)
            })
            .collect()
    }
}

/// Crop a face box grown by `margin` on every side, clamped to the image.
/// Always returns at least a 1×1 crop.
fn crop_face(image: &GrayImage, face: &BoundingBox, margin: f32) -> GrayImage {
    let (img_w, img_h) = (image.width() as f32, image.height() as f32);
    let pad_x = face.width * margin;
    let pad_y = face.height * margin;

    let x0 = (face.x - pad_x).clamp(0.0, (img_w - 1.0).max(0.0));
    let y0 = (face.y - pad_y).clamp(0.0, (img_h - 1.0).max(0.0));
    let x1 = (face.x + face.width + pad_x).clamp(x0 + 1.0, img_w.max(x0 + 1.0));
    let y1 = (face.y + face.height + pad_y).clamp(y0 + 1.0, img_h.max(y0 + 1.0));

    let (x, y) = (x0 as u32, y0 as u32);
    let w = ((x1 - x0) as u32).max(1);
    let h = ((y1 - y0) as u32).max(1);
    image::imageops::crop_imm(image, x, y, w, h).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct FixedBackend(Result<Vec<EmotionResult>, fn() -> AnalyzeError>);

    impl EmotionBackend for FixedBackend {
        fn analyze(&mut self, _image: &DynamicImage) -> Result<Vec<EmotionResult>, AnalyzeError> {
            match &self.0 {
                Ok(results) => Ok(results.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn result(label: &str, score: f32) -> EmotionResult {
        EmotionResult::from_scores(
            vec![EmotionScore::new(label, score), EmotionScore::new("neutral", 1.0)],
            None,
        )
        .unwrap()
    }

    fn blank() -> DynamicImage {
        DynamicImage::new_luma8(4, 4)
    }

    #[test]
    fn test_first_face_is_kept() {
        let mut backend = FixedBackend(Ok(vec![result("happy", 90.0), result("sad", 80.0)]));
        let outcome = analyze(&mut backend, &blank());
        assert_eq!(outcome.mood_text(), "😊 Happy");
    }

    #[test]
    fn test_empty_results_mean_no_face() {
        let mut backend = FixedBackend(Ok(Vec::new()));
        assert_eq!(analyze(&mut backend, &blank()), Outcome::NoFace);
    }

    #[test]
    fn test_no_face_error_is_not_a_failure() {
        let mut backend = FixedBackend(Err(|| AnalyzeError::NoFaceDetected));
        let outcome = analyze(&mut backend, &blank());
        assert_eq!(outcome, Outcome::NoFace);
        assert_eq!(outcome.mood_text(), "No face detected!");
    }

    #[test]
    fn test_backend_error_becomes_diagnostic() {
        let mut backend = FixedBackend(Err(|| {
            AnalyzeError::Classifier(ClassifierError::InferenceFailed("bad tensor".into()))
        }));
        let outcome = analyze(&mut backend, &blank());
        assert!(matches!(outcome, Outcome::Failed { .. }));
        assert_eq!(outcome.mood_text(), "Error: emotion classification failed: bad tensor");
    }

    #[test]
    fn test_analyze_through_trait_object() {
        let mut backend: Box<dyn EmotionBackend> =
            Box::new(FixedBackend(Ok(vec![result("angry", 70.0)])));
        assert_eq!(analyze(backend.as_mut(), &blank()).mood_text(), "😠 Angry");
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(Outcome::NoFace).unwrap();
        assert_eq!(json["status"], "no_face");
        let json = serde_json::to_value(Outcome::failed("boom")).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["diagnostic"], "boom");
    }

    #[test]
    fn test_crop_face_adds_margin() {
        let image = GrayImage::new(200, 200);
        let face = BoundingBox {
            x: 50.0, y: 50.0, width: 100.0, height: 100.0, confidence: 0.9, landmarks: None,
        };
        let crop = crop_face(&image, &face, 0.1);
        assert_eq!(crop.dimensions(), (120, 120));
    }

    #[test]
    fn test_crop_face_clamps_to_image() {
        let image = GrayImage::new(100, 80);
        let face = BoundingBox {
            x: -20.0, y: 60.0, width: 50.0, height: 50.0, confidence: 0.9, landmarks: None,
        };
        let crop = crop_face(&image, &face, 0.0);
        assert_eq!(crop.dimensions(), (30, 20));
    }

    #[test]
    fn test_crop_face_degenerate_box() {
        let image = GrayImage::new(10, 10);
        let face = BoundingBox {
            x: 500.0, y: 500.0, width: 0.0, height: 0.0, confidence: 0.9, landmarks: None,
        };
        let crop = crop_face(&image, &face, 0.1);
        assert_eq!(crop.dimensions(), (1, 1));
    }

    #[test]
    fn test_config_model_paths() {
        let config = AnalyzerConfig::new("/opt/models");
        assert_eq!(config.detector_model_path(), PathBuf::from("/opt/models/det_10g.onnx"));
        assert_eq!(
            config.classifier_model_path(),
            PathBuf::from("/opt/models/emotion_mini_xception.onnx")
        );
        assert!(!config.enforce_detection);
        assert!(config.face_detection);
    }

    #[test]
    fn test_load_reports_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let err = OnnxAnalyzer::load(&AnalyzerConfig::new(dir.path())).err().unwrap();
        assert!(matches!(
            err,
            AnalyzeError::Classifier(ClassifierError::ModelNotFound(_))
        ));
    }

    struct StubLocator(Vec<BoundingBox>);

    impl FaceLocator for StubLocator {
        fn locate(&mut self, _image: &GrayImage) -> Result<Vec<BoundingBox>, DetectorError> {
            Ok(self.0.clone())
        }
    }

    /// Records the size of every crop it is asked to score.
    #[derive(Default)]
    struct StubScorer {
        crops: Arc<Mutex<Vec<(u32, u32)>>>,
    }

    impl EmotionScorer for StubScorer {
        fn score(&mut self, face: &GrayImage) -> Result<Vec<EmotionScore>, ClassifierError> {
            self.crops.lock().unwrap().push(face.dimensions());
            Ok(vec![EmotionScore::new("happy", 80.0), EmotionScore::new("neutral", 20.0)])
        }
    }

    fn face_at(x: f32, y: f32, size: f32, confidence: f32) -> BoundingBox {
        BoundingBox { x, y, width: size, height: size, confidence, landmarks: None }
    }

    fn pipeline(
        faces: Option<Vec<BoundingBox>>,
        enforce: bool,
    ) -> (OnnxAnalyzer, Arc<Mutex<Vec<(u32, u32)>>>) {
        let scorer = StubScorer::default();
        let crops = scorer.crops.clone();
        let detector = faces.map(|f| Box::new(StubLocator(f)) as Box<dyn FaceLocator>);
        (OnnxAnalyzer::from_parts(detector, Box::new(scorer), enforce), crops)
    }

    #[test]
    fn test_no_face_classifies_whole_image() {
        let (mut analyzer, crops) = pipeline(Some(Vec::new()), false);
        let results = analyzer.analyze(&DynamicImage::new_luma8(40, 30)).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].dominant(), "happy");
        assert!(results[0].region().is_none());
        assert_eq!(*crops.lock().unwrap(), [(40, 30)]);
    }

    #[test]
    fn test_enforced_detection_reports_no_face() {
        let (mut analyzer, crops) = pipeline(Some(Vec::new()), true);
        let image = DynamicImage::new_luma8(40, 30);

        assert!(matches!(analyzer.analyze(&image), Err(AnalyzeError::NoFaceDetected)));
        let outcome = analyze(&mut analyzer, &image);
        assert_eq!(outcome, Outcome::NoFace);
        assert_eq!(outcome.mood_text(), "No face detected!");
        assert!(crops.lock().unwrap().is_empty());
    }

    #[test]
    fn test_one_result_per_face_in_detector_order() {
        let faces = vec![face_at(10.0, 10.0, 20.0, 0.9), face_at(50.0, 20.0, 10.0, 0.7)];
        let (mut analyzer, crops) = pipeline(Some(faces), true);
        let results = analyzer.analyze(&DynamicImage::new_luma8(100, 100)).unwrap();

        let confidences: Vec<f32> = results
            .iter()
            .map(|r| r.region().unwrap().confidence)
            .collect();
        assert_eq!(confidences, [0.9, 0.7]);
        assert_eq!(*crops.lock().unwrap(), [(24, 24), (12, 12)]);

        let outcome = analyze(&mut analyzer, &DynamicImage::new_luma8(100, 100));
        let Outcome::Detected { result } = outcome else {
            panic!("expected a detected face");
        };
        assert_eq!(result.region().unwrap().confidence, 0.9);
    }

    #[test]
    fn test_enforce_dropped_without_detector() {
        let (mut analyzer, crops) = pipeline(None, true);
        assert!(!analyzer.enforce_detection);

        let results = analyzer.analyze(&DynamicImage::new_luma8(16, 16)).unwrap();
        assert!(results[0].region().is_none());
        assert_eq!(*crops.lock().unwrap(), [(16, 16)]);
    }
}
