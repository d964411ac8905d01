//! Facial emotion classifier via ONNX Runtime.
//!
//! Runs a mini-Xception network trained on FER-2013 over a 64×64 grayscale
//! face crop and reports a percentage per emotion label.

use crate::types::{canonical_label, Emotion, EmotionScore};
use image::imageops::{self, FilterType};
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

const EMOTION_INPUT_SIZE: u32 = 64;
/// Tolerance when deciding whether raw outputs already form a distribution.
const PROBABILITY_SUM_TOLERANCE: f32 = 1e-3;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("emotion model not found: {0}")]
    ModelNotFound(String),
    #[error("could not read labels file {path}: {source}")]
    Labels {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("labels file {0} has no labels")]
    EmptyLabels(String),
    #[error("emotion classification failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Memory layout the model expects for its single-channel input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
    /// `[1, 64, 64, 1]`, the layout of Keras exports.
    #[default]
    Nhwc,
    /// `[1, 1, 64, 64]`
    Nchw,
}

impl FromStr for TensorLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nhwc" => Ok(TensorLayout::Nhwc),
            "nchw" => Ok(TensorLayout::Nchw),
            other => Err(format!("unknown tensor layout '{other}' (expected nhwc or nchw)")),
        }
    }
}

/// Default label order: the FER-2013 class order.
pub fn default_labels() -> Vec<String> {
    Emotion::ALL.iter().map(|e| e.label().to_string()).collect()
}

/// Read one label per line, skipping blank lines.
pub fn load_labels(path: &Path) -> Result<Vec<String>, ClassifierError> {
    let text = std::fs::read_to_string(path).map_err(|source| ClassifierError::Labels {
        path: path.display().to_string(),
        source,
    })?;
    let labels: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(canonical_label)
        .collect();
    if labels.is_empty() {
        return Err(ClassifierError::EmptyLabels(path.display().to_string()));
    }
    Ok(labels)
}

pub struct EmotionClassifier {
    session: Session,
    labels: Vec<String>,
    layout: TensorLayout,
}

impl EmotionClassifier {
    /// Load the emotion ONNX model. `labels` gives the output class order.
    pub fn load(
        model_path: &Path,
        labels: Vec<String>,
        layout: TensorLayout,
    ) -> Result<Self, ClassifierError> {
        if !model_path.exists() {
            return Err(ClassifierError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            inputs = ?session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
            labels = ?labels,
            ?layout,
            "loaded emotion classifier"
        );

        Ok(Self {
            session,
            labels,
            layout,
        })
    }

    /// Classify a grayscale face crop. Scores are percentages in label order.
    pub fn classify(&mut self, face: &GrayImage) -> Result<Vec<EmotionScore>, ClassifierError> {
        let input = preprocess(face, self.layout);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::InferenceFailed(format!("score extraction: {e}")))?;

        if raw.len() != self.labels.len() {
            return Err(ClassifierError::InferenceFailed(format!(
                "model produced {} scores for {} labels",
                raw.len(),
                self.labels.len()
            )));
        }

        Ok(self
            .labels
            .iter()
            .zip(to_percentages(raw))
            .map(|(label, score)| EmotionScore {
                label: label.clone(),
                score,
            })
            .collect())
    }
}

/// Resize to 64×64 and scale pixels to [-1, 1].
fn preprocess(face: &GrayImage, layout: TensorLayout) -> Array4<f32> {
    let size = EMOTION_INPUT_SIZE as usize;
    let resized = imageops::resize(face, EMOTION_INPUT_SIZE, EMOTION_INPUT_SIZE, FilterType::Triangle);

    let shape = match layout {
        TensorLayout::Nhwc => (1, size, size, 1),
        TensorLayout::Nchw => (1, 1, size, size),
    };
    let mut tensor = Array4::<f32>::zeros(shape);

    for (x, y, pixel) in resized.enumerate_pixels() {
        let value = (pixel.0[0] as f32 / 255.0 - 0.5) * 2.0;
        let (x, y) = (x as usize, y as usize);
        match layout {
            TensorLayout::Nhwc => tensor[[0, y, x, 0]] = value,
            TensorLayout::Nchw => tensor[[0, 0, y, x]] = value,
        }
    }

    tensor
}

/// Convert raw model outputs into percentages. Outputs that already form a
/// probability distribution are scaled as-is; anything else is treated as
/// logits and passed through softmax.
fn to_percentages(raw: &[f32]) -> Vec<f32> {
    let sum: f32 = raw.iter().sum();
    let is_distribution = raw.iter().all(|p| (0.0..=1.0).contains(p))
        && (sum - 1.0).abs() <= PROBABILITY_SUM_TOLERANCE;

    if is_distribution {
        return raw.iter().map(|p| p * 100.0).collect();
    }

    let max = raw.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp: Vec<f32> = raw.iter().map(|&x| (x - max).exp()).collect();
    let total: f32 = exp.iter().sum();
    if total > 0.0 {
        exp.iter().map(|e| e / total * 100.0).collect()
    } else {
        vec![0.0; raw.len()]
    }
}
