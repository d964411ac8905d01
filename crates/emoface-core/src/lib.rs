//! emoface-core — facial emotion recognition and mood shaping.
//!
//! Uses SCRFD to locate faces and a FER-2013 mini-Xception network to
//! classify their emotion, both via ONNX Runtime on the CPU. The result is
//! shaped into an emoji-annotated mood string or a console report.

pub mod analyzer;
pub mod classifier;
pub mod detector;
pub mod mood;
pub mod report;
pub mod types;

use std::path::PathBuf;

pub use analyzer::{analyze, AnalyzeError, AnalyzerConfig, EmotionBackend, OnnxAnalyzer, Outcome};
pub use classifier::TensorLayout;
pub use mood::{emoji_for, Mood};
pub use report::console_report;
pub use types::{BoundingBox, Emotion, EmotionResult, EmotionScore};

/// SCRFD detection model file name inside the model directory.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
/// Emotion classification model file name inside the model directory.
pub const CLASSIFIER_MODEL_FILE: &str = "emotion_mini_xception.onnx";

/// `$XDG_DATA_HOME/emoface/models`, falling back to `~/.local/share`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("emoface")
        .join("models")
}
