use serde::{Deserialize, Serialize};
use std::fmt;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    /// Intersection-over-Union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.width * self.height + other.width * other.height - inter;

        if union > 0.0 { inter / union } else { 0.0 }
    }
}

/// The fixed emotion vocabulary, in FER-2013 output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }

    /// Parse a model label. Case-insensitive; accepts the spellings used by
    /// FER+ and DeepFace-style exports ("happiness", "anger", ...).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "angry" | "anger" => Some(Emotion::Angry),
            "disgust" | "disgusted" => Some(Emotion::Disgust),
            "fear" | "fearful" | "scared" => Some(Emotion::Fear),
            "happy" | "happiness" | "joy" => Some(Emotion::Happy),
            "sad" | "sadness" => Some(Emotion::Sad),
            "surprise" | "surprised" => Some(Emotion::Surprise),
            "neutral" => Some(Emotion::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Canonical form of a model label: the vocabulary spelling when it is one of
/// the seven emotions, otherwise the trimmed lower-cased label.
pub fn canonical_label(raw: &str) -> String {
    match Emotion::from_label(raw) {
        Some(emotion) => emotion.label().to_string(),
        None => raw.trim().to_ascii_lowercase(),
    }
}

/// Confidence for one label, as a percentage in [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionScore {
    pub label: String,
    pub score: f32,
}

impl EmotionScore {
    pub fn new(label: impl AsRef<str>, score: f32) -> Self {
        Self {
            label: canonical_label(label.as_ref()),
            score,
        }
    }
}

/// Emotion classification for a single face.
///
/// The dominant label is derived from the scores and is therefore always one
/// of them. Scores are kept in model order and are not required to sum to 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionResult {
    #[serde(rename = "dominant_emotion")]
    dominant: String,
    #[serde(rename = "emotion")]
    scores: Vec<EmotionScore>,
    region: Option<BoundingBox>,
}

impl EmotionResult {
    /// Build a result from raw scores. Returns `None` when there are no scores.
    ///
    /// Ties (and NaN comparisons) resolve to the earliest entry.
    pub fn from_scores(scores: Vec<EmotionScore>, region: Option<BoundingBox>) -> Option<Self> {
        let mut best: Option<&EmotionScore> = None;
        for entry in &scores {
            match best {
                Some(current) if !(entry.score > current.score) => {}
                _ => best = Some(entry),
            }
        }
        let dominant = best?.label.clone();

        Some(Self {
            dominant,
            scores,
            region,
        })
    }

    pub fn dominant(&self) -> &str {
        &self.dominant
    }

    /// Score of the dominant label.
    pub fn dominant_score(&self) -> f32 {
        self.score_of(&self.dominant).unwrap_or(0.0)
    }

    pub fn score_of(&self, label: &str) -> Option<f32> {
        self.scores
            .iter()
            .find(|s| s.label == label)
            .map(|s| s.score)
    }

    /// Scores sorted by descending confidence (stable for equal scores).
    pub fn ranked(&self) -> Vec<&EmotionScore> {
        let mut ranked: Vec<&EmotionScore> = self.scores.iter().collect();
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }

    pub fn region(&self) -> Option<&BoundingBox> {
        self.region.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(pairs: &[(&str, f32)]) -> Vec<EmotionScore> {
        pairs.iter().map(|(l, s)| EmotionScore::new(l, *s)).collect()
    }

    #[test]
    fn test_dominant_is_argmax() {
        let result = EmotionResult::from_scores(
            scores(&[("angry", 2.0), ("happy", 92.3), ("sad", 1.1)]),
            None,
        )
        .unwrap();
        assert_eq!(result.dominant(), "happy");
        assert!((result.dominant_score() - 92.3).abs() < 1e-4);
    }

    #[test]
    fn test_dominant_tie_takes_first() {
        let result =
            EmotionResult::from_scores(scores(&[("sad", 50.0), ("fear", 50.0)]), None).unwrap();
        assert_eq!(result.dominant(), "sad");
    }

    #[test]
    fn test_empty_scores_yield_none() {
        assert!(EmotionResult::from_scores(Vec::new(), None).is_none());
    }

    #[test]
    fn test_dominant_is_always_a_key() {
        let result = EmotionResult::from_scores(
            scores(&[("contempt", 60.0), ("neutral", 40.0)]),
            None,
        )
        .unwrap();
        assert!(result.score_of(result.dominant()).is_some());
    }

    #[test]
    fn test_labels_are_canonicalised() {
        let s = EmotionScore::new(" Happiness ", 10.0);
        assert_eq!(s.label, "happy");
        let s = EmotionScore::new("Contempt", 10.0);
        assert_eq!(s.label, "contempt");
    }

    #[test]
    fn test_ranked_descending() {
        let result = EmotionResult::from_scores(
            scores(&[("angry", 5.0), ("happy", 70.0), ("sad", 25.0)]),
            None,
        )
        .unwrap();
        let labels: Vec<&str> = result.ranked().iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, ["happy", "sad", "angry"]);
    }

    #[test]
    fn test_emotion_label_roundtrip() {
        for emotion in Emotion::ALL {
            assert_eq!(Emotion::from_label(emotion.label()), Some(emotion));
        }
        assert_eq!(Emotion::from_label("SURPRISED"), Some(Emotion::Surprise));
        assert_eq!(Emotion::from_label("bored"), None);
    }

    #[test]
    fn test_serialized_shape() {
        let result = EmotionResult::from_scores(scores(&[("happy", 90.0)]), None).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["dominant_emotion"], "happy");
        assert_eq!(json["emotion"][0]["label"], "happy");
        assert!(json["region"].is_null());
    }

    #[test]
    fn test_iou_identical() {
        let a = BoundingBox {
            x: 0.0, y: 0.0, width: 100.0, height: 100.0, confidence: 1.0, landmarks: None,
        };
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_partial() {
        let a = BoundingBox {
            x: 0.0, y: 0.0, width: 10.0, height: 10.0, confidence: 1.0, landmarks: None,
        };
        let b = BoundingBox { x: 5.0, ..a.clone() };
        // Overlap: 5x10 = 50, union: 100+100-50 = 150
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
    }
}
