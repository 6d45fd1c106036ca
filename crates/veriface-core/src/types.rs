use serde::{Deserialize, Serialize};

use crate::embedding::StoredEmbedding;
use crate::error::FaceError;

/// Face embedding vector (512-dimensional for Facenet512).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model that produced this embedding (e.g., "facenet512").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values, model_version: None }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Euclidean (L2) distance to `other`, accumulated in f64.
    ///
    /// Embeddings of different lengths are never comparable: the mismatch
    /// means enrollment and verification ran against different models.
    pub fn euclidean_distance(&self, other: &Embedding) -> Result<f64, FaceError> {
        if self.values.len() != other.values.len() {
            return Err(FaceError::DimensionMismatch {
                expected: self.values.len(),
                actual: other.values.len(),
            });
        }

        let sum: f64 = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| {
                let d = *a as f64 - *b as f64;
                d * d
            })
            .sum();

        Ok(sum.sqrt())
    }
}

/// Axis-aligned face box in frame pixel coordinates.
///
/// Detectors may report boxes that overhang the frame; [`FaceRegion::within`]
/// and [`FaceRegion::clipped`] bring them back inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    /// Build a region from floating-point detector output, clipped to the frame.
    /// Returns `None` when nothing of the box lies inside the frame.
    pub fn clipped(
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        frame_width: u32,
        frame_height: u32,
    ) -> Option<Self> {
        if !(x.is_finite() && y.is_finite() && width.is_finite() && height.is_finite()) {
            return None;
        }

        let x0 = x.floor().clamp(0.0, frame_width as f32) as u32;
        let y0 = y.floor().clamp(0.0, frame_height as f32) as u32;
        let x1 = (x + width).ceil().clamp(0.0, frame_width as f32) as u32;
        let y1 = (y + height).ceil().clamp(0.0, frame_height as f32) as u32;

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(Self { x: x0, y: y0, width: x1 - x0, height: y1 - y0 })
    }

    /// The part of this region that lies inside the frame, or `None` when
    /// none of it does.
    pub fn within(&self, frame_width: u32, frame_height: u32) -> Option<Self> {
        let x0 = self.x.min(frame_width);
        let y0 = self.y.min(frame_height);
        let x1 = self.x.saturating_add(self.width).min(frame_width);
        let y1 = self.y.saturating_add(self.height).min(frame_height);

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(Self { x: x0, y: y0, width: x1 - x0, height: y1 - y0 })
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Grow by `padding` on every side, then clip to the frame.
    pub fn padded(&self, padding: u32, frame_width: u32, frame_height: u32) -> Self {
        let x0 = self.x.saturating_sub(padding);
        let y0 = self.y.saturating_sub(padding);
        let x1 = self.x.saturating_add(self.width).saturating_add(padding).min(frame_width);
        let y1 = self.y.saturating_add(self.height).saturating_add(padding).min(frame_height);

        Self {
            x: x0,
            y: y0,
            width: x1.saturating_sub(x0),
            height: y1.saturating_sub(y0),
        }
    }
}

/// Outcome of a 1:1 comparison.
///
/// Read `is_match` for the decision. Under the default
/// `ThresholdBasis::Raw` the decision uses the unrounded score, so a distance
/// just past the threshold distance can report `score: 45` alongside
/// `is_match: false`. `score >= 45` is only equivalent to a match under
/// `ThresholdBasis::Rounded`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub is_match: bool,
    /// Similarity score in [0, 100].
    pub score: u8,
    /// Euclidean distance; `f64::INFINITY` when an input could not be parsed.
    pub distance: f64,
}

impl MatchResult {
    /// Result used when one side of a comparison is missing or unparseable.
    pub fn unusable() -> Self {
        Self { is_match: false, score: 0, distance: f64::INFINITY }
    }
}

/// An externally stored identity considered during 1:N identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub embedding: StoredEmbedding,
}

/// Outcome of a 1:N identification scan.
///
/// `best_score` and `best_distance` describe the closest candidate even when
/// it did not clear the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    pub identified: Option<String>,
    pub best_score: u8,
    pub best_distance: f64,
}

impl Identification {
    pub fn is_identified(&self) -> bool {
        self.identified.is_some()
    }
}
