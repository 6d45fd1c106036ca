//! Tunable constants, grouped per component.
//!
//! Every struct deserializes with defaults for missing fields, so a partial
//! TOML file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which score the percentage threshold is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdBasis {
    /// Unrounded score: accepts exactly when `distance <= 2T * (1 - P/100)`.
    #[default]
    Raw,
    /// Reported integer score, as legacy clients computed it.
    Rounded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Distance at which the score is 50.
    pub passing_threshold_distance: f64,
    /// Minimum score (0–100) for a match.
    pub passing_threshold_percentage: f64,
    pub threshold_basis: ThresholdBasis,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            passing_threshold_distance: 20.0,
            passing_threshold_percentage: 45.0,
            threshold_basis: ThresholdBasis::Raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Frames with a longer side are scaled down before detection.
    pub max_frame_dim: u32,
    /// Floor for the shorter side when scaling down.
    pub min_frame_dim: u32,
    /// Pixels added around a detected face before cropping.
    pub face_padding: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self { max_frame_dim: 800, min_frame_dim: 320, face_padding: 50 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub embedding_dim: usize,
    pub model_dir: PathBuf,
    pub detector_file: String,
    pub embedder_file: String,
    pub intra_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 512,
            model_dir: crate::default_model_dir(),
            detector_file: "det_10g.onnx".to_string(),
            embedder_file: "facenet512.onnx".to_string(),
            intra_threads: 2,
        }
    }
}

impl ModelConfig {
    pub fn detector_path(&self) -> String {
        self.model_dir.join(&self.detector_file).to_string_lossy().into_owned()
    }

    pub fn embedder_path(&self) -> String {
        self.model_dir.join(&self.embedder_file).to_string_lossy().into_owned()
    }
}

/// What happens to an enrollment once it has been verified against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AfterVerify {
    /// Keep the enrollment so the user can retry.
    #[default]
    Retain,
    /// Drop the enrollment after the first verify, match or not.
    Clear,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollmentConfig {
    pub after_verify: AfterVerify,
    /// Enrollments older than this are treated as absent. `None` never expires.
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub matching: MatchConfig,
    pub frame: FrameConfig,
    pub model: ModelConfig,
    pub enrollment: EnrollmentConfig,
}
