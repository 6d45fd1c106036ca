//! 1:1 embedding comparison and the distance → score mapping.

use crate::config::{MatchConfig, ThresholdBasis};
use crate::embedding::StoredEmbedding;
use crate::error::FaceError;
use crate::types::{Embedding, MatchResult};

/// Scores Euclidean distances against the configured thresholds.
///
/// `score = round(clamp((2T - d) / 2T * 100, 0, 100))` where `T` is the
/// passing threshold distance, so a distance of exactly `T` scores 50.
/// Rounding is half away from zero.
#[derive(Debug, Clone, Default)]
pub struct MatchEngine {
    config: MatchConfig,
}

impl MatchEngine {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Distance at which the score reaches 0.
    pub fn max_score_distance(&self) -> f64 {
        self.config.passing_threshold_distance * 2.0
    }

    /// Unrounded score in [0, 100].
    pub fn raw_score(&self, distance: f64) -> f64 {
        let max = self.max_score_distance();
        let raw = (max - distance) * 100.0 / max;
        if raw.is_nan() {
            0.0
        } else {
            raw.clamp(0.0, 100.0)
        }
    }

    /// Integer score in [0, 100]; non-increasing in `distance`.
    pub fn score(&self, distance: f64) -> u8 {
        self.raw_score(distance).round() as u8
    }

    /// Turn a distance into a full result.
    pub fn decide(&self, distance: f64) -> MatchResult {
        let raw = self.raw_score(distance);
        let score = raw.round() as u8;
        let basis = match self.config.threshold_basis {
            ThresholdBasis::Raw => raw,
            ThresholdBasis::Rounded => score as f64,
        };

        MatchResult {
            is_match: basis >= self.config.passing_threshold_percentage,
            score,
            distance,
        }
    }

    /// Compare two canonical embeddings.
    pub fn compare(&self, a: &Embedding, b: &Embedding) -> Result<MatchResult, FaceError> {
        let distance = a.euclidean_distance(b)?;
        let result = self.decide(distance);

        tracing::debug!(
            distance,
            score = result.score,
            is_match = result.is_match,
            "compared embeddings"
        );

        Ok(result)
    }

    /// Compare embeddings that may be absent or still in stored form.
    ///
    /// A missing or unparseable side yields [`MatchResult::unusable`] instead
    /// of an error. Length mismatches are still fatal.
    pub fn compare_stored(
        &self,
        a: Option<&StoredEmbedding>,
        b: Option<&StoredEmbedding>,
    ) -> Result<MatchResult, FaceError> {
        let (Some(a), Some(b)) = (a, b) else {
            tracing::warn!("comparison with a missing embedding");
            return Ok(MatchResult::unusable());
        };

        match (a.canonicalize(), b.canonicalize()) {
            (Ok(a), Ok(b)) => self.compare(&a, &b),
            (Err(err), _) | (_, Err(err)) => {
                tracing::warn!(error = %err, "comparison with an unparseable embedding");
                Ok(MatchResult::unusable())
            }
        }
    }
}
