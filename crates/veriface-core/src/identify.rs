//! 1:N identification: find the enrolled identity closest to a probe.

use crate::error::FaceError;
use crate::matcher::MatchEngine;
use crate::types::{Candidate, Embedding, Identification, MatchResult};

/// Linear scan over a candidate list, scored by a [`MatchEngine`].
///
/// O(N) per probe with no index. Fine for small enrolled populations.
#[derive(Debug, Clone, Default)]
pub struct IdentificationEngine {
    matcher: MatchEngine,
}

impl IdentificationEngine {
    pub fn new(matcher: MatchEngine) -> Self {
        Self { matcher }
    }

    /// Return the candidate with the smallest distance to `probe`, if it
    /// clears the threshold.
    ///
    /// Ties keep the earliest candidate. A record whose embedding cannot be
    /// parsed is skipped with a warning; a record of the wrong length aborts
    /// the scan with [`FaceError::DimensionMismatch`].
    pub fn identify(
        &self,
        probe: &Embedding,
        candidates: &[Candidate],
    ) -> Result<Identification, FaceError> {
        let mut best: Option<(usize, MatchResult)> = None;

        for (i, candidate) in candidates.iter().enumerate() {
            let reference = match candidate.embedding.canonicalize() {
                Ok(reference) => reference,
                Err(err) => {
                    tracing::warn!(
                        candidate = %candidate.id,
                        error = %err,
                        "skipping candidate with unparseable embedding"
                    );
                    continue;
                }
            };

            let result = self.matcher.compare(&reference, probe)?;
            tracing::debug!(
                candidate = %candidate.id,
                distance = result.distance,
                score = result.score,
                "scored candidate"
            );

            let closer = match &best {
                None => true,
                Some((_, prev)) => result.distance < prev.distance,
            };
            if closer {
                best = Some((i, result));
            }
        }

        let identification = match best {
            Some((idx, result)) if result.is_match => Identification {
                identified: Some(candidates[idx].id.clone()),
                best_score: result.score,
                best_distance: result.distance,
            },
            Some((idx, result)) => {
                tracing::info!(
                    closest = %candidates[idx].id,
                    distance = result.distance,
                    score = result.score,
                    "closest candidate below threshold"
                );
                Identification {
                    identified: None,
                    best_score: result.score,
                    best_distance: result.distance,
                }
            }
            None => Identification {
                identified: None,
                best_score: 0,
                best_distance: f64::INFINITY,
            },
        };

        tracing::info!(
            candidates = candidates.len(),
            identified = identification.identified.as_deref().unwrap_or("none"),
            best_score = identification.best_score,
            "identification finished"
        );

        Ok(identification)
    }
}
