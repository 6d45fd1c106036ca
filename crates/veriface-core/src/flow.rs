//! Registration → verification flow over the enrollment store.
//!
//! `NoEnrollment --enroll--> Enrolled --verify--> Verified | Rejected`.
//! With [`AfterVerify::Retain`] both outcomes stay `Enrolled`; with
//! [`AfterVerify::Clear`] both return to `NoEnrollment`.

use std::time::Duration;

use crate::config::{AfterVerify, EnrollmentConfig};
use crate::embedding::StoredEmbedding;
use crate::enrollment::{EnrollmentStore, SessionId};
use crate::error::FaceError;
use crate::matcher::MatchEngine;
use crate::types::{Embedding, MatchResult};

pub struct RegistrationFlow {
    store: EnrollmentStore,
    matcher: MatchEngine,
    after_verify: AfterVerify,
}

impl RegistrationFlow {
    pub fn new(matcher: MatchEngine, config: &EnrollmentConfig) -> Self {
        let store = match config.ttl_secs {
            Some(secs) => EnrollmentStore::with_ttl(Duration::from_secs(secs)),
            None => EnrollmentStore::new(),
        };
        Self { store, matcher, after_verify: config.after_verify }
    }

    pub fn store(&self) -> &EnrollmentStore {
        &self.store
    }

    /// Hold `embedding` as the reference for `session`, replacing any previous one.
    ///
    /// Expired enrollments of other sessions are purged first. Without a TTL
    /// nothing expires, and abandoned sessions stay until the caller clears them.
    pub fn enroll(&self, session: &SessionId, embedding: Embedding) {
        let purged = self.store.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, "expired enrollments purged");
        }
        self.store.store(session, embedding);
    }

    /// Compare `probe` against the enrollment held for `session`.
    pub fn verify(&self, session: &SessionId, probe: &Embedding) -> Result<MatchResult, FaceError> {
        let reference = self.store.get(session).ok_or_else(|| FaceError::EnrollmentMissing {
            session: session.to_string(),
        })?;

        let result = self.matcher.compare(&reference, probe);

        if self.after_verify == AfterVerify::Clear {
            self.store.clear(session);
        }
        let result = result?;

        tracing::info!(
            session = %session,
            is_match = result.is_match,
            score = result.score,
            distance = result.distance,
            "verification finished"
        );

        Ok(result)
    }

    /// Compare `probe` against an embedding the caller fetched from storage.
    pub fn verify_against(
        &self,
        stored: &StoredEmbedding,
        probe: &Embedding,
    ) -> Result<MatchResult, FaceError> {
        let probe = StoredEmbedding::Values(probe.values.clone());
        self.matcher.compare_stored(Some(stored), Some(&probe))
    }
}
