//! Pending enrollments between the "enroll" and "verify" steps.
//!
//! Each enrollment is keyed by a caller-supplied [`SessionId`], so
//! concurrent registrations never overwrite each other. Deployments that
//! only ever run one registration at a time can use [`SessionId::shared`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::types::Embedding;

const SHARED_SESSION: &str = "shared";

/// Identifies one registration flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random session identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The single process-wide slot.
    pub fn shared() -> Self {
        Self(SHARED_SESSION.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

struct Entry {
    embedding: Embedding,
    stored_at: Instant,
}

/// Session-keyed embedding slots with an optional time-to-live.
///
/// `store` always overwrites; there is no merge or history.
#[derive(Default)]
pub struct EnrollmentStore {
    slots: Mutex<HashMap<SessionId, Entry>>,
    ttl: Option<Duration>,
}

impl EnrollmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enrollments older than `ttl` read as empty.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { slots: Mutex::default(), ttl: Some(ttl) }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<SessionId, Entry>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expired(&self, entry: &Entry) -> bool {
        self.ttl.is_some_and(|ttl| entry.stored_at.elapsed() >= ttl)
    }

    pub fn store(&self, session: &SessionId, embedding: Embedding) {
        let replaced = self
            .slots()
            .insert(session.clone(), Entry { embedding, stored_at: Instant::now() })
            .is_some();
        tracing::info!(session = %session, replaced, "enrollment stored");
    }

    pub fn get(&self, session: &SessionId) -> Option<Embedding> {
        let mut slots = self.slots();
        let expired = slots.get(session).map(|entry| self.expired(entry))?;
        if expired {
            slots.remove(session);
            tracing::info!(session = %session, "enrollment expired");
            return None;
        }
        slots.get(session).map(|entry| entry.embedding.clone())
    }

    pub fn clear(&self, session: &SessionId) {
        if self.slots().remove(session).is_some() {
            tracing::info!(session = %session, "enrollment cleared");
        }
    }

    /// Drop every expired enrollment, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|_, entry| !self.expired(entry));
        before - slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }
}
