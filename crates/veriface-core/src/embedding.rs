//! Ingestion boundary for embeddings read back from external storage.
//!
//! Stored records carry the vector either as a native JSON array or as a
//! string holding a serialized JSON array. Both are canonicalized into an
//! [`Embedding`] here and nowhere else.

use serde::{Deserialize, Serialize};

use crate::error::FaceError;
use crate::types::Embedding;

/// An embedding as it arrives from the data store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredEmbedding {
    Values(Vec<f32>),
    Encoded(String),
}

impl StoredEmbedding {
    /// Parse a JSON document holding either representation.
    pub fn from_json(document: &str) -> Result<Self, FaceError> {
        serde_json::from_str(document)
            .map_err(|e| FaceError::MalformedStoredEmbedding(format!("not an embedding record: {e}")))
    }

    /// Decode into the canonical in-memory form.
    pub fn canonicalize(&self) -> Result<Embedding, FaceError> {
        let values = match self {
            StoredEmbedding::Values(values) => values.clone(),
            StoredEmbedding::Encoded(text) => serde_json::from_str::<Vec<f32>>(text)
                .map_err(|e| FaceError::MalformedStoredEmbedding(format!("invalid JSON array: {e}")))?,
        };

        if values.is_empty() {
            return Err(FaceError::MalformedStoredEmbedding("embedding is empty".into()));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(FaceError::MalformedStoredEmbedding(format!(
                "non-finite value at index {pos}"
            )));
        }

        Ok(Embedding::new(values))
    }
}

impl From<Embedding> for StoredEmbedding {
    fn from(embedding: Embedding) -> Self {
        StoredEmbedding::Values(embedding.values)
    }
}

impl From<Vec<f32>> for StoredEmbedding {
    fn from(values: Vec<f32>) -> Self {
        StoredEmbedding::Values(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_and_native_canonicalize_identically() {
        let native = StoredEmbedding::Values(vec![0.25, -1.5, 3.0]);
        let encoded = StoredEmbedding::Encoded("[0.25, -1.5, 3.0]".into());
        assert_eq!(native.canonicalize().unwrap(), encoded.canonicalize().unwrap());
    }

    #[test]
    fn test_from_json_accepts_both_forms() {
        let native = StoredEmbedding::from_json("[1, 2, 3]").unwrap();
        assert_eq!(native, StoredEmbedding::Values(vec![1.0, 2.0, 3.0]));

        let encoded = StoredEmbedding::from_json(r#""[1, 2, 3]""#).unwrap();
        assert_eq!(encoded, StoredEmbedding::Encoded("[1, 2, 3]".into()));
        assert_eq!(encoded.canonicalize().unwrap().values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_from_json_rejects_objects() {
        let err = StoredEmbedding::from_json(r#"{"values": [1, 2]}"#).unwrap_err();
        assert!(matches!(err, FaceError::MalformedStoredEmbedding(_)));
    }

    #[test]
    fn test_malformed_encoded_string() {
        let stored = StoredEmbedding::Encoded("[0.1, 0.2".into());
        assert!(matches!(stored.canonicalize(), Err(FaceError::MalformedStoredEmbedding(_))));
    }

    #[test]
    fn test_empty_embedding_is_malformed() {
        assert!(StoredEmbedding::Values(vec![]).canonicalize().is_err());
        assert!(StoredEmbedding::Encoded("[]".into()).canonicalize().is_err());
    }

    #[test]
    fn test_non_finite_is_malformed() {
        let stored = StoredEmbedding::Values(vec![0.0, f32::NAN]);
        assert!(matches!(stored.canonicalize(), Err(FaceError::MalformedStoredEmbedding(_))));
    }
}
