//! veriface-core: face identity matching engine.
//!
//! Locates a face in a frame (SCRFD), embeds it (Facenet512), and scores it
//! against one enrolled embedding or a list of candidates by Euclidean
//! distance. Both models run via ONNX Runtime behind narrow traits so the
//! matching logic can be exercised without them.

pub mod config;
pub mod detector;
pub mod embedding;
pub mod enrollment;
pub mod error;
pub mod flow;
pub mod identify;
pub mod locator;
pub mod matcher;
pub mod pipeline;
pub mod provider;
pub mod recognizer;
pub mod types;

use std::path::PathBuf;

pub use config::CoreConfig;
pub use detector::ScrfdDetector;
pub use embedding::StoredEmbedding;
pub use enrollment::{EnrollmentStore, SessionId};
pub use error::FaceError;
pub use flow::RegistrationFlow;
pub use identify::IdentificationEngine;
pub use locator::{FaceLocator, Located, RegionDetector};
pub use matcher::MatchEngine;
pub use pipeline::FramePipeline;
pub use provider::EmbeddingProvider;
pub use recognizer::FacenetEmbedder;
pub use types::{Candidate, Embedding, FaceRegion, Identification, MatchResult};

/// `$XDG_DATA_HOME/veriface/models`, falling back to `~/.local/share`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("veriface")
        .join("models")
}
