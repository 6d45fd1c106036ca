//! Facenet512 embedding model via ONNX Runtime.
//!
//! Produces raw (unnormalized) 512-dimensional embeddings so that Euclidean
//! distances stay on the scale the passing threshold was calibrated for.

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

use crate::error::FaceError;
use crate::provider::EmbeddingProvider;
use crate::types::Embedding;

const FACENET_INPUT_SIZE: u32 = 160;
const FACENET_MODEL_VERSION: &str = "facenet512";

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

pub struct FacenetEmbedder {
    session: Session,
    embedding_dim: usize,
}

impl FacenetEmbedder {
    /// Load the Facenet512 ONNX model from the given path.
    pub fn load(
        model_path: &str,
        embedding_dim: usize,
        intra_threads: usize,
    ) -> Result<Self, RecognizerError> {
        if !Path::new(model_path).exists() {
            return Err(RecognizerError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded Facenet512 model"
        );

        Ok(Self { session, embedding_dim })
    }

    fn extract(&mut self, image: &RgbImage) -> Result<Embedding, RecognizerError> {
        let input = Self::preprocess(image);
        let expected = self.embedding_dim;

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RecognizerError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != expected {
            return Err(RecognizerError::InferenceFailed(format!(
                "expected {expected}-dim embedding, got {}",
                raw.len()
            )));
        }
        if raw.iter().any(|v| !v.is_finite()) {
            return Err(RecognizerError::InferenceFailed("non-finite embedding".into()));
        }

        Ok(Embedding {
            values: raw.to_vec(),
            model_version: Some(FACENET_MODEL_VERSION.to_string()),
        })
    }

    /// Resize to 160×160 and scale to [0, 1] in NHWC layout.
    fn preprocess(image: &RgbImage) -> Array4<f32> {
        let size = FACENET_INPUT_SIZE as usize;
        let resized = imageops::resize(image, FACENET_INPUT_SIZE, FACENET_INPUT_SIZE, FilterType::Triangle);

        let mut tensor = Array4::<f32>::zeros((1, size, size, 3));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, y as usize, x as usize, c]] = pixel[c] as f32 / 255.0;
            }
        }
        tensor
    }
}

impl EmbeddingProvider for FacenetEmbedder {
    fn embed(&mut self, image: &RgbImage) -> Result<Embedding, FaceError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(FaceError::EmptyImage);
        }
        let embedding = self.extract(image)?;
        tracing::debug!(len = embedding.len(), "embedding generated");
        Ok(embedding)
    }
}
