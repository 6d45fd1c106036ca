//! The embedding model seam.

use std::path::Path;

use image::RgbImage;

use crate::error::FaceError;
use crate::types::Embedding;

/// Turns an image of a face (or a whole frame) into a fixed-length vector.
///
/// Implementations must not refuse an image because they doubt a face is
/// present: they return their best-effort vector and fail only when no
/// representation can be produced at all. Outputs are only approximately
/// reproducible across calls.
pub trait EmbeddingProvider {
    fn embed(&mut self, image: &RgbImage) -> Result<Embedding, FaceError>;

    /// Embed an image stored on disk.
    fn embed_file(&mut self, path: &Path) -> Result<Embedding, FaceError> {
        let image = image::open(path)?.to_rgb8();
        if image.width() == 0 || image.height() == 0 {
            return Err(FaceError::EmptyImage);
        }
        self.embed(&image)
    }
}

impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for Box<P> {
    fn embed(&mut self, image: &RgbImage) -> Result<Embedding, FaceError> {
        (**self).embed(image)
    }
}
