//! Frame → embedding: decode, bound the frame size, locate, crop, embed.

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::config::FrameConfig;
use crate::error::FaceError;
use crate::locator::{FaceLocator, Located, RegionDetector};
use crate::provider::EmbeddingProvider;
use crate::types::Embedding;

const WARMUP_FRAME_SIZE: u32 = 100;

/// Decode encoded image bytes (JPEG, PNG, ...) into an RGB frame.
pub fn decode_frame(bytes: &[u8]) -> Result<RgbImage, FaceError> {
    let frame = image::load_from_memory(bytes)?.to_rgb8();
    if frame.width() == 0 || frame.height() == 0 {
        return Err(FaceError::EmptyImage);
    }
    Ok(frame)
}

/// Target dimensions for a frame so its longer side is at most `max_dim`,
/// without pushing the shorter side below `min_dim`.
pub fn fitted_dimensions(width: u32, height: u32, max_dim: u32, min_dim: u32) -> (u32, u32) {
    let longest = width.max(height);
    let shortest = width.min(height);
    if longest <= max_dim || shortest == 0 {
        return (width, height);
    }

    let mut scale = max_dim as f64 / longest as f64;
    if ((shortest as f64 * scale) as u32) < min_dim {
        scale = min_dim as f64 / shortest as f64;
    }

    let scaled = |v: u32| ((v as f64 * scale) as u32).max(1);
    (scaled(width), scaled(height))
}

/// Downscale an oversized frame to bound embedding cost.
pub fn fit_frame(frame: RgbImage, config: &FrameConfig) -> RgbImage {
    let (width, height) = frame.dimensions();
    let (new_w, new_h) = fitted_dimensions(width, height, config.max_frame_dim, config.min_frame_dim);
    if (new_w, new_h) == (width, height) {
        return frame;
    }
    tracing::debug!(width, height, new_w, new_h, "resizing frame");
    imageops::resize(&frame, new_w, new_h, FilterType::Triangle)
}

pub struct FramePipeline<D, P> {
    locator: FaceLocator<D>,
    provider: P,
    config: FrameConfig,
}

impl<D: RegionDetector, P: EmbeddingProvider> FramePipeline<D, P> {
    pub fn new(detector: D, provider: P, config: FrameConfig) -> Self {
        let locator = FaceLocator::new(detector, config.face_padding);
        Self { locator, provider, config }
    }

    pub fn with_locator(locator: FaceLocator<D>, provider: P, config: FrameConfig) -> Self {
        Self { locator, provider, config }
    }

    /// Run the model once so the first real request does not pay for
    /// lazy initialization. Failure is logged, not fatal.
    pub fn warmup(&mut self) -> bool {
        let blank = RgbImage::new(WARMUP_FRAME_SIZE, WARMUP_FRAME_SIZE);
        match self.provider.embed(&blank) {
            Ok(_) => {
                tracing::info!("embedding model warmed up");
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "embedding model warmup failed");
                false
            }
        }
    }

    /// Embed a document photo as a whole, without face location.
    pub fn embed_document(&mut self, image: RgbImage) -> Result<Embedding, FaceError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(FaceError::EmptyImage);
        }
        let image = fit_frame(image, &self.config);
        self.provider.embed(&image)
    }

    /// Embed the most prominent face in a live frame.
    pub fn embed_frame(&mut self, frame: RgbImage) -> Result<Embedding, FaceError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(FaceError::EmptyImage);
        }
        let frame = fit_frame(frame, &self.config);

        match self.locator.locate(&frame) {
            Located::Region(region) => {
                let crop = imageops::crop_imm(&frame, region.x, region.y, region.width, region.height)
                    .to_image();
                self.provider.embed(&crop)
            }
            Located::WholeFrame => self.provider.embed(&frame),
        }
    }

    /// Decode and embed a live frame.
    pub fn embed_encoded_frame(&mut self, bytes: &[u8]) -> Result<Embedding, FaceError> {
        let frame = decode_frame(bytes)?;
        self.embed_frame(frame)
    }
}
