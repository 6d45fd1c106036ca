//! Face location with tiered detection and a whole-frame fallback.
//!
//! Detection runs through an ordered list of [`DetectionPolicy`] tiers; the
//! first tier that yields a face wins. When no tier finds anything the whole
//! frame is handed to the embedding model, which may still find the face on
//! its own. Locating never fails.

use image::RgbImage;

use crate::detector::DetectorError;
use crate::types::FaceRegion;

/// A face detector the locator can drive at varying strictness.
pub trait RegionDetector {
    /// Regions with confidence above `min_confidence`, in frame coordinates.
    fn detect(&mut self, frame: &RgbImage, min_confidence: f32)
        -> Result<Vec<FaceRegion>, DetectorError>;
}

/// One detection attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionPolicy {
    pub name: &'static str,
    pub min_confidence: f32,
    /// Minimum face side is `max(min_face_floor, min(w, h) / min_face_divisor)`.
    pub min_face_floor: u32,
    pub min_face_divisor: u32,
}

impl DetectionPolicy {
    pub fn lenient() -> Self {
        Self { name: "lenient", min_confidence: 0.5, min_face_floor: 15, min_face_divisor: 20 }
    }

    pub fn very_lenient() -> Self {
        Self { name: "very_lenient", min_confidence: 0.3, min_face_floor: 10, min_face_divisor: 30 }
    }

    pub fn min_face_size(&self, width: u32, height: u32) -> u32 {
        let divisor = self.min_face_divisor.max(1);
        self.min_face_floor.max(width.min(height) / divisor)
    }
}

/// The default tier list: lenient, then very lenient.
pub fn default_policies() -> Vec<DetectionPolicy> {
    vec![DetectionPolicy::lenient(), DetectionPolicy::very_lenient()]
}

/// Where the embedding model should look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Located {
    /// A padded face crop, contained in the frame.
    Region(FaceRegion),
    /// No face was found; use the entire frame.
    WholeFrame,
}

pub struct FaceLocator<D> {
    detector: D,
    policies: Vec<DetectionPolicy>,
    padding: u32,
}

impl<D: RegionDetector> FaceLocator<D> {
    pub fn new(detector: D, padding: u32) -> Self {
        Self::with_policies(detector, default_policies(), padding)
    }

    pub fn with_policies(detector: D, policies: Vec<DetectionPolicy>, padding: u32) -> Self {
        Self { detector, policies, padding }
    }

    pub fn policies(&self) -> &[DetectionPolicy] {
        &self.policies
    }

    pub fn locate(&mut self, frame: &RgbImage) -> Located {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Located::WholeFrame;
        }

        for policy in &self.policies {
            let regions = match self.detector.detect(frame, policy.min_confidence) {
                Ok(regions) => regions,
                Err(err) => {
                    tracing::warn!(tier = policy.name, error = %err, "detector failed; trying next tier");
                    continue;
                }
            };

            let min_size = policy.min_face_size(width, height);
            let largest = regions
                .into_iter()
                .filter_map(|r| r.within(width, height))
                .filter(|r| r.width >= min_size && r.height >= min_size)
                .fold(None::<FaceRegion>, |best, r| match best {
                    Some(b) if b.area() >= r.area() => Some(b),
                    _ => Some(r),
                });

            tracing::debug!(tier = policy.name, min_size, found = largest.is_some(), "detection tier");

            if let Some(face) = largest {
                let padded = face.padded(self.padding, width, height);
                tracing::debug!(?face, ?padded, "face located");
                return Located::Region(padded);
            }
        }

        tracing::warn!(width, height, "no face detected; using whole frame");
        Located::WholeFrame
    }
}
