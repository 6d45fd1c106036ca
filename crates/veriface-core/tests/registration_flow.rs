use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use image::RgbImage;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use veriface_core::config::{EnrollmentConfig, FrameConfig};
use veriface_core::detector::DetectorError;
use veriface_core::locator::DetectionPolicy;
use veriface_core::{
    Candidate, Embedding, EmbeddingProvider, FaceError, FaceLocator, FaceRegion, FramePipeline,
    IdentificationEngine, MatchEngine, RegionDetector, RegistrationFlow, SessionId,
    StoredEmbedding,
};

/// Detector that returns fixed regions and records the frame sizes it saw.
struct FixedDetector {
    regions: Vec<FaceRegion>,
    seen: Rc<RefCell<Vec<(u32, u32)>>>,
}

impl RegionDetector for FixedDetector {
    fn detect(&mut self, frame: &RgbImage, _min_confidence: f32) -> Result<Vec<FaceRegion>, DetectorError> {
        self.seen.borrow_mut().push(frame.dimensions());
        Ok(self.regions.clone())
    }
}

/// Provider that hands out queued embeddings and records the image sizes it embedded.
struct QueuedProvider {
    queue: VecDeque<Result<Embedding, FaceError>>,
    seen: Rc<RefCell<Vec<(u32, u32)>>>,
}

impl EmbeddingProvider for QueuedProvider {
    fn embed(&mut self, image: &RgbImage) -> Result<Embedding, FaceError> {
        self.seen.borrow_mut().push(image.dimensions());
        self.queue
            .pop_front()
            .unwrap_or_else(|| Err(FaceError::EmbeddingExtraction("queue exhausted".into())))
    }
}

type Seen = Rc<RefCell<Vec<(u32, u32)>>>;

fn pipeline(
    regions: Vec<FaceRegion>,
    embeddings: Vec<Result<Embedding, FaceError>>,
) -> (FramePipeline<FixedDetector, QueuedProvider>, Seen, Seen) {
    let detected: Seen = Rc::default();
    let embedded: Seen = Rc::default();
    let detector = FixedDetector { regions, seen: Rc::clone(&detected) };
    let provider = QueuedProvider { queue: embeddings.into(), seen: Rc::clone(&embedded) };
    (FramePipeline::new(detector, provider, FrameConfig::default()), detected, embedded)
}

/// Fixed synthetic "IC" embedding with a Facenet512-like magnitude.
fn reference_embedding() -> Embedding {
    Embedding::new((0..512).map(|i| (i as f32 * 0.731).sin() * 1.5).collect())
}

/// Multiply every component by (1 + 0.05 * N(0, 1)).
fn perturbed(base: &Embedding, seed: u64) -> Embedding {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0f32, 0.05).unwrap();
    let values = base
        .values
        .iter()
        .map(|v| v * (1.0 + noise.sample(&mut rng)))
        .collect();
    Embedding::new(values)
}

fn registration() -> RegistrationFlow {
    RegistrationFlow::new(MatchEngine::default(), &EnrollmentConfig::default())
}

#[test]
fn enroll_then_verify_located_face() {
    let ic = reference_embedding();
    let live = perturbed(&ic, 7);
    let face = FaceRegion { x: 200, y: 120, width: 160, height: 180 };
    let (mut pipeline, _, embedded) = pipeline(vec![face], vec![Ok(ic.clone()), Ok(live)]);

    let flow = registration();
    let session = SessionId::shared();

    let enrolled = pipeline.embed_document(RgbImage::new(600, 400)).unwrap();
    flow.enroll(&session, enrolled);

    let probe = pipeline.embed_frame(RgbImage::new(640, 480)).unwrap();
    let result = flow.verify(&session, &probe).unwrap();

    assert!(result.is_match);
    assert!(result.distance < 20.0, "distance {}", result.distance);

    // Document photo embedded whole; live frame cropped with 50px padding.
    assert_eq!(*embedded.borrow(), vec![(600, 400), (260, 280)]);
}

#[test]
fn gaussian_perturbation_stays_within_threshold() {
    let ic = reference_embedding();
    let flow = registration();
    let session = SessionId::new("perturbation");
    flow.enroll(&session, ic.clone());

    for seed in 0..20 {
        let result = flow.verify(&session, &perturbed(&ic, seed)).unwrap();
        assert!(result.distance < 20.0, "seed {seed}: distance {}", result.distance);
        assert!(result.is_match, "seed {seed}");
    }
}

#[test]
fn whole_frame_used_when_no_face_found() {
    let (mut pipeline, detected, embedded) = pipeline(vec![], vec![Ok(reference_embedding())]);

    pipeline.embed_frame(RgbImage::new(640, 480)).unwrap();

    // Both tiers were tried before falling back.
    assert_eq!(detected.borrow().len(), 2);
    assert_eq!(*embedded.borrow(), vec![(640, 480)]);
}

#[test]
fn custom_locator_policies_drive_detection() {
    let detected: Seen = Rc::default();
    let embedded: Seen = Rc::default();
    let detector = FixedDetector {
        regions: vec![FaceRegion { x: 100, y: 100, width: 100, height: 100 }],
        seen: Rc::clone(&detected),
    };
    let provider = QueuedProvider {
        queue: vec![Ok(reference_embedding()), Ok(reference_embedding())].into(),
        seen: Rc::clone(&embedded),
    };
    // Single tier that only accepts faces of at least 120px.
    let strict = DetectionPolicy { name: "strict", min_confidence: 0.8, min_face_floor: 120, min_face_divisor: 10 };
    let locator = FaceLocator::with_policies(detector, vec![strict], 0);
    let mut pipeline = FramePipeline::with_locator(locator, provider, FrameConfig::default());

    pipeline.embed_frame(RgbImage::new(640, 480)).unwrap();
    assert_eq!(detected.borrow().len(), 1);
    assert_eq!(*embedded.borrow(), vec![(640, 480)]);

    // On a small frame the floor still applies, and a 100px face is too small.
    pipeline.embed_frame(RgbImage::new(400, 400)).unwrap();
    assert_eq!(detected.borrow().len(), 2);
    assert_eq!(embedded.borrow()[1], (400, 400));
}

#[test]
fn oversized_frame_resized_before_detection() {
    let (mut pipeline, detected, embedded) = pipeline(vec![], vec![Ok(reference_embedding())]);

    pipeline.embed_frame(RgbImage::new(1600, 1200)).unwrap();

    assert_eq!(detected.borrow()[0], (800, 600));
    assert_eq!(*embedded.borrow(), vec![(800, 600)]);
}

#[test]
fn extraction_failure_is_a_server_error() {
    let (mut pipeline, _, _) = pipeline(
        vec![],
        vec![Err(FaceError::EmbeddingExtraction("corrupt input".into()))],
    );
    let err = pipeline.embed_frame(RgbImage::new(64, 64)).unwrap_err();
    assert!(matches!(err, FaceError::EmbeddingExtraction(_)));
    assert!(!err.is_client_error());
}

#[test]
fn undecodable_frame_is_a_client_error() {
    let (mut pipeline, _, embedded) = pipeline(vec![], vec![]);
    let err = pipeline.embed_encoded_frame(b"\x00\x01\x02").unwrap_err();
    assert!(err.is_client_error());
    assert!(embedded.borrow().is_empty());
}

#[test]
fn verify_before_enroll_fails() {
    let (mut pipeline, _, _) = pipeline(vec![], vec![Ok(reference_embedding())]);
    let probe = pipeline.embed_frame(RgbImage::new(64, 64)).unwrap();
    let err = registration().verify(&SessionId::generate(), &probe).unwrap_err();
    assert!(matches!(err, FaceError::EnrollmentMissing { .. }));
}

#[test]
fn login_against_string_encoded_record() {
    let ic = reference_embedding();
    let encoded = StoredEmbedding::Encoded(serde_json::to_string(&ic.values).unwrap());
    let native = StoredEmbedding::Values(ic.values.clone());
    let probe = perturbed(&ic, 42);

    let flow = registration();
    let from_encoded = flow.verify_against(&encoded, &probe).unwrap();
    let from_native = flow.verify_against(&native, &probe).unwrap();

    assert_eq!(from_encoded, from_native);
    assert!(from_encoded.is_match);
}

#[test]
fn identify_live_frame_among_enrolled_users() {
    let alice = reference_embedding();
    let bob = Embedding::new(alice.values.iter().map(|v| -v).collect());
    let (mut pipeline, _, _) = pipeline(vec![], vec![Ok(perturbed(&alice, 3))]);

    let candidates = vec![
        Candidate { id: "bob".into(), embedding: bob.into() },
        Candidate { id: "corrupt".into(), embedding: StoredEmbedding::Encoded("[1, 2".into()) },
        Candidate {
            id: "alice".into(),
            embedding: StoredEmbedding::Encoded(serde_json::to_string(&alice.values).unwrap()),
        },
    ];

    let probe = pipeline.embed_frame(RgbImage::new(320, 240)).unwrap();
    let result = IdentificationEngine::default().identify(&probe, &candidates).unwrap();

    assert_eq!(result.identified.as_deref(), Some("alice"));
    assert!(result.best_score >= 45);
}
