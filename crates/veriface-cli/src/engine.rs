use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use veriface_core::detector::DetectorError;
use veriface_core::recognizer::RecognizerError;
use veriface_core::{
    Candidate, CoreConfig, Embedding, FaceError, FacenetEmbedder, FramePipeline,
    IdentificationEngine, Identification, MatchEngine, MatchResult, RegistrationFlow,
    ScrfdDetector, SessionId, StoredEmbedding,
};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Face(#[from] FaceError),
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

type Reply<T> = oneshot::Sender<Result<T, FaceError>>;

/// Messages sent to the engine thread. Images travel as encoded bytes.
enum EngineRequest {
    Embed {
        image: Vec<u8>,
        document: bool,
        reply: Reply<Embedding>,
    },
    Enroll {
        session: SessionId,
        image: Vec<u8>,
        reply: Reply<Embedding>,
    },
    Verify {
        session: SessionId,
        frame: Vec<u8>,
        reply: Reply<MatchResult>,
    },
    VerifyAgainst {
        stored: StoredEmbedding,
        frame: Vec<u8>,
        reply: Reply<MatchResult>,
    },
    Identify {
        candidates: Vec<Candidate>,
        frame: Vec<u8>,
        reply: Reply<Identification>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    async fn call<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        Ok(reply_rx.await.map_err(|_| EngineError::ChannelClosed)??)
    }

    /// Embed an image: a document photo as a whole, or a live frame via face location.
    pub async fn embed(&self, image: Vec<u8>, document: bool) -> Result<Embedding, EngineError> {
        self.call(|reply| EngineRequest::Embed { image, document, reply }).await
    }

    /// Embed a document photo and hold it as the session's reference.
    pub async fn enroll(&self, session: SessionId, image: Vec<u8>) -> Result<Embedding, EngineError> {
        self.call(|reply| EngineRequest::Enroll { session, image, reply }).await
    }

    /// Verify a live frame against the session's enrollment.
    pub async fn verify(&self, session: SessionId, frame: Vec<u8>) -> Result<MatchResult, EngineError> {
        self.call(|reply| EngineRequest::Verify { session, frame, reply }).await
    }

    /// Verify a live frame against an embedding fetched from storage.
    pub async fn verify_against(
        &self,
        stored: StoredEmbedding,
        frame: Vec<u8>,
    ) -> Result<MatchResult, EngineError> {
        self.call(|reply| EngineRequest::VerifyAgainst { stored, frame, reply }).await
    }

    /// Identify a live frame among stored candidates.
    pub async fn identify(
        &self,
        candidates: Vec<Candidate>,
        frame: Vec<u8>,
    ) -> Result<Identification, EngineError> {
        self.call(|reply| EngineRequest::Identify { candidates, frame, reply }).await
    }
}

struct Engine {
    pipeline: FramePipeline<ScrfdDetector, FacenetEmbedder>,
    flow: RegistrationFlow,
    identifier: IdentificationEngine,
}

impl Engine {
    fn handle(&mut self, req: EngineRequest) {
        match req {
            EngineRequest::Embed { image, document, reply } => {
                let _ = reply.send(self.embed(&image, document));
            }
            EngineRequest::Enroll { session, image, reply } => {
                let result = self.embed(&image, true).map(|embedding| {
                    self.flow.enroll(&session, embedding.clone());
                    embedding
                });
                let _ = reply.send(result);
            }
            EngineRequest::Verify { session, frame, reply } => {
                let result = self
                    .pipeline
                    .embed_encoded_frame(&frame)
                    .and_then(|probe| self.flow.verify(&session, &probe));
                let _ = reply.send(result);
            }
            EngineRequest::VerifyAgainst { stored, frame, reply } => {
                let result = self
                    .pipeline
                    .embed_encoded_frame(&frame)
                    .and_then(|probe| self.flow.verify_against(&stored, &probe));
                let _ = reply.send(result);
            }
            EngineRequest::Identify { candidates, frame, reply } => {
                let result = self
                    .pipeline
                    .embed_encoded_frame(&frame)
                    .and_then(|probe| self.identifier.identify(&probe, &candidates));
                let _ = reply.send(result);
            }
        }
    }

    fn embed(&mut self, image: &[u8], document: bool) -> Result<Embedding, FaceError> {
        if document {
            let image = veriface_core::pipeline::decode_frame(image)?;
            self.pipeline.embed_document(image)
        } else {
            self.pipeline.embed_encoded_frame(image)
        }
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Loads both ONNX models and warms up the embedder before returning, so a
/// missing model fails at startup rather than on the first request.
pub fn spawn_engine(config: &CoreConfig) -> Result<EngineHandle, EngineError> {
    let model = &config.model;

    let detector = ScrfdDetector::load(&model.detector_path(), model.intra_threads)?;
    let embedder = FacenetEmbedder::load(&model.embedder_path(), model.embedding_dim, model.intra_threads)?;

    let mut pipeline = FramePipeline::new(detector, embedder, config.frame.clone());
    pipeline.warmup();

    let matcher = MatchEngine::new(config.matching.clone());
    let mut engine = Engine {
        pipeline,
        flow: RegistrationFlow::new(matcher.clone(), &config.enrollment),
        identifier: IdentificationEngine::new(matcher),
    };

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("veriface-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                engine.handle(req);
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}
