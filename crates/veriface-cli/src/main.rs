use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;
use veriface_core::{Candidate, SessionId, StoredEmbedding};

mod config;
mod engine;

use engine::{spawn_engine, EngineError};

#[derive(Parser)]
#[command(name = "veriface", about = "Face verification and identification")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the embedding of an image as a JSON array
    Embed {
        image: PathBuf,
        /// Embed the whole image (identity-document photo) without face location
        #[arg(long)]
        document: bool,
    },
    /// Enroll an identity-document photo, then verify a live frame against it
    Register {
        ic_image: PathBuf,
        face_image: PathBuf,
        /// Session identifier for the enrollment (random if omitted)
        #[arg(long)]
        session: Option<String>,
    },
    /// Verify a live frame against a stored embedding
    Verify {
        face_image: PathBuf,
        /// File holding a JSON array, or a JSON string encoding one
        #[arg(long)]
        embedding: PathBuf,
    },
    /// Identify a live frame among stored candidates
    Identify {
        face_image: PathBuf,
        /// File holding a JSON list of {"id", "embedding"} records
        #[arg(long)]
        candidates: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            let (kind, code) = classify(&err);
            println!(
                "{}",
                json!({ "status": "error", "kind": kind, "message": format!("{err:#}") })
            );
            ExitCode::from(code)
        }
    }
}

/// Error kind and exit code: 2 for caller mistakes, 1 for engine and model
/// failures.
///
/// Anything that is not an [`EngineError`] failed before the engine saw the
/// request: an unreadable file, malformed candidates, a bad config.
fn classify(err: &anyhow::Error) -> (&'static str, u8) {
    match err.downcast_ref::<EngineError>() {
        Some(EngineError::Face(face)) if face.is_client_error() => (face.kind(), 2),
        Some(EngineError::Face(face)) => (face.kind(), 1),
        Some(_) => ("engine_error", 1),
        None => ("invalid_input", 2),
    }
}

async fn run(cli: Cli) -> Result<Value> {
    let config = config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");
    let engine = spawn_engine(&config)?;

    match cli.command {
        Commands::Embed { image, document } => {
            let embedding = engine.embed(read(&image)?, document).await?;
            Ok(json!(embedding.values))
        }
        Commands::Register { ic_image, face_image, session } => {
            let session = session.map(SessionId::new).unwrap_or_else(SessionId::generate);
            let enrolled = engine.enroll(session.clone(), read(&ic_image)?).await?;
            let result = engine.verify(session.clone(), read(&face_image)?).await?;

            let mut output = json!({
                "status": if result.is_match { "success" } else { "fail" },
                "session": session,
                "result": result,
            });
            // The external store persists the document embedding only for verified users.
            if result.is_match {
                output["embedding"] = json!(enrolled.values);
            }
            Ok(output)
        }
        Commands::Verify { face_image, embedding: path } => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let stored = StoredEmbedding::from_json(&raw)
                .unwrap_or_else(|_| StoredEmbedding::Encoded(raw.trim().to_string()));

            let result = engine.verify_against(stored, read(&face_image)?).await?;
            Ok(json!({
                "status": if result.is_match { "success" } else { "fail" },
                "result": result,
            }))
        }
        Commands::Identify { face_image, candidates: path } => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let candidates: Vec<Candidate> = serde_json::from_str(&raw)
                .with_context(|| format!("parsing candidates {}", path.display()))?;

            let identification = engine.identify(candidates, read(&face_image)?).await?;
            Ok(json!({
                "status": if identification.is_identified() { "identified" } else { "not_identified" },
                "identification": identification,
            }))
        }
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading image {}", path.display()))
}
