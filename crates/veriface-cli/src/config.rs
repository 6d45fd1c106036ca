use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use veriface_core::config::{AfterVerify, ThresholdBasis};
use veriface_core::CoreConfig;

/// Load configuration: defaults, then an optional TOML file, then
/// `VERIFACE_*` environment variables.
pub fn load(path: Option<&Path>) -> Result<CoreConfig> {
    let mut config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config at {}", path.display()))?;
            parse_toml(&raw).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => CoreConfig::default(),
    };
    apply_env(&mut config);
    Ok(config)
}

pub fn parse_toml(raw: &str) -> Result<CoreConfig> {
    Ok(toml::from_str(raw)?)
}

fn apply_env(config: &mut CoreConfig) {
    if let Ok(dir) = std::env::var("VERIFACE_MODEL_DIR") {
        config.model.model_dir = PathBuf::from(dir);
    }

    let matching = &mut config.matching;
    matching.passing_threshold_distance =
        env_f64("VERIFACE_THRESHOLD_DISTANCE", matching.passing_threshold_distance);
    matching.passing_threshold_percentage =
        env_f64("VERIFACE_THRESHOLD_PERCENTAGE", matching.passing_threshold_percentage);
    if let Ok(basis) = std::env::var("VERIFACE_THRESHOLD_BASIS") {
        match basis.as_str() {
            "raw" => matching.threshold_basis = ThresholdBasis::Raw,
            "rounded" => matching.threshold_basis = ThresholdBasis::Rounded,
            other => tracing::warn!(value = other, "ignoring unknown VERIFACE_THRESHOLD_BASIS"),
        }
    }

    let frame = &mut config.frame;
    frame.max_frame_dim = env_u32("VERIFACE_MAX_FRAME_DIM", frame.max_frame_dim);
    frame.min_frame_dim = env_u32("VERIFACE_MIN_FRAME_DIM", frame.min_frame_dim);
    frame.face_padding = env_u32("VERIFACE_FACE_PADDING", frame.face_padding);

    let model = &mut config.model;
    model.embedding_dim = env_usize("VERIFACE_EMBEDDING_DIM", model.embedding_dim);
    model.intra_threads = env_usize("VERIFACE_INTRA_THREADS", model.intra_threads);

    let enrollment = &mut config.enrollment;
    if let Ok(policy) = std::env::var("VERIFACE_AFTER_VERIFY") {
        match policy.as_str() {
            "retain" => enrollment.after_verify = AfterVerify::Retain,
            "clear" => enrollment.after_verify = AfterVerify::Clear,
            other => tracing::warn!(value = other, "ignoring unknown VERIFACE_AFTER_VERIFY"),
        }
    }
    if let Some(ttl) = std::env::var("VERIFACE_ENROLLMENT_TTL_SECS").ok().and_then(|v| v.parse().ok()) {
        enrollment.ttl_secs = Some(ttl);
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
