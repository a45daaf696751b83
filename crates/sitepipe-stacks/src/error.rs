//! Synthesis errors.

use sitepipe_config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SynthError {
    #[error(transparent)]
    Core(#[from] sitepipe_core::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("origin access audit failed: {0}")]
    Audit(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SynthResult<T> = std::result::Result<T, SynthError>;
