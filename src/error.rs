//! Error types for the toy GPT pipeline.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToyGptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("Token not found in vocabulary: {0:?}")]
    UnknownToken(String),

    #[error("Need at least {needed} tokens, found {found}")]
    InsufficientTokens { needed: usize, found: usize },

    #[error("Missing artifact {}. Run `{hint}` first.", .path.display())]
    MissingArtifact { path: PathBuf, hint: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ToyGptError>;
