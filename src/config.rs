//! Project layout and training hyperparameters.

use crate::error::{Result, ToyGptError};
use std::path::{Path, PathBuf};

/// Corpus file used when none is given, relative to the project root.
pub const DEFAULT_CORPUS: &str = "corpus/001_animals.txt";

/// Name recorded in the artifact metadata.
pub const REPO_NAME: &str = "toy-gpt-train-animals";

/// Model family written to and expected from `00_meta.json`.
pub const MODEL_KIND: &str = "context2";

/// Number of tokens of context the model conditions on.
pub const CONTEXT_SIZE: usize = 2;

pub const META_FILE: &str = "00_meta.json";
pub const VOCAB_FILE: &str = "01_vocabulary.csv";
pub const WEIGHTS_FILE: &str = "02_model_weights.csv";
pub const EMBEDDINGS_FILE: &str = "03_token_embeddings.csv";
pub const CHECKPOINT_FILE: &str = "04_model_weights.bin";
pub const TRAIN_LOG_FILE: &str = "train_log.csv";

/// Where the corpus is read from and where artifacts and logs are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub base_dir: PathBuf,
    pub corpus: PathBuf,
    pub artifacts_dir: PathBuf,
    pub outputs_dir: PathBuf,
}

impl ProjectPaths {
    /// Derive the standard layout under `base_dir`.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        ProjectPaths {
            corpus: base_dir.join(DEFAULT_CORPUS),
            artifacts_dir: base_dir.join("artifacts"),
            outputs_dir: base_dir.join("outputs"),
            base_dir,
        }
    }

    /// Replace the corpus file, keeping the rest of the layout.
    pub fn with_corpus<P: AsRef<Path>>(mut self, corpus: P) -> Self {
        self.corpus = corpus.as_ref().to_path_buf();
        self
    }

    #[inline]
    pub fn meta_path(&self) -> PathBuf {
        self.artifacts_dir.join(META_FILE)
    }

    #[inline]
    pub fn vocab_path(&self) -> PathBuf {
        self.artifacts_dir.join(VOCAB_FILE)
    }

    #[inline]
    pub fn weights_path(&self) -> PathBuf {
        self.artifacts_dir.join(WEIGHTS_FILE)
    }

    #[inline]
    pub fn embeddings_path(&self) -> PathBuf {
        self.artifacts_dir.join(EMBEDDINGS_FILE)
    }

    #[inline]
    pub fn checkpoint_path(&self) -> PathBuf {
        self.artifacts_dir.join(CHECKPOINT_FILE)
    }

    #[inline]
    pub fn train_log_path(&self) -> PathBuf {
        self.outputs_dir.join(TRAIN_LOG_FILE)
    }
}

/// Gradient descent hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainConfig {
    /// Step size applied to each softmax gradient
    pub learning_rate: f32,
    /// Number of full passes over the training pairs
    pub epochs: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            learning_rate: 0.1,
            epochs: 50,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ToyGptError::InvalidConfig(format!(
                "learning rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        if self.epochs == 0 {
            return Err(ToyGptError::InvalidConfig(
                "epochs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
