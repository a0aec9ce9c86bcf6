//! Inference from saved artifacts, without retraining.

use crate::artifacts::{
    ArtifactMeta, load_meta, load_model_weights_csv, load_vocabulary_csv, require_artifacts,
};
use crate::checkpoint::read_checkpoint;
use crate::config::{MODEL_KIND, ProjectPaths};
use crate::error::{Result, ToyGptError};
use crate::model::SimpleNextTokenModel;
use crate::ops::top_k;
use crate::vocab::Vocabulary;

/// Command users are pointed at when artifacts are missing.
pub const TRAIN_HINT: &str = "toy-gpt train";

/// Everything needed to generate text from a trained model.
#[derive(Debug, Clone)]
pub struct InferenceSession {
    pub meta: ArtifactMeta,
    pub vocab: Vocabulary,
    pub model: SimpleNextTokenModel,
}

impl InferenceSession {
    /// Load metadata, vocabulary and weights from `paths.artifacts_dir`.
    ///
    /// Weights come from the CSV table unless `use_checkpoint` selects the
    /// binary checkpoint.
    pub fn load(paths: &ProjectPaths, use_checkpoint: bool) -> Result<Self> {
        let weights_path = if use_checkpoint {
            paths.checkpoint_path()
        } else {
            paths.weights_path()
        };
        require_artifacts(
            &[paths.meta_path(), paths.vocab_path(), weights_path.clone()],
            TRAIN_HINT,
        )?;

        let meta = load_meta(paths.meta_path())?;
        if meta.model_kind != MODEL_KIND {
            return Err(ToyGptError::InvalidArtifact(format!(
                "model_kind {:?} is not supported, expected {MODEL_KIND:?}",
                meta.model_kind
            )));
        }

        let vocab = load_vocabulary_csv(paths.vocab_path())?;
        let v = vocab.vocab_size();
        if v == 0 {
            return Err(ToyGptError::InvalidArtifact("vocabulary is empty".into()));
        }
        if meta.vocab_size != v {
            return Err(ToyGptError::InvalidArtifact(format!(
                "metadata vocab_size {} does not match vocabulary size {v}",
                meta.vocab_size
            )));
        }
        if meta.weights_shape != [v * v, v] {
            return Err(ToyGptError::InvalidArtifact(format!(
                "metadata weights_shape {:?} does not match [{}, {v}]",
                meta.weights_shape,
                v * v
            )));
        }

        let model = if use_checkpoint {
            let model = read_checkpoint(&weights_path)?;
            if model.vocab_size() != v {
                return Err(ToyGptError::InvalidArtifact(format!(
                    "checkpoint vocab size {} does not match vocabulary size {v}",
                    model.vocab_size()
                )));
            }
            model
        } else {
            let weights = load_model_weights_csv(&weights_path, &vocab, v * v)?;
            SimpleNextTokenModel::from_weights(v, weights)?
        };

        tracing::debug!("Loaded weights from {}", weights_path.display());
        Ok(InferenceSession { meta, vocab, model })
    }

    /// Token with the smallest id.
    pub fn default_start_token(&self) -> &str {
        self.vocab.id_token(0).unwrap_or_default()
    }

    /// The `k` most likely `(token, prob)` after the bootstrap context `(start, start)`.
    pub fn top_predictions(&self, start: &str, k: usize) -> Result<Vec<(String, f32)>> {
        let id = self
            .vocab
            .token_id(start)
            .ok_or_else(|| ToyGptError::UnknownToken(start.to_string()))?;
        let probs = self.model.forward(id, id);
        Ok(top_k(&probs, k)
            .into_iter()
            .map(|(i, p)| (self.vocab.id_token(i).unwrap_or_default().to_string(), p))
            .collect())
    }
}
