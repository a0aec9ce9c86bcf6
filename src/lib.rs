//! Toy next-token language model in Rust
//!
//! Trains a context-2 softmax model on a small word corpus and writes
//! inspectable artifacts that a separate client can load without retraining.

pub mod artifacts;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod infer;
pub mod logging;
pub mod model;
pub mod ops;
pub mod sample;
pub mod stages;
pub mod state;
pub mod tokenizer;
pub mod train;
pub mod vocab;

pub use artifacts::ArtifactMeta;
pub use config::{ProjectPaths, TrainConfig};
pub use error::{Result, ToyGptError};
pub use infer::InferenceSession;
pub use model::SimpleNextTokenModel;
pub use sample::{SamplingConfig, generate_tokens_context2, sample};
pub use state::ContextWindow;
pub use tokenizer::{SimpleTokenizer, tokenize};
pub use train::{EpochMetrics, TrainingPair, make_training_pairs, run_training, train_model};
pub use vocab::Vocabulary;
