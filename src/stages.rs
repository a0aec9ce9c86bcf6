//! Walkthroughs of the first three pipeline stages.
//!
//! Each stage reads the corpus, logs what it found and returns the same
//! numbers so callers other than the CLI can inspect them.

use crate::config::ProjectPaths;
use crate::error::Result;
use crate::model::SimpleNextTokenModel;
use crate::tokenizer::SimpleTokenizer;
use crate::vocab::Vocabulary;

/// How many leading tokens the tokenizer stage reports.
pub const PREVIEW_TOKENS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct TokenizerSummary {
    pub first_tokens: Vec<String>,
    pub token_count: usize,
    /// `None` for an empty corpus
    pub average_length: Option<f64>,
}

/// First corpus token looked up in the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenLookup {
    pub token: String,
    pub id: Option<usize>,
    pub frequency: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabSummary {
    pub vocab_size: usize,
    pub sample: Option<TokenLookup>,
}

/// Next-token distribution of an untrained model for one context.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPreview {
    pub context: (String, String),
    pub context_ids: (usize, usize),
    /// Indexed by token id
    pub probs: Vec<f32>,
}

pub fn tokenizer_summary(paths: &ProjectPaths) -> Result<TokenizerSummary> {
    let tokenizer = SimpleTokenizer::from_path(&paths.corpus)?;
    let tokens = tokenizer.tokens();
    let first_tokens = tokens[..tokens.len().min(PREVIEW_TOKENS)].to_vec();

    tracing::info!("First {} tokens: {:?}", PREVIEW_TOKENS, first_tokens);
    tracing::info!("Total number of tokens: {}", tokens.len());

    let average_length = tokenizer.average_token_length();
    match average_length {
        Some(avg) => tracing::info!("Average token length: {:.2}", avg),
        None => tracing::info!("No tokens available to calculate average length."),
    }

    Ok(TokenizerSummary {
        first_tokens,
        token_count: tokens.len(),
        average_length,
    })
}

pub fn vocab_summary(paths: &ProjectPaths) -> Result<VocabSummary> {
    let tokens = SimpleTokenizer::from_path(&paths.corpus)?.into_tokens();
    let vocab = Vocabulary::new(&tokens);
    tracing::info!("Vocabulary size: {}", vocab.vocab_size());

    let sample = tokens.first().map(|token| TokenLookup {
        token: token.clone(),
        id: vocab.token_id(token),
        frequency: vocab.frequency(token),
    });
    match &sample {
        Some(s) => tracing::info!(
            "Sample token: {:?} | ID: {:?} | Frequency: {}",
            s.token,
            s.id,
            s.frequency
        ),
        None => tracing::info!("No tokens found; cannot demonstrate vocabulary lookup."),
    }

    Ok(VocabSummary {
        vocab_size: vocab.vocab_size(),
        sample,
    })
}

/// Forward pass of a zero-initialised model on `(tokens[1], tokens[2])`.
///
/// Returns `Ok(None)` when the corpus has fewer than three tokens.
pub fn model_preview(paths: &ProjectPaths) -> Result<Option<ModelPreview>> {
    let tokens = SimpleTokenizer::from_path(&paths.corpus)?.into_tokens();
    if tokens.len() < 3 {
        tracing::info!("Need at least three tokens for context-2 demonstration.");
        return Ok(None);
    }

    let vocab = Vocabulary::new(&tokens);
    let model = SimpleNextTokenModel::new(vocab.vocab_size());

    let (prev_tok, curr_tok) = (&tokens[1], &tokens[2]);
    let ids = vocab.encode(&[prev_tok, curr_tok])?;
    let probs = model.forward(ids[0], ids[1]);

    tracing::info!(
        "Input tokens: {:?} (ID {}), {:?} (ID {})",
        prev_tok,
        ids[0],
        curr_tok,
        ids[1]
    );
    tracing::info!("Output probabilities for next token:");
    for (id, tok, _) in vocab.iter() {
        tracing::info!("  {:?} (ID {}) -> {:.4}", tok, id, probs[id]);
    }

    Ok(Some(ModelPreview {
        context: (prev_tok.clone(), curr_tok.clone()),
        context_ids: (ids[0], ids[1]),
        probs,
    }))
}
