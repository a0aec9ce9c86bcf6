//! Word-level tokenizer for the training corpus.

use crate::error::Result;
use std::fs;
use std::path::Path;

/// Tokenizer holding the tokens of one corpus.
#[derive(Debug, Clone, Default)]
pub struct SimpleTokenizer {
    tokens: Vec<String>,
}

impl SimpleTokenizer {
    /// Read and tokenize a corpus file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let tokenizer = Self::from_text(&text);
        tracing::debug!(
            "Tokenized {} into {} tokens",
            path.as_ref().display(),
            tokenizer.len()
        );
        Ok(tokenizer)
    }

    pub fn from_text(text: &str) -> Self {
        SimpleTokenizer {
            tokens: tokenize(text),
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<String> {
        self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Mean token length in characters, `None` for an empty corpus.
    pub fn average_token_length(&self) -> Option<f64> {
        if self.tokens.is_empty() {
            return None;
        }
        let total: usize = self.tokens.iter().map(|t| t.chars().count()).sum();
        Some(total as f64 / self.tokens.len() as f64)
    }
}

/// Split text on whitespace into lowercase words.
///
/// Leading and trailing characters that are neither alphanumeric nor an
/// apostrophe are stripped, so `"cat."` and `"cat"` map to the same token
/// while `dogs'` and `'tis` keep their apostrophes. Inner characters are
/// never touched.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !(c.is_alphanumeric() || c == '\''))
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect()
}
