//! Vocabulary: token <-> id mapping with frequency counts.

use crate::error::{Result, ToyGptError};
use std::collections::{BTreeMap, HashMap};

/// Maps tokens to contiguous ids `0..vocab_size` and back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    id_to_token: Vec<String>,
    token_to_id: HashMap<String, usize>,
    frequencies: Vec<usize>,
}

impl Vocabulary {
    /// Build a vocabulary from a token stream. Ids follow lexicographic order.
    pub fn new<S: AsRef<str>>(tokens: &[S]) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for tok in tokens {
            *counts.entry(tok.as_ref()).or_insert(0) += 1;
        }

        let mut vocab = Vocabulary {
            id_to_token: Vec::with_capacity(counts.len()),
            token_to_id: HashMap::with_capacity(counts.len()),
            frequencies: Vec::with_capacity(counts.len()),
        };
        for (tok, count) in counts {
            vocab.token_to_id.insert(tok.to_string(), vocab.id_to_token.len());
            vocab.id_to_token.push(tok.to_string());
            vocab.frequencies.push(count);
        }
        vocab
    }

    /// Rebuild from `(id, token, frequency)` rows, e.g. a vocabulary artifact.
    ///
    /// Ids must cover `0..n` exactly once and tokens must be unique.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, String, usize)>,
    {
        let mut rows: Vec<(usize, String, usize)> = entries.into_iter().collect();
        rows.sort_by_key(|(id, _, _)| *id);

        let mut vocab = Vocabulary::default();
        for (expected, (id, tok, freq)) in rows.into_iter().enumerate() {
            if id != expected {
                return Err(ToyGptError::InvalidArtifact(format!(
                    "vocabulary ids are not contiguous: expected {expected}, found {id}"
                )));
            }
            if vocab.token_to_id.insert(tok.clone(), id).is_some() {
                return Err(ToyGptError::InvalidArtifact(format!(
                    "duplicate vocabulary token {tok:?}"
                )));
            }
            vocab.id_to_token.push(tok);
            vocab.frequencies.push(freq);
        }
        Ok(vocab)
    }

    pub fn vocab_size(&self) -> usize {
        self.id_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_token.is_empty()
    }

    pub fn token_id(&self, token: &str) -> Option<usize> {
        self.token_to_id.get(token).copied()
    }

    pub fn id_token(&self, id: usize) -> Option<&str> {
        self.id_to_token.get(id).map(String::as_str)
    }

    /// Number of corpus occurrences; 0 for unknown tokens.
    pub fn frequency(&self, token: &str) -> usize {
        self.token_id(token)
            .map(|id| self.frequencies[id])
            .unwrap_or(0)
    }

    /// Map every token to its id.
    pub fn encode<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<usize>> {
        tokens
            .iter()
            .map(|tok| {
                self.token_id(tok.as_ref())
                    .ok_or_else(|| ToyGptError::UnknownToken(tok.as_ref().to_string()))
            })
            .collect()
    }

    /// Iterate `(id, token, frequency)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str, usize)> + '_ {
        self.id_to_token
            .iter()
            .zip(self.frequencies.iter())
            .enumerate()
            .map(|(id, (tok, &freq))| (id, tok.as_str(), freq))
    }
}
