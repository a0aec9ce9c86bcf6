//! Context-2 next-token model: one score table indexed by `(prev, curr)`.

use crate::error::{Result, ToyGptError};
use crate::ops::softmax;
use rayon::prelude::*;
use std::f32::consts::TAU;

/// Softmax regression over the next token given the two previous tokens.
///
/// The weight table is conceptually `prev x curr x next`, stored flattened
/// row-major: row `prev * vocab_size + curr` holds one score per next token.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleNextTokenModel {
    vocab_size: usize,
    weights: Vec<f32>,
}

impl SimpleNextTokenModel {
    /// Zero-initialised model; every prediction starts out uniform.
    pub fn new(vocab_size: usize) -> Self {
        SimpleNextTokenModel {
            vocab_size,
            weights: vec![0.0; vocab_size * vocab_size * vocab_size],
        }
    }

    /// Wrap an existing flattened weight table.
    pub fn from_weights(vocab_size: usize, weights: Vec<f32>) -> Result<Self> {
        let expected = vocab_size * vocab_size * vocab_size;
        if weights.len() != expected {
            return Err(ToyGptError::InvalidArtifact(format!(
                "expected {expected} weights for vocab size {vocab_size}, found {}",
                weights.len()
            )));
        }
        Ok(SimpleNextTokenModel {
            vocab_size,
            weights,
        })
    }

    #[inline]
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Number of context rows (`vocab_size^2`).
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.vocab_size * self.vocab_size
    }

    #[inline]
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    #[inline]
    pub fn row_index(&self, prev: usize, curr: usize) -> usize {
        prev * self.vocab_size + curr
    }

    /// Raw next-token scores for a context.
    ///
    /// Panics if either id is outside the vocabulary.
    pub fn scores(&self, prev: usize, curr: usize) -> &[f32] {
        let off = self.row_index(prev, curr) * self.vocab_size;
        &self.weights[off..off + self.vocab_size]
    }

    pub fn row_mut(&mut self, prev: usize, curr: usize) -> &mut [f32] {
        let off = self.row_index(prev, curr) * self.vocab_size;
        &mut self.weights[off..off + self.vocab_size]
    }

    /// Next-token probability distribution for `(prev, curr)`.
    pub fn forward(&self, prev: usize, curr: usize) -> Vec<f32> {
        let mut probs = self.scores(prev, curr).to_vec();
        softmax(&mut probs);
        probs
    }

    /// Two-dimensional projection of each token for plotting.
    ///
    /// A token's profile is the mean next-token distribution over every
    /// context whose current token it is; the profile is then placed on the
    /// unit circle with next-token `j` at angle `2πj / vocab_size`.
    pub fn token_projection(&self) -> Vec<[f32; 2]> {
        let v = self.vocab_size;
        (0..v)
            .into_par_iter()
            .map(|curr| {
                let mut profile = vec![0.0f32; v];
                for prev in 0..v {
                    for (acc, p) in profile.iter_mut().zip(self.forward(prev, curr)) {
                        *acc += p;
                    }
                }
                let mut point = [0.0f32; 2];
                for (j, acc) in profile.iter().enumerate() {
                    let theta = TAU * j as f32 / v as f32;
                    let p = acc / v as f32;
                    point[0] += p * theta.cos();
                    point[1] += p * theta.sin();
                }
                point
            })
            .collect()
    }
}
