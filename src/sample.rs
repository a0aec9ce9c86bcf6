//! Next-token selection and text generation.

use crate::error::{Result, ToyGptError};
use crate::model::SimpleNextTokenModel;
use crate::ops::{LOG_EPS, argmax, softmax};
use crate::state::ContextWindow;
use crate::vocab::Vocabulary;
use rand::Rng;

/// Decoding settings for generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingConfig {
    /// 0 (or anything below `MIN_TEMPERATURE`) selects greedy decoding
    pub temperature: f32,
    /// Nucleus threshold; outside (0, 1) means plain multinomial sampling
    pub top_p: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        SamplingConfig {
            temperature: 0.0,
            top_p: 0.9,
        }
    }
}

impl SamplingConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(ToyGptError::InvalidConfig(format!(
                "temperature must be >= 0, got {}",
                self.temperature
            )));
        }
        if self.top_p.is_nan() {
            return Err(ToyGptError::InvalidConfig("top-p must be a number".into()));
        }
        Ok(())
    }
}

/// Temperatures below this decode greedily; smaller divisors overflow the
/// rescaled log-probabilities.
pub const MIN_TEMPERATURE: f32 = 1e-4;

/// Used for sorting probabilities in top-p sampling.
#[derive(Clone, Copy)]
struct ProbIndex {
    prob: f32,
    index: usize,
}

/// Pick the next token id from a probability distribution.
///
/// - `temperature < MIN_TEMPERATURE`: greedy (argmax)
/// - `top_p <= 0 || top_p >= 1`: standard multinomial sampling
/// - otherwise: nucleus (top-p) sampling
pub fn sample<R: Rng>(probs: &[f32], config: &SamplingConfig, rng: &mut R) -> usize {
    if config.temperature < MIN_TEMPERATURE || probs.len() < 2 {
        return argmax(probs);
    }

    // Rescale log-probabilities by temperature
    let mut dist: Vec<f32> = probs
        .iter()
        .map(|p| p.max(LOG_EPS).ln() / config.temperature)
        .collect();
    softmax(&mut dist);

    let r: f32 = rng.random();

    if config.top_p <= 0.0 || config.top_p >= 1.0 {
        let mut cdf = 0.0f32;
        for (i, &p) in dist.iter().enumerate() {
            cdf += p;
            if r < cdf {
                return i;
            }
        }
        return dist.len() - 1;
    }

    let mut prob_index: Vec<ProbIndex> = dist
        .iter()
        .enumerate()
        .map(|(i, &p)| ProbIndex { prob: p, index: i })
        .collect();
    prob_index.sort_by(|a, b| {
        b.prob
            .partial_cmp(&a.prob)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Smallest prefix whose mass exceeds top_p
    let mut cum_prob = 0.0f32;
    let mut last_idx = prob_index.len() - 1;
    for (i, pi) in prob_index.iter().enumerate() {
        cum_prob += pi.prob;
        if cum_prob > config.top_p {
            last_idx = i;
            break;
        }
    }

    let r_scaled = r * cum_prob;
    let mut cdf = 0.0f32;
    for pi in prob_index.iter().take(last_idx + 1) {
        cdf += pi.prob;
        if r_scaled < cdf {
            return pi.index;
        }
    }
    prob_index[last_idx].index
}

/// Generate `num_tokens` tokens after `start`.
///
/// The result begins with `start`; the first context is `(start, start)`.
pub fn generate_tokens_context2<R: Rng>(
    model: &SimpleNextTokenModel,
    vocab: &Vocabulary,
    start: &str,
    num_tokens: usize,
    config: &SamplingConfig,
    rng: &mut R,
) -> Result<Vec<String>> {
    config.validate()?;
    let start_id = vocab
        .token_id(start)
        .ok_or_else(|| ToyGptError::UnknownToken(start.to_string()))?;
    if model.vocab_size() != vocab.vocab_size() {
        return Err(ToyGptError::InvalidArtifact(format!(
            "model vocab size {} does not match vocabulary size {}",
            model.vocab_size(),
            vocab.vocab_size()
        )));
    }

    let mut window = ContextWindow::bootstrap(start_id);
    let mut generated = Vec::with_capacity(num_tokens + 1);
    generated.push(start.to_string());

    for _ in 0..num_tokens {
        let probs = model.forward(window.previous, window.current);
        let next = sample(&probs, config, rng);
        // ids come from a distribution over this vocabulary
        let tok = vocab.id_token(next).unwrap_or_default();
        generated.push(tok.to_string());
        window.advance(next);
    }

    Ok(generated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// cat -> dog -> cat -> dog ... with (x, x) contexts also pointing at the cycle
    fn cyclic_model() -> (SimpleNextTokenModel, Vocabulary) {
        let vocab = Vocabulary::new(&["cat", "dog"]);
        let mut model = SimpleNextTokenModel::new(2);
        model.row_mut(0, 0)[1] = 5.0;
        model.row_mut(1, 1)[0] = 5.0;
        model.row_mut(0, 1)[0] = 5.0;
        model.row_mut(1, 0)[1] = 5.0;
        (model, vocab)
    }

    #[test]
    fn greedy_is_argmax() {
        let mut rng = StdRng::seed_from_u64(0);
        let config = SamplingConfig::default();
        assert_eq!(sample(&[0.1, 0.6, 0.3], &config, &mut rng), 1);
    }

    #[test]
    fn tiny_temperature_decodes_greedily() {
        let mut rng = StdRng::seed_from_u64(0);
        for temperature in [1e-40, 1e-9, 5e-5] {
            let config = SamplingConfig {
                temperature,
                top_p: 0.9,
            };
            assert_eq!(sample(&[0.7, 0.2, 0.1], &config, &mut rng), 0);
            assert_eq!(sample(&[0.1, 0.2, 0.7], &config, &mut rng), 2);
        }
    }

    #[test]
    fn low_temperature_still_picks_the_favourite() {
        // just above the greedy cutoff the rescaled scores must stay finite
        let config = SamplingConfig {
            temperature: 2e-4,
            top_p: 0.0,
        };
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..16 {
            assert_eq!(sample(&[0.2, 0.7, 0.1], &config, &mut rng), 1);
        }
    }

    #[test]
    fn sampling_stays_in_range_and_is_reproducible() {
        let probs = [0.2, 0.5, 0.3];
        let config = SamplingConfig {
            temperature: 1.0,
            top_p: 0.0,
        };
        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..32).map(|_| sample(&probs, &config, &mut rng)).collect::<Vec<_>>()
        };
        let a = draw(7);
        assert_eq!(a, draw(7));
        assert!(a.iter().all(|&i| i < 3));
    }

    #[test]
    fn nucleus_excludes_tail() {
        let probs = [0.9, 0.08, 0.02];
        let config = SamplingConfig {
            temperature: 1.0,
            top_p: 0.5,
        };
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..64 {
            assert_eq!(sample(&probs, &config, &mut rng), 0);
        }
    }

    #[test]
    fn greedy_generation_follows_cycle() {
        let (model, vocab) = cyclic_model();
        let mut rng = StdRng::seed_from_u64(0);
        let out = generate_tokens_context2(
            &model,
            &vocab,
            "cat",
            4,
            &SamplingConfig::default(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(out, vec!["cat", "dog", "cat", "dog", "cat"]);
    }

    #[test]
    fn zero_tokens_returns_start_only() {
        let (model, vocab) = cyclic_model();
        let mut rng = StdRng::seed_from_u64(0);
        let out = generate_tokens_context2(
            &model,
            &vocab,
            "dog",
            0,
            &SamplingConfig::default(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(out, vec!["dog"]);
    }

    #[test]
    fn unknown_start_token_is_an_error() {
        let (model, vocab) = cyclic_model();
        let mut rng = StdRng::seed_from_u64(0);
        let err = generate_tokens_context2(
            &model,
            &vocab,
            "emu",
            3,
            &SamplingConfig::default(),
            &mut rng,
        )
        .unwrap_err();
        assert!(matches!(err, ToyGptError::UnknownToken(t) if t == "emu"));
    }
}
