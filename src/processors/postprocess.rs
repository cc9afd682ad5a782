//! Score post-processing: softmax, argmax and confidence rounding.

use crate::core::constants::NUM_CLASSES;
use crate::domain::{ProbabilityVector, ScoreVector};

/// Converts raw scores into a probability distribution.
///
/// The maximum score is subtracted before exponentiating, so large logits
/// cannot overflow. Adding a constant to every score leaves the result
/// unchanged.
pub fn softmax(scores: &ScoreVector) -> ProbabilityVector {
    let max = scores.max();
    let mut exps = [0.0f32; NUM_CLASSES];
    for (e, &s) in exps.iter_mut().zip(scores.as_slice()) {
        *e = (s - max).exp();
    }
    // the maximum contributes exp(0) = 1, so the sum is at least 1
    let sum: f32 = exps.iter().sum();
    for e in exps.iter_mut() {
        *e /= sum;
    }
    ProbabilityVector::from_normalized(exps)
}

/// Index of the largest value; the first (lowest) index wins ties.
///
/// Returns 0 for an empty slice. NaN values are never selected.
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}

/// Converts a probability into an integer percentage.
///
/// `probability * 100` is computed in `f32` and rounded half to even, so
/// `0.845` gives `84` and `0.375` gives `38`.
pub fn confidence_percent(probability: f32) -> u8 {
    round_percent(probability * 100.0)
}

/// Rounds a percentage half to even and clamps it to `0..=100`.
pub fn round_percent(percent: f32) -> u8 {
    percent.round_ties_even().clamp(0.0, 100.0) as u8
}
