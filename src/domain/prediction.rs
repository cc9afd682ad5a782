//! Score, probability and prediction types.

use crate::core::constants::NUM_CLASSES;
use crate::core::errors::{DigitError, DigitResult};
use serde::Serialize;

/// Raw, unbounded scores (logits) for the ten digit classes.
///
/// Index `i` holds the score of digit `i`. Every value is finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreVector([f32; NUM_CLASSES]);

impl ScoreVector {
    /// Creates a score vector from a fixed array.
    ///
    /// # Errors
    ///
    /// Returns [`DigitError::InvalidInput`] if any score is NaN or infinite.
    pub fn new(scores: [f32; NUM_CLASSES]) -> DigitResult<Self> {
        match first_non_finite(&scores) {
            Some((class, value)) => Err(DigitError::InvalidInput {
                message: format!("non-finite score {value} for class {class}"),
            }),
            None => Ok(Self(scores)),
        }
    }

    /// Validates raw scorer output against the score-vector contract.
    ///
    /// `scorer` names the producer in the error message.
    pub fn try_from_raw(raw: Vec<f32>, scorer: &str) -> DigitResult<Self> {
        let scores: [f32; NUM_CLASSES] = raw.try_into().map_err(|raw: Vec<f32>| {
            DigitError::malformed_scores(
                scorer,
                format!("expected {} scores, got {}", NUM_CLASSES, raw.len()),
            )
        })?;

        if let Some((class, value)) = first_non_finite(&scores) {
            return Err(DigitError::malformed_scores(
                scorer,
                format!("non-finite score {value} for class {class}"),
            ));
        }

        Ok(Self(scores))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Largest score.
    pub fn max(&self) -> f32 {
        self.0.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }
}

fn first_non_finite(scores: &[f32; NUM_CLASSES]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .find(|(_, v)| !v.is_finite())
}

/// A probability distribution over the ten digit classes.
///
/// Values lie in `[0, 1]` and sum to 1 within floating-point tolerance.
/// Only produced by [`crate::processors::softmax`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProbabilityVector([f32; NUM_CLASSES]);

impl ProbabilityVector {
    pub(crate) fn from_normalized(probabilities: [f32; NUM_CLASSES]) -> Self {
        Self(probabilities)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Probability of `class`, or `None` if `class >= 10`.
    pub fn get(&self, class: usize) -> Option<f32> {
        self.0.get(class).copied()
    }

    pub fn sum(&self) -> f32 {
        self.0.iter().sum()
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.0.to_vec()
    }
}

/// A single ranked class with its label and probability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    /// The digit class.
    pub class_id: usize,
    /// The human-readable label (`"0"` to `"9"`).
    pub label: String,
    /// Probability of this class (0.0 to 1.0).
    pub score: f32,
}

impl Classification {
    pub fn new(class_id: usize, label: String, score: f32) -> Self {
        Self {
            class_id,
            label,
            score,
        }
    }
}

/// The outcome of classifying one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// The predicted digit, 0 to 9.
    pub digit: u8,
    /// Probability of `digit` as an integer percentage, 0 to 100.
    pub confidence: u8,
    /// The full distribution over all ten classes.
    pub probabilities: ProbabilityVector,
}

impl Prediction {
    /// Returns the `k` most probable classes, most probable first.
    ///
    /// Classes with equal probability keep ascending class order.
    pub fn top_k(&self, k: usize) -> Vec<Classification> {
        let labels = digit_labels();
        let mut ranked: Vec<(usize, f32)> =
            self.probabilities.as_slice().iter().copied().enumerate().collect();
        // sort_by is stable, so equal scores stay in class order
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
            .into_iter()
            .take(k)
            .map(|(class_id, score)| Classification::new(class_id, labels[class_id].clone(), score))
            .collect()
    }
}

/// Class labels for the ten digits.
pub fn digit_labels() -> Vec<String> {
    (0..NUM_CLASSES).map(|d| d.to_string()).collect()
}
