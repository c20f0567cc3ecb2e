//! Training-time monitoring metrics for binary classifiers.
//!
//! All metrics here share the same contract: two equal-length slices of
//! float labels and predictions, one value per example, and a single f32
//! score out. Soft predictions are hardened first (clip to `[0, 1]`, then
//! round), so a probability of 0.7 counts as a positive call and 0.2 as a
//! negative one. Every division carries [`EPSILON`] in the denominator,
//! which turns the degenerate all-negative batch into a score of 0 instead
//! of NaN.

use crate::error::TrillheadError;

/// Fuzz factor added to denominators throughout the crate.
///
/// Shared by the metrics here, by [`binary_cross_entropy`] prediction
/// clipping, and by the default [`AdamConfig`] epsilon, so the whole
/// training stack agrees on one notion of "numerically zero".
///
/// [`binary_cross_entropy`]: crate::binary_cross_entropy
/// [`AdamConfig`]: crate::AdamConfig
pub const EPSILON: f32 = 1e-7;

/// Clips each value to `[0, 1]`, rounds to the nearest integer (ties to
/// even), and sums. With 0/1 labels and probabilities this is a count of
/// positive calls; values outside `[0, 1]` are absorbed by the clip rather
/// than rejected.
fn positive_count(values: impl Iterator<Item = f32>) -> f32 {
    values.map(|v| v.clamp(0.0, 1.0).round_ties_even()).sum()
}

fn check_lengths(labels: &[f32], predictions: &[f32]) -> Result<(), TrillheadError> {
    if labels.len() != predictions.len() {
        return Err(TrillheadError::ShapeMismatch {
            expected: labels.len(),
            got: predictions.len(),
        });
    }
    Ok(())
}

/// F1 score of hardened predictions against labels.
///
/// Computes precision and recall from the clipped-and-rounded inputs and
/// returns their harmonic mean, `2pr / (p + r + eps)`. A batch with no
/// positive labels and no positive predictions scores exactly 0.
///
/// Errors with [`TrillheadError::ShapeMismatch`] when the slices differ in
/// length. Empty slices are allowed and score 0.
pub fn f1(labels: &[f32], predictions: &[f32]) -> Result<f32, TrillheadError> {
    check_lengths(labels, predictions)?;
    let true_positives =
        positive_count(labels.iter().zip(predictions.iter()).map(|(&y, &p)| y * p));
    let possible_positives = positive_count(labels.iter().copied());
    let predicted_positives = positive_count(predictions.iter().copied());
    let precision = true_positives / (predicted_positives + EPSILON);
    let recall = true_positives / (possible_positives + EPSILON);
    Ok(2.0 * precision * recall / (precision + recall + EPSILON))
}

/// Precision of hardened predictions: true positives over predicted
/// positives. Scores 0 when nothing is predicted positive.
pub fn precision(labels: &[f32], predictions: &[f32]) -> Result<f32, TrillheadError> {
    check_lengths(labels, predictions)?;
    let true_positives =
        positive_count(labels.iter().zip(predictions.iter()).map(|(&y, &p)| y * p));
    let predicted_positives = positive_count(predictions.iter().copied());
    Ok(true_positives / (predicted_positives + EPSILON))
}

/// Recall of hardened predictions: true positives over labeled positives.
/// Scores 0 when the batch has no positive labels.
pub fn recall(labels: &[f32], predictions: &[f32]) -> Result<f32, TrillheadError> {
    check_lengths(labels, predictions)?;
    let true_positives =
        positive_count(labels.iter().zip(predictions.iter()).map(|(&y, &p)| y * p));
    let possible_positives = positive_count(labels.iter().copied());
    Ok(true_positives / (possible_positives + EPSILON))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f1_mixed_batch() {
        // tp = 1, labeled positives = 2, predicted positives = 1:
        // precision 1.0, recall 0.5, f1 = 2/3.
        let score = f1(&[1.0, 1.0, 0.0, 0.0], &[1.0, 0.0, 0.0, 0.0]).unwrap();
        assert!((score - 2.0 / 3.0).abs() < 1e-3, "expected ~0.667, got {score}");
    }

    #[test]
    fn f1_all_negative_batch_is_zero() {
        let score = f1(&[0.0, 0.0, 0.0], &[0.0, 0.0, 0.0]).unwrap();
        assert!(score.is_finite());
        assert_eq!(score, 0.0);
    }

    #[test]
    fn f1_perfect_batch() {
        let score = f1(&[1.0, 1.0, 1.0], &[1.0, 1.0, 1.0]).unwrap();
        assert!((score - 1.0).abs() < 1e-3, "expected ~1.0, got {score}");
    }

    #[test]
    fn f1_hardens_soft_predictions() {
        // 0.9 and 0.2 round to the same calls as 1.0 and 0.0, so the
        // scores are computed from identical counts.
        let hard = f1(&[1.0, 1.0, 0.0, 0.0], &[1.0, 0.0, 0.0, 0.0]).unwrap();
        let soft = f1(&[1.0, 1.0, 0.0, 0.0], &[0.9, 0.2, 0.3, 0.1]).unwrap();
        assert_eq!(hard, soft);
    }

    #[test]
    fn f1_half_rounds_to_even() {
        // round_ties_even sends exactly 0.5 to 0, so the lone prediction
        // is a negative call: tp = 0 and the score collapses to 0.
        let score = f1(&[1.0], &[0.5]).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn f1_empty_slices_score_zero() {
        assert_eq!(f1(&[], &[]).unwrap(), 0.0);
    }

    #[test]
    fn f1_length_mismatch_errors() {
        let err = f1(&[1.0, 0.0], &[1.0]).unwrap_err();
        assert!(matches!(
            err,
            TrillheadError::ShapeMismatch { expected: 2, got: 1 }
        ));
    }

    #[test]
    fn precision_and_recall_components() {
        let labels = [1.0, 1.0, 0.0, 0.0];
        let preds = [1.0, 0.0, 0.0, 0.0];
        let p = precision(&labels, &preds).unwrap();
        let r = recall(&labels, &preds).unwrap();
        assert!((p - 1.0).abs() < 1e-3, "precision should be ~1.0, got {p}");
        assert!((r - 0.5).abs() < 1e-3, "recall should be ~0.5, got {r}");
    }

    #[test]
    fn recall_no_positive_labels_is_zero() {
        let r = recall(&[0.0, 0.0], &[1.0, 1.0]).unwrap();
        assert!(r.is_finite());
        assert_eq!(r, 0.0);
    }
}
