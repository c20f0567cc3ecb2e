//! Binary cross-entropy loss.

use crate::error::TrillheadError;
use crate::metrics::EPSILON;

/// Mean binary cross-entropy of predicted probabilities against 0/1 labels.
///
/// Each prediction is clipped to `[EPSILON, 1 - EPSILON]` before the logs,
/// so saturated outputs of exactly 0 or 1 produce a large finite loss
/// instead of infinity. Accumulation runs in f64.
///
/// Errors with [`TrillheadError::ShapeMismatch`] when the slices differ in
/// length. Empty slices are allowed and score 0.
pub fn binary_cross_entropy(labels: &[f32], predictions: &[f32]) -> Result<f32, TrillheadError> {
    if labels.len() != predictions.len() {
        return Err(TrillheadError::ShapeMismatch {
            expected: labels.len(),
            got: predictions.len(),
        });
    }
    if labels.is_empty() {
        return Ok(0.0);
    }
    let mut sum = 0.0f64;
    for (&y, &p) in labels.iter().zip(predictions.iter()) {
        let p = p.clamp(EPSILON, 1.0 - EPSILON) as f64;
        let y = y as f64;
        sum -= y * p.ln() + (1.0 - y) * (1.0 - p).ln();
    }
    Ok((sum / labels.len() as f64) as f32)
}
