//! Softmax cross-entropy: the classification loss paired with the network's
//! logit output. Stateless functions over matrices; labels are one-hot rows.

use crate::math::matrix::Matrix;
use crate::math::scalar::Float;

/// Added inside `ln()` so a zero probability cannot produce `-inf`.
const EPS: f64 = 1e-15;

/// Row-wise softmax: `p(r, c) = exp(z(r, c)) / Σ_c' exp(z(r, c'))`.
pub fn softmax<F: Float>(logits: &Matrix<F>) -> Matrix<F> {
    let mut probabilities = logits.clone();
    for r in 0..logits.rows() {
        let mut sum_of_exponentials = F::ZERO;
        for c in 0..logits.cols() {
            sum_of_exponentials += logits[(r, c)].exp();
        }
        for c in 0..logits.cols() {
            probabilities[(r, c)] = logits[(r, c)].exp() / sum_of_exponentials;
        }
    }
    probabilities
}

/// Mean cross-entropy between softmaxed logits and one-hot labels: for each
/// row, `-ln(p + eps)` at the label's column, averaged over rows.
pub fn softmax_cross_entropy<F: Float>(logits: &Matrix<F>, labels: &Matrix<F>) -> F {
    assert_eq!(
        (logits.rows(), logits.cols()),
        (labels.rows(), labels.cols()),
        "logits and labels must have matching dimensions"
    );
    let probabilities = softmax(logits);

    let mut total_loss = F::ZERO;
    for r in 0..logits.rows() {
        for c in 0..logits.cols() {
            if labels[(r, c)] == F::ONE {
                total_loss -= (probabilities[(r, c)] + F::from_f64(EPS)).ln();
                break;
            }
        }
    }
    total_loss / F::from_f64(logits.rows() as f64)
}

/// Gradient of the combined softmax + cross-entropy w.r.t. the logits:
/// `(softmax(logits) - labels) / rows`.
pub fn softmax_cross_entropy_grad<F: Float>(logits: &Matrix<F>, labels: &Matrix<F>) -> Matrix<F> {
    assert_eq!(
        (logits.rows(), logits.cols()),
        (labels.rows(), labels.cols()),
        "logits and labels must have matching dimensions"
    );
    let rows = F::from_f64(logits.rows() as f64);
    &(&softmax(logits) - labels) / rows
}
