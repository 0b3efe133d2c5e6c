use std::io::{self, Read, Write};

use crate::layers::layer::{LayerKind, NeuralLayer};
use crate::math::matrix::Matrix;
use crate::math::scalar::Float;

/// Rectified-linear activation: `forward(X) = max(0, X)` element-wise.
/// Carries no parameters; only the cached input needed by `backward`.
#[derive(Default)]
pub struct ReluLayer<F: Float> {
    input_cache: Matrix<F>,
}

impl<F: Float> ReluLayer<F> {
    pub fn new() -> Self {
        ReluLayer {
            input_cache: Matrix::default(),
        }
    }
}

impl<F: Float> NeuralLayer<F> for ReluLayer<F> {
    fn kind(&self) -> LayerKind {
        LayerKind::Relu
    }

    fn forward(&mut self, input: &Matrix<F>) -> Matrix<F> {
        let output = input.map(|x| x.max(F::ZERO));
        self.input_cache = input.clone();
        output
    }

    fn backward(&mut self, grad_output: &Matrix<F>) -> Matrix<F> {
        assert_eq!(
            (self.input_cache.rows(), self.input_cache.cols()),
            (grad_output.rows(), grad_output.cols()),
            "gradient dimensions must match the cached forward input"
        );
        let mut grad_input = Matrix::new(grad_output.rows(), grad_output.cols());
        for r in 0..grad_output.rows() {
            for c in 0..grad_output.cols() {
                if self.input_cache[(r, c)] > F::ZERO {
                    grad_input[(r, c)] = grad_output[(r, c)];
                }
            }
        }
        grad_input
    }

    fn update_weights(&mut self) {}

    fn write_to(&self, _out: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }

    fn read_from(&mut self, _input: &mut dyn Read) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_clamps_negatives_to_zero() {
        let mut relu = ReluLayer::<f64>::new();
        let input = Matrix::from_vec(vec![-1.0, 0.0, 2.5, -0.1], 2, 2);
        let output = relu.forward(&input);
        assert_eq!(output.into_vec(), vec![0.0, 0.0, 2.5, 0.0]);
    }

    #[test]
    fn backward_gates_on_strictly_positive_inputs() {
        let mut relu = ReluLayer::<f64>::new();
        let input = Matrix::from_vec(vec![-1.0, 0.0, 2.5, 3.0], 2, 2);
        relu.forward(&input);

        let grad_output = Matrix::from_vec(vec![10.0, 10.0, 10.0, 10.0], 2, 2);
        let grad_input = relu.backward(&grad_output);
        // Zero input is not strictly positive, so its gradient is dropped.
        assert_eq!(grad_input.into_vec(), vec![0.0, 0.0, 10.0, 10.0]);
    }

    #[test]
    fn persistence_payload_is_empty() {
        let relu = ReluLayer::<f32>::new();
        let mut buf: Vec<u8> = Vec::new();
        relu.write_to(&mut buf).unwrap();
        assert!(buf.is_empty());
    }
}
