use std::io::{self, Read, Write};

use crate::layers::layer::{LayerKind, NeuralLayer};
use crate::math::matrix::Matrix;
use crate::math::scalar::{DType, Float};
use crate::math::wire;

/// Affine layer: `forward(X) = X * W + b`, broadcast over the batch.
///
/// Owns its weight and bias matrices, the gradient accumulators filled in by
/// `backward`, the learning rate applied by `update_weights`, and the input
/// cached by the most recent forward pass.
pub struct LinearLayer<F: Float> {
    weights: Matrix<F>,
    biases: Matrix<F>,
    grad_weights: Matrix<F>,
    grad_biases: Matrix<F>,
    input_cache: Matrix<F>,
    learning_rate: F,
}

impl<F: Float> LinearLayer<F> {
    /// Fresh layer with Xavier-initialized weights: uniform in
    /// `[-limit, limit]` where `limit = sqrt(6 / (input_size + output_size))`.
    /// Biases start at zero.
    pub fn new(input_size: usize, output_size: usize, learning_rate: F, seed: u64) -> Self {
        let limit = F::from_f64(6.0 / (input_size + output_size) as f64).sqrt();
        LinearLayer {
            weights: Matrix::random(input_size, output_size, -limit, limit, seed),
            biases: Matrix::new(1, output_size),
            grad_weights: Matrix::new(input_size, output_size),
            grad_biases: Matrix::new(1, output_size),
            input_cache: Matrix::default(),
            learning_rate,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows()
    }

    pub fn output_size(&self) -> usize {
        self.weights.cols()
    }

    pub fn learning_rate(&self) -> F {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, learning_rate: F) {
        self.learning_rate = learning_rate;
    }

    pub fn weights(&self) -> &Matrix<F> {
        &self.weights
    }

    pub fn biases(&self) -> &Matrix<F> {
        &self.biases
    }
}

/// Empty layer for the model loader; only valid once `read_from` has filled
/// it in.
impl<F: Float> Default for LinearLayer<F> {
    fn default() -> Self {
        LinearLayer {
            weights: Matrix::default(),
            biases: Matrix::default(),
            grad_weights: Matrix::default(),
            grad_biases: Matrix::default(),
            input_cache: Matrix::default(),
            learning_rate: F::ZERO,
        }
    }
}

impl<F: Float> NeuralLayer<F> for LinearLayer<F> {
    fn kind(&self) -> LayerKind {
        LayerKind::Linear
    }

    fn forward(&mut self, input: &Matrix<F>) -> Matrix<F> {
        let mut output = input * &self.weights;
        output += &self.biases.broadcast_rows(output.rows());
        self.input_cache = input.clone();
        output
    }

    fn backward(&mut self, grad_output: &Matrix<F>) -> Matrix<F> {
        self.grad_weights = &self.input_cache.transpose() * grad_output;
        self.grad_biases = grad_output.collapse_rows();
        grad_output * &self.weights.transpose()
    }

    fn update_weights(&mut self) {
        self.weights -= &(&self.grad_weights * self.learning_rate);
        self.biases -= &(&self.grad_biases * self.learning_rate);
    }

    fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        wire::write_u32(out, F::DTYPE.tag())?;
        self.learning_rate.write_le(out)?;
        self.weights.write_to(out)?;
        self.biases.write_to(out)
    }

    fn read_from(&mut self, input: &mut dyn Read) -> io::Result<()> {
        let stored = DType::from_tag(wire::read_u32(input)?);
        if stored != F::DTYPE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "linear layer stores {stored:?} elements but {:?} was requested",
                    F::DTYPE
                ),
            ));
        }

        self.learning_rate = F::read_le(input)?;
        self.weights = Matrix::read_from(input)?;
        self.biases = Matrix::read_from(input)?;

        // Gradient accumulators are not persisted; size them to the loaded
        // parameters so the next backward/update pass is valid.
        self.grad_weights = Matrix::new(self.weights.rows(), self.weights.cols());
        self.grad_biases = Matrix::new(self.biases.rows(), self.biases.cols());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_layer() -> LinearLayer<f64> {
        let mut layer = LinearLayer::new(2, 2, 0.5, 0);
        layer.weights = Matrix::from_vec(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
        layer.biases = Matrix::from_vec(vec![10.0, 20.0], 1, 2);
        layer
    }

    #[test]
    fn initialization_respects_the_xavier_range() {
        let layer = LinearLayer::<f32>::new(100, 50, 0.01, 42);
        let limit = (6.0f32 / 150.0).sqrt();
        assert!(layer
            .weights()
            .as_slice()
            .iter()
            .all(|&w| (-limit..=limit).contains(&w)));
        assert!(layer.biases().as_slice().iter().all(|&b| b == 0.0));

        // Same seed, same parameters.
        let twin = LinearLayer::<f32>::new(100, 50, 0.01, 42);
        assert_eq!(layer.weights(), twin.weights());
    }

    #[test]
    fn forward_is_affine_with_broadcast_bias() {
        let mut layer = fixed_layer();
        let input = Matrix::from_vec(vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0], 3, 2);
        let output = layer.forward(&input);
        assert_eq!(output.rows(), 3);
        assert_eq!(output.cols(), 2);
        assert_eq!(output.into_vec(), vec![11.0, 22.0, 13.0, 24.0, 14.0, 26.0]);
    }

    #[test]
    fn backward_produces_the_affine_gradients() {
        let mut layer = fixed_layer();
        let input = Matrix::from_vec(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
        layer.forward(&input);

        let grad_output = Matrix::from_vec(vec![1.0, 0.0, 0.0, 1.0], 2, 2);
        let grad_input = layer.backward(&grad_output);

        // dW = X^T * dY, db = column sums of dY, dX = dY * W^T.
        assert_eq!(layer.grad_weights.as_slice(), &[1.0, 3.0, 2.0, 4.0]);
        assert_eq!(layer.grad_biases.as_slice(), &[1.0, 1.0]);
        assert_eq!(grad_input.into_vec(), vec![1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn update_applies_scaled_gradients() {
        let mut layer = fixed_layer();
        layer.grad_weights = Matrix::from_vec(vec![2.0, 2.0, 2.0, 2.0], 2, 2);
        layer.grad_biases = Matrix::from_vec(vec![4.0, 4.0], 1, 2);

        layer.update_weights();

        assert_eq!(layer.weights().as_slice(), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(layer.biases().as_slice(), &[8.0, 18.0]);
    }

    #[test]
    fn persistence_round_trips_and_restores_accumulators() {
        let mut layer = LinearLayer::<f32>::new(3, 4, 0.05, 9);
        let mut buf: Vec<u8> = Vec::new();
        layer.write_to(&mut buf).unwrap();

        let mut restored = LinearLayer::<f32>::default();
        restored
            .read_from(&mut std::io::Cursor::new(buf))
            .unwrap();

        assert_eq!(restored.weights(), layer.weights());
        assert_eq!(restored.biases(), layer.biases());
        assert_eq!(restored.learning_rate(), 0.05);
        assert_eq!(restored.grad_weights.rows(), 3);
        assert_eq!(restored.grad_weights.cols(), 4);
        assert_eq!(restored.grad_biases.cols(), 4);

        // The restored layer is immediately trainable.
        let input = Matrix::<f32>::random(2, 3, -1.0, 1.0, 1);
        let out = restored.forward(&input);
        restored.backward(&Matrix::new(out.rows(), out.cols()));
        restored.update_weights();
        let _ = layer.forward(&input);
    }

    #[test]
    fn element_type_mismatch_is_rejected() {
        let layer = LinearLayer::<f32>::new(2, 2, 0.1, 3);
        let mut buf: Vec<u8> = Vec::new();
        layer.write_to(&mut buf).unwrap();

        let mut as_f64 = LinearLayer::<f64>::default();
        let err = as_f64
            .read_from(&mut std::io::Cursor::new(buf))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
