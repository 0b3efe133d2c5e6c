use std::io::{self, Read, Write};
use std::time::Instant;

use crate::layers::layer::{LayerKind, NeuralLayer};
use crate::loss;
use crate::math::matrix::Matrix;
use crate::math::scalar::{DType, Float};
use crate::math::wire;
use crate::train::{EpochStats, TrainConfig};

/// Ordered sequence of exclusively-owned layers.
///
/// Layer order defines composition for `forward` and the reverse order for
/// `backward`. Adjacent layers must have compatible widths; a bad
/// composition fails inside the offending multiplication. Not cloneable,
/// since layers are not safely duplicable.
pub struct Network<F: Float> {
    layers: Vec<Box<dyn NeuralLayer<F>>>,
}

impl<F: Float> std::fmt::Debug for Network<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("num_layers", &self.layers.len())
            .finish()
    }
}

impl<F: Float> Network<F> {
    pub fn new() -> Self {
        Network { layers: Vec::new() }
    }

    /// Appends a layer, taking exclusive ownership.
    pub fn add_layer(&mut self, layer: Box<dyn NeuralLayer<F>>) {
        self.layers.push(layer);
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Threads `input` through every layer in order. Each layer refreshes
    /// its internal cache as a side effect.
    pub fn forward(&mut self, input: &Matrix<F>) -> Matrix<F> {
        let mut output = input.clone();
        for layer in &mut self.layers {
            output = layer.forward(&output);
        }
        output
    }

    /// Threads the loss gradient through the layers in reverse, returning
    /// the gradient with respect to the original input.
    pub fn backward(&mut self, grad_output: &Matrix<F>) -> Matrix<F> {
        let mut grad = grad_output.clone();
        for layer in self.layers.iter_mut().rev() {
            grad = layer.backward(&grad);
        }
        grad
    }

    pub fn update_weights(&mut self) {
        for layer in &mut self.layers {
            layer.update_weights();
        }
    }

    /// Mini-batch SGD over `config.epochs` epochs, returning one
    /// [`EpochStats`] per epoch.
    ///
    /// Each epoch reshuffles data and labels with the epoch index as the
    /// seed (the same seed keeps the pairing intact) and walks the batches:
    /// forward, softmax cross-entropy loss and gradient, backward, update.
    /// After the batches, accuracy is evaluated on the training and test
    /// sets and `config.on_epoch_end` is invoked with the test accuracy.
    pub fn train(
        &mut self,
        train_data: &Matrix<F>,
        train_labels: &Matrix<F>,
        test_data: &Matrix<F>,
        test_labels: &Matrix<F>,
        config: &mut TrainConfig<F>,
    ) -> Vec<EpochStats> {
        assert!(train_data.rows() > 0, "training data must not be empty");
        assert_eq!(
            train_data.rows(),
            train_labels.rows(),
            "training data and labels must have equal sample counts"
        );
        assert!(config.batch_size > 0, "batch size must be at least 1");

        let samples = train_data.rows();
        let batches = (samples + config.batch_size - 1) / config.batch_size;
        let mut history = Vec::with_capacity(config.epochs as usize);

        for epoch in 0..config.epochs {
            let started = Instant::now();

            let data = train_data.shuffle_rows(epoch as u64);
            let labels = train_labels.shuffle_rows(epoch as u64);

            let mut epoch_loss = 0.0;
            for batch in 0..batches {
                let start = batch * config.batch_size;
                let end = (start + config.batch_size).min(samples);
                let batch_data = data.slice_rows(start, end);
                let batch_labels = labels.slice_rows(start, end);

                let logits = self.forward(&batch_data);
                epoch_loss += loss::softmax_cross_entropy(&logits, &batch_labels).to_f64();
                let grad = loss::softmax_cross_entropy_grad(&logits, &batch_labels);
                self.backward(&grad);
                self.update_weights();
            }

            let train_accuracy = self.evaluate_accuracy(train_data, train_labels);
            let test_accuracy = self.evaluate_accuracy(test_data, test_labels);

            if let Some(callback) = config.on_epoch_end.as_mut() {
                callback(epoch, test_accuracy, self);
            }

            history.push(EpochStats {
                epoch,
                total_epochs: config.epochs,
                train_loss: epoch_loss / batches as f64,
                train_accuracy,
                test_accuracy,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }

        history
    }

    /// Fraction of rows whose most probable class matches the one-hot label.
    pub fn evaluate_accuracy(&mut self, data: &Matrix<F>, labels: &Matrix<F>) -> f64 {
        assert_eq!(
            data.rows(),
            labels.rows(),
            "data and labels must have equal sample counts"
        );
        if data.rows() == 0 {
            return 0.0;
        }

        let probabilities = loss::softmax(&self.forward(data));
        let mut correct = 0usize;
        for r in 0..probabilities.rows() {
            if probabilities.argmax_row(r) == labels.argmax_row(r) {
                correct += 1;
            }
        }
        correct as f64 / data.rows() as f64
    }

    /// Writes the network payload:
    /// `[dtype: u32][layer count: u32]{[layer tag: u32][layer payload]}`.
    pub fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        wire::write_u32(out, F::DTYPE.tag())?;
        wire::write_u32(out, self.layers.len() as u32)?;
        for layer in &self.layers {
            wire::write_u32(out, layer.kind().tag())?;
            layer.write_to(out)?;
        }
        Ok(())
    }

    /// Reconstructs a network from its payload, dispatching each stored
    /// layer tag through the [`LayerKind`] table. Layers are appended in
    /// file order, which equals the original append order.
    pub fn read_from(input: &mut dyn Read) -> io::Result<Network<F>> {
        let stored = DType::from_tag(wire::read_u32(input)?);
        if stored != F::DTYPE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "model stores {stored:?} elements but {:?} was requested",
                    F::DTYPE
                ),
            ));
        }

        let count = wire::read_u32(input)?;
        let mut network = Network::new();
        for _ in 0..count {
            let tag = wire::read_u32(input)?;
            let kind = LayerKind::from_tag(tag).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown layer type tag {tag} in model stream"),
                )
            })?;
            let mut layer = kind.build::<F>();
            layer.read_from(input)?;
            network.add_layer(layer);
        }
        Ok(network)
    }
}

impl<F: Float> Default for Network<F> {
    fn default() -> Self {
        Network::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{LinearLayer, ReluLayer};
    use crate::math::scalar::Scalar;

    fn toy_network(seed: u64, learning_rate: f64) -> Network<f64> {
        let mut network = Network::new();
        network.add_layer(Box::new(LinearLayer::new(2, 8, learning_rate, seed)));
        network.add_layer(Box::new(ReluLayer::new()));
        network.add_layer(Box::new(LinearLayer::new(8, 2, learning_rate, seed + 1)));
        network
    }

    /// Two linearly separable 2-D clusters, one-hot encoded.
    fn separable_dataset() -> (Matrix<f64>, Matrix<f64>) {
        let mut points = Vec::new();
        let mut labels = Vec::new();
        for i in 0..8 {
            let offset = 0.1 * i as f64;
            points.extend([offset, 0.5 + offset]);
            labels.push(0.0);
            points.extend([3.0 + offset, 3.5 + offset]);
            labels.push(1.0);
        }
        let data = Matrix::from_vec(points, 16, 2);
        let labels = Matrix::one_hot(&Matrix::from_vec(labels, 16, 1), 2);
        (data, labels)
    }

    /// Builds a 2x2 linear-layer payload with the given weights and biases.
    fn as_payload(weights: &[f64], biases: &[f64]) -> std::io::Cursor<Vec<u8>> {
        let mut buf: Vec<u8> = Vec::new();
        wire::write_u32(&mut buf, DType::F64.tag()).unwrap();
        0.0f64.write_le(&mut buf).unwrap();
        Matrix::from_vec(weights.to_vec(), 2, 2)
            .write_to(&mut buf)
            .unwrap();
        Matrix::from_vec(biases.to_vec(), 1, 2)
            .write_to(&mut buf)
            .unwrap();
        std::io::Cursor::new(buf)
    }

    #[test]
    fn forward_composes_layers_in_order() {
        let mut network = Network::<f64>::new();
        let mut first = LinearLayer::default();
        first
            .read_from(&mut as_payload(&[2.0, 0.0, 0.0, 2.0], &[1.0, 1.0]))
            .unwrap();
        let mut second = LinearLayer::default();
        second
            .read_from(&mut as_payload(&[0.0, 1.0, 1.0, 0.0], &[0.0, 0.0]))
            .unwrap();
        network.add_layer(Box::new(first));
        network.add_layer(Box::new(second));

        // (x * 2 + 1) then a column swap.
        let output = network.forward(&Matrix::from_vec(vec![1.0, 2.0], 1, 2));
        assert_eq!(output.into_vec(), vec![5.0, 3.0]);
    }

    #[test]
    fn self_predicted_labels_give_perfect_accuracy() {
        let mut network = toy_network(11, 0.1);
        let data = Matrix::<f64>::random(10, 2, -1.0, 1.0, 3);

        let logits = network.forward(&data);
        let mut predicted = Matrix::new(10, 1);
        for r in 0..10 {
            predicted[(r, 0)] = logits.argmax_row(r) as f64;
        }
        let labels = Matrix::one_hot(&predicted, 2);

        assert_eq!(network.evaluate_accuracy(&data, &labels), 1.0);
    }

    #[test]
    fn training_reduces_loss_on_a_separable_dataset() {
        let (data, labels) = separable_dataset();
        let mut network = toy_network(7, 0.05);

        let before = loss::softmax_cross_entropy(&network.forward(&data), &labels);

        let mut config = TrainConfig::new(60, 4);
        let history = network.train(&data, &labels, &data, &labels, &mut config);

        let after = loss::softmax_cross_entropy(&network.forward(&data), &labels);
        assert!(
            after < before,
            "loss did not improve: before {before}, after {after}"
        );
        assert_eq!(history.len(), 60);
        assert_eq!(history[0].total_epochs, 60);
    }

    #[test]
    fn epoch_callback_sees_every_epoch() {
        let (data, labels) = separable_dataset();
        let mut network = toy_network(5, 0.05);

        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let seen_by_callback = seen.clone();
        let mut config =
            TrainConfig::new(3, 8).with_epoch_callback(move |epoch, accuracy, net| {
                assert!((0.0..=1.0).contains(&accuracy));
                assert_eq!(net.num_layers(), 3);
                seen_by_callback.borrow_mut().push(epoch);
            });

        network.train(&data, &labels, &data, &labels, &mut config);
        assert_eq!(*seen.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn tail_batch_is_smaller_but_still_trained() {
        let (data, labels) = separable_dataset();
        let mut network = toy_network(9, 0.05);

        // 16 samples with batch size 5: four batches, the last of size 1.
        let mut config = TrainConfig::new(1, 5);
        let history = network.train(&data, &labels, &data, &labels, &mut config);
        assert_eq!(history.len(), 1);
        assert!(history[0].train_loss.is_finite());
    }

    #[test]
    fn payload_round_trip_preserves_forward_output() {
        let mut network = toy_network(21, 0.01);
        let mut buf: Vec<u8> = Vec::new();
        network.write_to(&mut buf).unwrap();

        let mut restored = Network::<f64>::read_from(&mut std::io::Cursor::new(buf)).unwrap();
        assert_eq!(restored.num_layers(), 3);

        let input = Matrix::<f64>::random(4, 2, -1.0, 1.0, 13);
        assert_eq!(restored.forward(&input), network.forward(&input));
    }

    #[test]
    fn unknown_layer_tag_is_a_format_error() {
        let mut buf: Vec<u8> = Vec::new();
        wire::write_u32(&mut buf, DType::F64.tag()).unwrap();
        wire::write_u32(&mut buf, 1).unwrap();
        wire::write_u32(&mut buf, 99).unwrap();

        let err = Network::<f64>::read_from(&mut std::io::Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("unknown layer type tag 99"));
    }

    #[test]
    fn element_type_mismatch_is_a_format_error() {
        let mut network = toy_network(2, 0.01);
        let mut buf: Vec<u8> = Vec::new();
        network.write_to(&mut buf).unwrap();

        let err = Network::<f32>::read_from(&mut std::io::Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
