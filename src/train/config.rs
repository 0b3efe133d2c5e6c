use crate::math::scalar::Float;
use crate::network::network::Network;

/// Callback invoked after each epoch's evaluation with the epoch index, the
/// test-set accuracy, and the network in its current state. This is the one
/// injection point for checkpointing policy, which stays outside the core.
pub type EpochCallback<F> = Box<dyn FnMut(u32, f64, &Network<F>)>;

/// Hyperparameters for one `Network::train` run.
pub struct TrainConfig<F: Float> {
    /// Full passes over the training data.
    pub epochs: u32,
    /// Samples per mini-batch; the last batch of an epoch may be smaller.
    pub batch_size: usize,
    /// Optional end-of-epoch hook.
    pub on_epoch_end: Option<EpochCallback<F>>,
}

impl<F: Float> TrainConfig<F> {
    pub fn new(epochs: u32, batch_size: usize) -> Self {
        TrainConfig {
            epochs,
            batch_size,
            on_epoch_end: None,
        }
    }

    pub fn with_epoch_callback(
        mut self,
        callback: impl FnMut(u32, f64, &Network<F>) + 'static,
    ) -> Self {
        self.on_epoch_end = Some(Box::new(callback));
        self
    }
}
