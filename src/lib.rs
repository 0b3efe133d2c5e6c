pub mod config;
pub mod data;
pub mod layers;
pub mod loss;
pub mod math;
pub mod network;
pub mod train;

// Convenience re-exports
pub use config::ExperimentConfig;
pub use data::mnist::{Dataset, MnistLoader};
pub use layers::{LayerKind, LinearLayer, NeuralLayer, ReluLayer};
pub use math::matrix::{Matrix, ParallelPolicy};
pub use math::scalar::{DType, Float, Scalar};
pub use network::{ModelSerializer, Network, MODEL_MAGIC};
pub use train::{EpochStats, TrainConfig};
