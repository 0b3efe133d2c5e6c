pub mod config;
pub mod stats;

pub use config::{EpochCallback, TrainConfig};
pub use stats::EpochStats;
