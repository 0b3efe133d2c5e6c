use serde::{Deserialize, Serialize};

/// Per-epoch training statistics; `Network::train` returns one per epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochStats {
    /// 0-based epoch index.
    pub epoch: u32,
    /// Total epochs requested for this run.
    pub total_epochs: u32,
    /// Mean mini-batch loss over this epoch.
    pub train_loss: f64,
    /// Training-set accuracy as a fraction in [0, 1], measured after the
    /// epoch's updates.
    pub train_accuracy: f64,
    /// Test-set accuracy as a fraction in [0, 1].
    pub test_accuracy: f64,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}
