use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Everything the experiment driver needs: dataset and model locations plus
/// training hyperparameters. Loadable from JSON so runs are reproducible
/// from a checked-in file; any field left out falls back to its default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Directory the model file lives in.
    pub model_path: PathBuf,
    pub model_name: String,

    pub train_images_path: PathBuf,
    pub train_labels_path: PathBuf,
    pub test_images_path: PathBuf,
    pub test_labels_path: PathBuf,

    pub epochs: u32,
    pub batch_size: usize,
    pub learning_rate: f32,

    /// Pixel scale applied when converting raw bytes to floats.
    pub normalization_factor: f32,
    pub num_classes: usize,
    /// Base seed for layer initialization; each linear layer offsets it.
    pub init_seed: u64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        ExperimentConfig {
            model_path: PathBuf::from("models"),
            model_name: "mnist_model.bin".to_owned(),
            train_images_path: PathBuf::from("data/train-images.idx3-ubyte"),
            train_labels_path: PathBuf::from("data/train-labels.idx1-ubyte"),
            test_images_path: PathBuf::from("data/t10k-images.idx3-ubyte"),
            test_labels_path: PathBuf::from("data/t10k-labels.idx1-ubyte"),
            epochs: 30,
            batch_size: 24,
            learning_rate: 0.01,
            normalization_factor: 1.0 / 255.0,
            num_classes: 10,
            init_seed: 42,
        }
    }
}

impl ExperimentConfig {
    /// Full path of the model file.
    pub fn model_file(&self) -> PathBuf {
        self.model_path.join(&self.model_name)
    }

    /// Deserializes a config from a JSON file.
    pub fn load_json(path: &str) -> io::Result<ExperimentConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Serializes the config to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> io::Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}
