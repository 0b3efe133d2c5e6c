pub mod network;
pub mod serializer;

pub use network::Network;
pub use serializer::{ModelSerializer, MODEL_MAGIC};
