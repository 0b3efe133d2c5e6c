pub mod layer;
pub mod linear;
pub mod relu;

pub use layer::{LayerKind, NeuralLayer};
pub use linear::LinearLayer;
pub use relu::ReluLayer;
