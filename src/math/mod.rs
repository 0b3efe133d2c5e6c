pub mod matrix;
pub mod scalar;
pub(crate) mod wire;

pub use matrix::{Matrix, ParallelPolicy};
pub use scalar::{DType, Float, Scalar};
