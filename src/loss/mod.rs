pub mod softmax;

pub use softmax::{softmax, softmax_cross_entropy, softmax_cross_entropy_grad};
