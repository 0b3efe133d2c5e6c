pub mod mnist;

pub use mnist::{Dataset, MnistLoader};
