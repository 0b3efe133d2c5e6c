use std::io::{self, Read, Write};

use crate::layers::linear::LinearLayer;
use crate::layers::relu::ReluLayer;
use crate::math::matrix::Matrix;
use crate::math::scalar::Float;

/// Identifies a concrete layer variant in model files.
///
/// The tag values are part of the wire format and must not be renumbered;
/// [`LayerKind::build`] is the single tag-to-constructor table the model
/// loader dispatches through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Linear,
    Relu,
}

impl LayerKind {
    pub fn tag(self) -> u32 {
        match self {
            LayerKind::Linear => 1,
            LayerKind::Relu => 2,
        }
    }

    pub fn from_tag(tag: u32) -> Option<LayerKind> {
        match tag {
            1 => Some(LayerKind::Linear),
            2 => Some(LayerKind::Relu),
            _ => None,
        }
    }

    /// Constructs an empty layer of this kind, ready for
    /// [`NeuralLayer::read_from`].
    pub fn build<F: Float>(self) -> Box<dyn NeuralLayer<F>> {
        match self {
            LayerKind::Linear => Box::new(LinearLayer::default()),
            LayerKind::Relu => Box::new(ReluLayer::default()),
        }
    }
}

/// A network layer: forward/backward propagation, gradient application, and
/// binary persistence of whatever internal state the variant carries.
///
/// `forward` caches its input; `backward` consumes the most recent cache, so
/// it is only valid after a forward pass.
pub trait NeuralLayer<F: Float> {
    fn kind(&self) -> LayerKind;

    fn forward(&mut self, input: &Matrix<F>) -> Matrix<F>;

    fn backward(&mut self, grad_output: &Matrix<F>) -> Matrix<F>;

    /// Applies accumulated gradients using the layer's stored learning rate.
    /// No-op for layers without parameters.
    fn update_weights(&mut self);

    fn write_to(&self, out: &mut dyn Write) -> io::Result<()>;

    fn read_from(&mut self, input: &mut dyn Read) -> io::Result<()>;
}
