use burn::{
    module::Module,
    nn::{Linear, LinearConfig},
    tensor::{
        activation::{relu, tanh},
        backend::Backend,
        Tensor,
    },
};

use crate::common::agent::Policy;

use super::module_update::update_linear;

/// Nonlinearity used between the layers of an [MLP]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Relu,
    Tanh,
}

impl Activation {
    pub fn apply<B: Backend>(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        match self {
            Activation::Relu => relu(x),
            Activation::Tanh => tanh(x),
        }
    }
}

#[derive(Debug, Module)]
pub struct MLP<B: Backend> {
    layers: Vec<Linear<B>>,
}

impl<B: Backend> MLP<B> {
    pub fn new(sizes: &[usize], device: &B::Device) -> Self {
        assert!(sizes.len() >= 2, "an MLP needs an input and an output size");

        let layers = sizes
            .windows(2)
            .map(|w| LinearConfig::new(w[0], w[1]).init(device))
            .collect();

        Self { layers }
    }

    /// Hidden layers use ReLU, the output layer is linear.
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let n = self.layers.len();
        let mut x = x;

        for layer in &self.layers[..n - 1] {
            x = relu(layer.forward(x));
        }

        self.layers[n - 1].forward(x)
    }

    /// Every layer, including the last, is followed by `activation`.
    /// Used for feature extractors feeding separate heads.
    pub fn forward_latent(&self, x: Tensor<B, 2>, activation: Activation) -> Tensor<B, 2> {
        self.layers
            .iter()
            .fold(x, |x, layer| activation.apply(layer.forward(x)))
    }

    pub fn out_size(&self) -> usize {
        let [_, out] = self.layers[self.layers.len() - 1].weight.dims();
        out
    }
}

impl<B: Backend> Policy<B> for MLP<B> {
    fn update(&mut self, from: &Self, tau: Option<f32>) {
        for (to, from) in self.layers.iter_mut().zip(from.layers.iter()) {
            *to = update_linear(from, to.clone(), tau);
        }
    }
}
