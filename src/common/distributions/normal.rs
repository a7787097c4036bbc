use std::f32::consts::PI;

use burn::tensor::{activation::tanh, backend::Backend, Distribution, Tensor};

/// A diagonal gaussian over a batch of action vectors.
///
/// `mean` and `log_std` are both `[batch, action_dim]`. Samples are
/// reparameterised, so gradients flow back into both parameters.
#[derive(Debug, Clone)]
pub struct DiagGaussian<B: Backend> {
    mean: Tensor<B, 2>,
    log_std: Tensor<B, 2>,
}

impl<B: Backend> DiagGaussian<B> {
    pub fn new(mean: Tensor<B, 2>, log_std: Tensor<B, 2>) -> Self {
        assert_eq!(mean.dims(), log_std.dims());

        Self { mean, log_std }
    }

    pub fn mean(&self) -> Tensor<B, 2> {
        self.mean.clone()
    }

    pub fn mode(&self) -> Tensor<B, 2> {
        self.mean.clone()
    }

    pub fn stdev(&self) -> Tensor<B, 2> {
        self.log_std.clone().exp()
    }

    pub fn rsample(&self) -> Tensor<B, 2> {
        let eps = Tensor::random_like(&self.mean, Distribution::Normal(0.0, 1.0));

        self.mean.clone() + eps * self.stdev()
    }

    /// Joint log probability of each row, `[batch, 1]`
    pub fn log_prob(&self, value: Tensor<B, 2>) -> Tensor<B, 2> {
        let var = self.stdev().powf_scalar(2.0);
        let sq = (value - self.mean.clone()).powf_scalar(2.0);

        (sq.div(var.mul_scalar(2.0)).neg() - self.log_std.clone())
            .sub_scalar(0.5 * (2.0 * PI).ln())
            .sum_dim(1)
    }

    /// Joint entropy of each row, `[batch, 1]`
    pub fn entropy(&self) -> Tensor<B, 2> {
        self.log_std
            .clone()
            .add_scalar(0.5 + 0.5 * (2.0 * PI).ln())
            .sum_dim(1)
    }
}

/// A diagonal gaussian pushed through `tanh`, bounding samples to `(-1, 1)`.
#[derive(Debug, Clone)]
pub struct SquashedDiagGaussian<B: Backend> {
    gaussian: DiagGaussian<B>,
}

impl<B: Backend> SquashedDiagGaussian<B> {
    const EPS: f32 = 1e-6;

    pub fn new(mean: Tensor<B, 2>, log_std: Tensor<B, 2>) -> Self {
        Self {
            gaussian: DiagGaussian::new(mean, log_std),
        }
    }

    pub fn mode(&self) -> Tensor<B, 2> {
        tanh(self.gaussian.mode())
    }

    /// Reparameterised sample and its log probability, `([batch, dim], [batch, 1])`
    pub fn rsample_with_log_prob(&self) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let u = self.gaussian.rsample();
        let action = tanh(u.clone());

        let correction = action
            .clone()
            .powf_scalar(2.0)
            .neg()
            .add_scalar(1.0 + Self::EPS)
            .log()
            .sum_dim(1);

        (action, self.gaussian.log_prob(u) - correction)
    }
}
