use burn::tensor::{
    activation::{log_softmax, softmax},
    backend::Backend,
    Distribution, Int, Tensor,
};

/// Categorical distribution over `[batch, n]` unnormalised logits
#[derive(Debug, Clone)]
pub struct Categorical<B: Backend> {
    logits: Tensor<B, 2>,
}

impl<B: Backend> Categorical<B> {
    pub fn new(logits: Tensor<B, 2>) -> Self {
        Self { logits }
    }

    pub fn probs(&self) -> Tensor<B, 2> {
        softmax(self.logits.clone(), 1)
    }

    pub fn log_probs(&self) -> Tensor<B, 2> {
        log_softmax(self.logits.clone(), 1)
    }

    /// Most likely class per row, `[batch, 1]`
    pub fn mode(&self) -> Tensor<B, 2, Int> {
        self.logits.clone().argmax(1)
    }

    /// Gumbel-max sample per row, `[batch, 1]`
    pub fn sample(&self) -> Tensor<B, 2, Int> {
        let u = Tensor::random_like(&self.logits, Distribution::Uniform(1e-10, 1.0));
        let gumbel = u.log().neg().log().neg();

        (self.logits.clone().detach() + gumbel).argmax(1)
    }

    /// `[batch, 1]` log probabilities of `actions` (`[batch, 1]`)
    pub fn log_prob(&self, actions: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        self.log_probs().gather(1, actions)
    }

    pub fn entropy(&self) -> Tensor<B, 2> {
        (self.probs() * self.log_probs()).sum_dim(1).neg()
    }
}
