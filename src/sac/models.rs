use burn::{
    module::Module,
    nn::{Linear, LinearConfig},
    prelude::Backend,
    tensor::Tensor,
};

use crate::common::{
    agent::Policy,
    distributions::SquashedDiagGaussian,
    utils::modules::{Activation, MLP},
};

const LOG_STD_MIN: f32 = -20.0;
const LOG_STD_MAX: f32 = 2.0;

/// Squashed gaussian actor. Actions are in `[-1, 1]`.
#[derive(Debug, Module)]
pub struct PiModel<B: Backend> {
    latent: MLP<B>,
    mu: Linear<B>,
    log_std: Linear<B>,
}

impl<B: Backend> PiModel<B> {
    pub fn new(obs_size: usize, n_actions: usize, net_arch: &[usize], device: &B::Device) -> Self {
        let mut sizes = vec![obs_size];
        sizes.extend_from_slice(net_arch);
        let latent_size = *sizes.last().unwrap_or(&obs_size);

        Self {
            latent: MLP::new(&sizes, device),
            mu: LinearConfig::new(latent_size, n_actions).init(device),
            log_std: LinearConfig::new(latent_size, n_actions).init(device),
        }
    }

    fn dist(&self, obs: Tensor<B, 2>) -> SquashedDiagGaussian<B> {
        let latent = self.latent.forward_latent(obs, Activation::Relu);
        let mu = self.mu.forward(latent.clone());
        let log_std = self
            .log_std
            .forward(latent)
            .clamp(LOG_STD_MIN, LOG_STD_MAX);

        SquashedDiagGaussian::new(mu, log_std)
    }

    pub fn act(&self, obs: Tensor<B, 2>, deterministic: bool) -> Tensor<B, 2> {
        let dist = self.dist(obs);

        if deterministic {
            dist.mode()
        } else {
            dist.rsample_with_log_prob().0
        }
    }

    /// Reparameterised actions with their log probabilities, `[batch, 1]`
    pub fn act_log_prob(&self, obs: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        self.dist(obs).rsample_with_log_prob()
    }
}

#[derive(Debug, Module)]
pub struct QModel<B: Backend> {
    mlp: MLP<B>,
}

impl<B: Backend> QModel<B> {
    pub fn new(obs_size: usize, n_actions: usize, net_arch: &[usize], device: &B::Device) -> Self {
        let mut sizes = vec![obs_size + n_actions];
        sizes.extend_from_slice(net_arch);
        sizes.push(1);

        Self {
            mlp: MLP::new(&sizes, device),
        }
    }

    pub fn q_from_actions(&self, obs: Tensor<B, 2>, actions: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = Tensor::cat(Vec::from([obs, actions]), 1);

        self.mlp.forward(x)
    }
}

impl<B: Backend> Policy<B> for QModel<B> {
    fn update(&mut self, from: &Self, tau: Option<f32>) {
        self.mlp.update(&from.mlp, tau)
    }
}

/// An ensemble of independently initialised critics
#[derive(Debug, Module)]
pub struct QModelSet<B: Backend> {
    qs: Vec<QModel<B>>,
}

impl<B: Backend> QModelSet<B> {
    pub fn new(
        obs_size: usize,
        n_actions: usize,
        net_arch: &[usize],
        device: &B::Device,
        n_critics: usize,
    ) -> Self {
        assert!(n_critics > 0, "need at least one critic");

        Self {
            qs: (0..n_critics)
                .map(|_| QModel::new(obs_size, n_actions, net_arch, device))
                .collect(),
        }
    }

    pub fn q_from_actions(&self, obs: Tensor<B, 2>, actions: Tensor<B, 2>) -> Vec<Tensor<B, 2>> {
        self.qs
            .iter()
            .map(|q| q.q_from_actions(obs.clone(), actions.clone()))
            .collect()
    }

    /// Elementwise minimum over the critics, `[batch, 1]`
    pub fn min_q(&self, obs: Tensor<B, 2>, actions: Tensor<B, 2>) -> Tensor<B, 2> {
        Tensor::cat(self.q_from_actions(obs, actions), 1).min_dim(1)
    }

    /// The first critic alone, `[batch, 1]`
    pub fn q1(&self, obs: Tensor<B, 2>, actions: Tensor<B, 2>) -> Tensor<B, 2> {
        self.qs[0].q_from_actions(obs, actions)
    }

    pub fn len(&self) -> usize {
        self.qs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qs.is_empty()
    }
}

impl<B: Backend> Policy<B> for QModelSet<B> {
    fn update(&mut self, from: &Self, tau: Option<f32>) {
        for (to, from) in self.qs.iter_mut().zip(from.qs.iter()) {
            to.update(from, tau);
        }
    }
}

#[cfg(test)]
mod test {
    use burn::{
        backend::NdArray,
        tensor::{Distribution, Tensor},
    };

    use super::{PiModel, QModelSet};

    type B = NdArray;

    #[test]
    fn pi_shapes_and_bounds() {
        let pi = PiModel::<B>::new(3, 2, &[16, 16], &Default::default());
        let obs = Tensor::<B, 2>::random([8, 3], Distribution::Normal(0.0, 5.0), &Default::default());

        let (a, lp) = pi.act_log_prob(obs.clone());
        assert_eq!(a.dims(), [8, 2]);
        assert_eq!(lp.dims(), [8, 1]);

        let greedy = pi.act(obs, true);
        let max: f32 = greedy.abs().max().into_scalar();
        assert!(max <= 1.0);
    }

    #[test]
    fn critic_ensemble() {
        let qs = QModelSet::<B>::new(3, 2, &[16], &Default::default(), 2);
        let obs = Tensor::<B, 2>::zeros([4, 3], &Default::default());
        let act = Tensor::<B, 2>::zeros([4, 2], &Default::default());

        assert_eq!(qs.len(), 2);
        assert_eq!(qs.q_from_actions(obs.clone(), act.clone()).len(), 2);
        assert_eq!(qs.min_q(obs.clone(), act.clone()).dims(), [4, 1]);
        assert_eq!(qs.q1(obs, act).dims(), [4, 1]);
    }
}
