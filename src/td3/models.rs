use burn::{
    module::Module,
    prelude::Backend,
    tensor::{activation::tanh, Tensor},
};

use crate::common::{agent::Policy, utils::modules::MLP};

/// Deterministic actor with a `tanh` output, actions in `[-1, 1]`
#[derive(Debug, Module)]
pub struct Actor<B: Backend> {
    mlp: MLP<B>,
}

impl<B: Backend> Actor<B> {
    pub fn new(obs_size: usize, n_actions: usize, net_arch: &[usize], device: &B::Device) -> Self {
        let mut sizes = vec![obs_size];
        sizes.extend_from_slice(net_arch);
        sizes.push(n_actions);

        Self {
            mlp: MLP::new(&sizes, device),
        }
    }

    pub fn forward(&self, obs: Tensor<B, 2>) -> Tensor<B, 2> {
        tanh(self.mlp.forward(obs))
    }
}

impl<B: Backend> Policy<B> for Actor<B> {
    fn update(&mut self, from: &Self, tau: Option<f32>) {
        self.mlp.update(&from.mlp, tau)
    }
}

#[cfg(test)]
mod test {
    use burn::{
        backend::NdArray,
        tensor::{Distribution, Tensor},
    };

    use crate::common::agent::Policy;

    use super::Actor;

    type B = NdArray;

    #[test]
    fn actor_is_bounded() {
        let actor = Actor::<B>::new(3, 1, &[8, 8], &Default::default());
        let obs = Tensor::<B, 2>::random([16, 3], Distribution::Normal(0.0, 10.0), &Default::default());

        let a = actor.forward(obs);
        assert_eq!(a.dims(), [16, 1]);
        assert!(a.abs().max().into_scalar() <= 1.0);
    }

    #[test]
    fn hard_copy_matches() {
        let a = Actor::<B>::new(3, 2, &[8], &Default::default());
        let mut b = Actor::<B>::new(3, 2, &[8], &Default::default());
        b.update(&a, None);

        let obs = Tensor::<B, 2>::ones([2, 3], &Default::default());
        let diff: f32 = (a.forward(obs.clone()) - b.forward(obs)).abs().sum().into_scalar();
        assert!(diff < 1e-6);
    }
}
