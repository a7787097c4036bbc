use burn::{
    module::{Module, Param},
    nn::{Linear, LinearConfig},
    tensor::{backend::Backend, Tensor},
};

use super::{
    distributions::{Categorical, DiagGaussian},
    spaces::Space,
    utils::modules::{Activation, MLP},
};

/// Output head of an actor-critic policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionHead {
    /// `n` discrete choices, one logit each
    Discrete(usize),
    /// continuous action vector of the given length
    Continuous(usize),
}

/// Actions an actor-critic policy can emit.
///
/// Internally every action is a float vector: a discrete action `i` is
/// stored as `[i as f32]`.
pub trait PolicyAction: Clone + Sized {
    fn head(space: &dyn Space<Self>) -> ActionHead;
    fn encode(&self) -> Vec<f32>;

    /// Turns a policy output back into a valid action for `space`
    fn decode(encoded: &[f32], space: &dyn Space<Self>) -> Self;
}

impl PolicyAction for usize {
    fn head(space: &dyn Space<Self>) -> ActionHead {
        ActionHead::Discrete(space.shape())
    }

    fn encode(&self) -> Vec<f32> {
        vec![*self as f32]
    }

    fn decode(encoded: &[f32], space: &dyn Space<Self>) -> Self {
        space.clip(encoded[0].round().max(0.0) as usize)
    }
}

impl PolicyAction for Vec<f32> {
    fn head(space: &dyn Space<Self>) -> ActionHead {
        ActionHead::Continuous(space.shape().len())
    }

    fn encode(&self) -> Vec<f32> {
        self.clone()
    }

    fn decode(encoded: &[f32], space: &dyn Space<Self>) -> Self {
        space.clip(encoded.to_vec())
    }
}

/// Action distribution produced by an [`ActorCriticPolicy`]
pub enum PolicyDistribution<B: Backend> {
    Gaussian(DiagGaussian<B>),
    Categorical(Categorical<B>),
}

impl<B: Backend> PolicyDistribution<B> {
    /// Encoded actions, `[batch, action_dim]`
    pub fn sample(&self) -> Tensor<B, 2> {
        match self {
            PolicyDistribution::Gaussian(d) => d.rsample(),
            PolicyDistribution::Categorical(d) => d.sample().float(),
        }
    }

    pub fn mode(&self) -> Tensor<B, 2> {
        match self {
            PolicyDistribution::Gaussian(d) => d.mode(),
            PolicyDistribution::Categorical(d) => d.mode().float(),
        }
    }

    /// `[batch, 1]`
    pub fn log_prob(&self, actions: Tensor<B, 2>) -> Tensor<B, 2> {
        match self {
            PolicyDistribution::Gaussian(d) => d.log_prob(actions),
            PolicyDistribution::Categorical(d) => d.log_prob(actions.int()),
        }
    }

    /// `[batch, 1]`
    pub fn entropy(&self) -> Tensor<B, 2> {
        match self {
            PolicyDistribution::Gaussian(d) => d.entropy(),
            PolicyDistribution::Categorical(d) => d.entropy(),
        }
    }
}

/// Shared actor-critic network for the on-policy algorithms.
///
/// Policy and value latents are separate tanh MLPs. Continuous heads
/// carry a state-independent `log_std`.
#[derive(Module, Debug)]
pub struct ActorCriticPolicy<B: Backend> {
    pi_net: MLP<B>,
    vf_net: MLP<B>,
    action_net: Linear<B>,
    value_net: Linear<B>,
    log_std: Option<Param<Tensor<B, 1>>>,
}

impl<B: Backend> ActorCriticPolicy<B> {
    pub fn new(
        obs_dim: usize,
        head: ActionHead,
        net_arch: &[usize],
        log_std_init: f32,
        device: &B::Device,
    ) -> Self {
        let mut sizes = vec![obs_dim];
        sizes.extend_from_slice(net_arch);
        let latent = *sizes.last().unwrap_or(&obs_dim);

        let (out, log_std) = match head {
            ActionHead::Discrete(n) => (n, None),
            ActionHead::Continuous(d) => (
                d,
                Some(Param::from_tensor(
                    Tensor::<B, 1>::ones([d], device).mul_scalar(log_std_init),
                )),
            ),
        };

        Self {
            pi_net: MLP::new(&sizes, device),
            vf_net: MLP::new(&sizes, device),
            action_net: LinearConfig::new(latent, out).init(device),
            value_net: LinearConfig::new(latent, 1).init(device),
            log_std,
        }
    }

    pub fn distribution(&self, obs: Tensor<B, 2>) -> PolicyDistribution<B> {
        let latent = self.pi_net.forward_latent(obs, Activation::Tanh);
        let out = self.action_net.forward(latent);

        match &self.log_std {
            Some(log_std) => {
                let [b, d] = out.dims();
                let log_std = log_std.val().unsqueeze::<2>().expand([b, d]);
                PolicyDistribution::Gaussian(DiagGaussian::new(out, log_std))
            }
            None => PolicyDistribution::Categorical(Categorical::new(out)),
        }
    }

    /// State values, `[batch, 1]`
    pub fn value(&self, obs: Tensor<B, 2>) -> Tensor<B, 2> {
        let latent = self.vf_net.forward_latent(obs, Activation::Tanh);

        self.value_net.forward(latent)
    }

    pub fn forward(&self, obs: Tensor<B, 2>) -> (PolicyDistribution<B>, Tensor<B, 2>) {
        (self.distribution(obs.clone()), self.value(obs))
    }

    /// Values, log probabilities and entropies of `actions`, each `[batch]`
    pub fn evaluate_actions(
        &self,
        obs: Tensor<B, 2>,
        actions: Tensor<B, 2>,
    ) -> (Tensor<B, 1>, Tensor<B, 1>, Tensor<B, 1>) {
        let (dist, values) = self.forward(obs);

        (
            values.squeeze(1),
            dist.log_prob(actions).squeeze(1),
            dist.entropy().squeeze(1),
        )
    }
}

#[cfg(test)]
mod test {
    use burn::{
        backend::NdArray,
        tensor::{Distribution, Tensor},
    };

    use crate::common::spaces::{BoxSpace, Discrete, Space};

    use super::{ActionHead, ActorCriticPolicy, PolicyAction};

    type B = NdArray;

    #[test]
    fn discrete_policy_shapes() {
        let policy = ActorCriticPolicy::<B>::new(4, ActionHead::Discrete(2), &[8, 8], 0.0, &Default::default());
        let obs = Tensor::<B, 2>::random([5, 4], Distribution::Normal(0.0, 1.0), &Default::default());

        let (dist, values) = policy.forward(obs.clone());
        assert_eq!(values.dims(), [5, 1]);

        let actions = dist.sample();
        assert_eq!(actions.dims(), [5, 1]);

        let (v, lp, ent) = policy.evaluate_actions(obs, actions);
        assert_eq!(v.dims(), [5]);
        assert_eq!(lp.dims(), [5]);
        assert_eq!(ent.dims(), [5]);
    }

    #[test]
    fn continuous_policy_shapes() {
        let policy =
            ActorCriticPolicy::<B>::new(3, ActionHead::Continuous(2), &[8], 0.0, &Default::default());
        let obs = Tensor::<B, 2>::random([5, 3], Distribution::Normal(0.0, 1.0), &Default::default());

        let dist = policy.distribution(obs);
        assert_eq!(dist.sample().dims(), [5, 2]);
        assert_eq!(dist.mode().dims(), [5, 2]);
        assert_eq!(dist.entropy().dims(), [5, 1]);
    }

    #[test]
    fn action_encoding() {
        let discrete = Discrete::from(3);
        assert_eq!(usize::head(&discrete), ActionHead::Discrete(3));
        assert_eq!(2usize.encode(), vec![2.0]);
        assert_eq!(usize::decode(&[1.2], &discrete), 1);
        assert_eq!(usize::decode(&[9.0], &discrete), 2);

        let boxed = BoxSpace::from((vec![-2.0], vec![2.0]));
        assert_eq!(<Vec<f32>>::head(&boxed), ActionHead::Continuous(1));
        assert_eq!(<Vec<f32>>::decode(&[3.0], &boxed), vec![2.0]);
        assert!(boxed.contains(&<Vec<f32>>::decode(&[-0.5], &boxed)));
    }
}
