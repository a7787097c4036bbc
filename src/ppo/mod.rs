use std::path::{Path, PathBuf};

use burn::{
    config::Config,
    nn::loss::{MseLoss, Reduction},
    optim::{adaptor::OptimizerAdaptor, GradientsParams, Optimizer, SimpleOptimizer},
    tensor::{backend::AutodiffBackend, backend::Backend, ElementConversion, Tensor},
};

use crate::{
    common::{
        checkpoint::{load_checkpoint, save_checkpoint, OptimizerRecord},
        logger::{LogData, LogItem},
        on_policy::OnPolicyAgent,
        policies::ActorCriticPolicy,
        rollout::RolloutBuffer,
        utils::mean,
    },
    error,
};

#[derive(Config)]
pub struct PPOConfig {
    #[config(default = 3e-4)]
    pub lr: f64,
    #[config(default = 64)]
    pub batch_size: usize,
    /// Passes over each rollout
    #[config(default = 10)]
    pub n_epochs: usize,
    #[config(default = 0.2)]
    pub clip_range: f32,
    #[config(default = 0.0)]
    pub ent_coef: f32,
    #[config(default = 0.5)]
    pub vf_coef: f32,
    #[config(default = 0.5)]
    pub max_grad_norm: f32,
    #[config(default = true)]
    pub normalize_advantage: bool,
    #[config(default = "vec![64, 64]")]
    pub net_arch: Vec<usize>,
    #[config(default = 0.0)]
    pub log_std_init: f32,
}

/// Elementwise minimum of two same-shape tensors
fn min_pair<B: Backend>(a: Tensor<B, 1>, b: Tensor<B, 1>) -> Tensor<B, 1> {
    let gap = (a.clone() - b.clone()).abs();
    (a + b - gap).div_scalar(2.0)
}

/// Zero mean, unit (sample) standard deviation
pub(crate) fn normalize<B: Backend>(x: Tensor<B, 1>) -> Tensor<B, 1> {
    let std = x.clone().var(0).sqrt().add_scalar(1e-8);
    let mean = x.clone().mean();

    (x - mean) / std
}

pub struct PPOAgent<O: SimpleOptimizer<B::InnerBackend>, B: AutodiffBackend> {
    policy: ActorCriticPolicy<B>,
    optim: OptimizerAdaptor<O, ActorCriticPolicy<B>, B>,
    config: PPOConfig,
    n_updates: usize,
}

impl<O: SimpleOptimizer<B::InnerBackend>, B: AutodiffBackend> PPOAgent<O, B> {
    pub fn new(
        policy: ActorCriticPolicy<B>,
        optim: OptimizerAdaptor<O, ActorCriticPolicy<B>, B>,
        config: PPOConfig,
    ) -> Self {
        Self {
            policy,
            optim,
            config,
            n_updates: 0,
        }
    }
}

impl<O: SimpleOptimizer<B::InnerBackend>, B: AutodiffBackend> OnPolicyAgent<B> for PPOAgent<O, B> {
    fn policy(&self) -> &ActorCriticPolicy<B> {
        &self.policy
    }

    fn train(&mut self, buffer: &RolloutBuffer, device: &B::Device) -> LogItem {
        let clip = self.config.clip_range;

        let mut pg_losses = Vec::new();
        let mut value_losses = Vec::new();
        let mut entropy_losses = Vec::new();
        let mut clip_fractions = Vec::new();
        let mut approx_kls = Vec::new();
        let mut last_loss = 0.0;

        for _ in 0..self.config.n_epochs {
            for indices in buffer.minibatch_indices(Some(self.config.batch_size)) {
                let batch = buffer.batch::<B>(&indices, device);

                let (values, log_prob, entropy) = self
                    .policy
                    .evaluate_actions(batch.observations, batch.actions);

                let mut advantages = batch.advantages;
                if self.config.normalize_advantage && indices.len() > 1 {
                    advantages = normalize(advantages);
                }

                let log_ratio = log_prob - batch.old_log_probs;
                let ratio = log_ratio.clone().exp();

                // clipped surrogate objective
                let surrogate = advantages.clone() * ratio.clone();
                let clipped = advantages * ratio.clone().clamp(1.0 - clip, 1.0 + clip);
                let policy_loss = min_pair(surrogate, clipped).mean().neg();

                let value_loss = MseLoss::new().forward(values, batch.returns, Reduction::Mean);
                let entropy_loss = entropy.mean().neg();

                let loss = policy_loss.clone()
                    + entropy_loss.clone().mul_scalar(self.config.ent_coef)
                    + value_loss.clone().mul_scalar(self.config.vf_coef);

                let ratio = ratio.detach();
                let clip_fraction = ratio
                    .clone()
                    .sub_scalar(1.0)
                    .abs()
                    .greater_elem(clip)
                    .float()
                    .mean();
                let approx_kl = (ratio.sub_scalar(1.0) - log_ratio.detach()).mean();

                pg_losses.push(policy_loss.into_scalar().elem::<f32>());
                value_losses.push(value_loss.into_scalar().elem::<f32>());
                entropy_losses.push(entropy_loss.into_scalar().elem::<f32>());
                clip_fractions.push(clip_fraction.into_scalar().elem::<f32>());
                approx_kls.push(approx_kl.into_scalar().elem::<f32>());
                last_loss = loss.clone().into_scalar().elem::<f32>();

                let grads = GradientsParams::from_grads(loss.backward(), &self.policy);
                self.policy = self.optim.step(self.config.lr, self.policy.clone(), grads);
                self.n_updates += 1;
            }
        }

        LogItem::default()
            .push("policy_loss".to_string(), LogData::Float(mean(&pg_losses)))
            .push("value_loss".to_string(), LogData::Float(mean(&value_losses)))
            .push("entropy_loss".to_string(), LogData::Float(mean(&entropy_losses)))
            .push("clip_fraction".to_string(), LogData::Float(mean(&clip_fractions)))
            .push("approx_kl".to_string(), LogData::Float(mean(&approx_kls)))
            .push("loss".to_string(), LogData::Float(last_loss))
            .push("n_updates".to_string(), LogData::Int(self.n_updates as i32))
    }

    fn save(&self, path: &Path) -> error::Result<PathBuf> {
        save_checkpoint::<B, _, _>(self.policy.clone(), self.optim.to_record(), path)
    }

    fn load(&mut self, path: &Path, device: &B::Device) -> error::Result<()> {
        let (policy, optim): (ActorCriticPolicy<B>, OptimizerRecord<O, B>) =
            load_checkpoint(self.policy.clone(), path, device)?;
        self.policy = policy;
        self.optim = self.optim.clone().load_record(optim);

        Ok(())
    }
}
