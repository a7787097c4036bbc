use std::path::{Path, PathBuf};

use burn::{
    config::Config,
    nn::loss::{MseLoss, Reduction},
    optim::{adaptor::OptimizerAdaptor, GradientsParams, Optimizer, SimpleOptimizer},
    tensor::{backend::AutodiffBackend, ElementConversion},
};

use crate::{
    common::{
        checkpoint::{load_checkpoint, save_checkpoint, OptimizerRecord},
        logger::{LogData, LogItem},
        on_policy::OnPolicyAgent,
        policies::ActorCriticPolicy,
        rollout::RolloutBuffer,
    },
    error,
    ppo::normalize,
};

#[derive(Config)]
pub struct A2CConfig {
    #[config(default = 7e-4)]
    pub lr: f64,
    #[config(default = 0.0)]
    pub ent_coef: f32,
    #[config(default = 0.5)]
    pub vf_coef: f32,
    #[config(default = 0.5)]
    pub max_grad_norm: f32,
    #[config(default = false)]
    pub normalize_advantage: bool,
    #[config(default = "vec![64, 64]")]
    pub net_arch: Vec<usize>,
    #[config(default = 0.0)]
    pub log_std_init: f32,
}

/// Advantage actor-critic: one gradient step per rollout, on the whole rollout
pub struct A2CAgent<O: SimpleOptimizer<B::InnerBackend>, B: AutodiffBackend> {
    policy: ActorCriticPolicy<B>,
    optim: OptimizerAdaptor<O, ActorCriticPolicy<B>, B>,
    config: A2CConfig,
    n_updates: usize,
}

impl<O: SimpleOptimizer<B::InnerBackend>, B: AutodiffBackend> A2CAgent<O, B> {
    pub fn new(
        policy: ActorCriticPolicy<B>,
        optim: OptimizerAdaptor<O, ActorCriticPolicy<B>, B>,
        config: A2CConfig,
    ) -> Self {
        Self {
            policy,
            optim,
            config,
            n_updates: 0,
        }
    }
}

impl<O: SimpleOptimizer<B::InnerBackend>, B: AutodiffBackend> OnPolicyAgent<B> for A2CAgent<O, B> {
    fn policy(&self) -> &ActorCriticPolicy<B> {
        &self.policy
    }

    fn train(&mut self, buffer: &RolloutBuffer, device: &B::Device) -> LogItem {
        let mut log = LogItem::default();

        for indices in buffer.minibatch_indices(None) {
            let batch = buffer.batch::<B>(&indices, device);

            let (values, log_prob, entropy) = self
                .policy
                .evaluate_actions(batch.observations, batch.actions);

            let mut advantages = batch.advantages;
            if self.config.normalize_advantage && indices.len() > 1 {
                advantages = normalize(advantages);
            }

            let policy_loss = (advantages * log_prob).mean().neg();
            let value_loss = MseLoss::new().forward(values, batch.returns, Reduction::Mean);
            let entropy_loss = entropy.mean().neg();

            let loss = policy_loss.clone()
                + entropy_loss.clone().mul_scalar(self.config.ent_coef)
                + value_loss.clone().mul_scalar(self.config.vf_coef);

            log = log
                .push(
                    "policy_loss".to_string(),
                    LogData::Float(policy_loss.into_scalar().elem()),
                )
                .push(
                    "value_loss".to_string(),
                    LogData::Float(value_loss.into_scalar().elem()),
                )
                .push(
                    "entropy_loss".to_string(),
                    LogData::Float(entropy_loss.into_scalar().elem()),
                );

            let grads = GradientsParams::from_grads(loss.backward(), &self.policy);
            self.policy = self.optim.step(self.config.lr, self.policy.clone(), grads);
            self.n_updates += 1;
        }

        log.push("n_updates".to_string(), LogData::Int(self.n_updates as i32))
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

#[cfg(test)]
mod test {
    use burn::{
        backend::{Autodiff, NdArray},
        optim::{RmsPropConfig, SimpleOptimizer},
    };
    use tempfile::TempDir;

    use crate::{
        common::{
            algorithm::Algorithm,
            logger::{CsvLogger, LogData},
            on_policy::{OnPolicyAgent, OnPolicyAlgorithm, OnPolicyParams},
            policies::{ActionHead, ActorCriticPolicy},
            rollout::RolloutBuffer,
            spaces::{BoxSpace, Space},
        },
        env::{base::RenderMode, classic_control::pendulum::make_pendulum},
    };

    use super::{A2CAgent, A2CConfig};

    type B = Autodiff<NdArray>;

    fn agent() -> A2CAgent<impl SimpleOptimizer<NdArray>, B> {
        let config = A2CConfig::new().with_net_arch(vec![8]);
        let policy = ActorCriticPolicy::new(
            3,
            ActionHead::Continuous(1),
            &config.net_arch,
            config.log_std_init,
            &Default::default(),
        );
        let optim = RmsPropConfig::new()
            .with_alpha(0.99)
            .with_epsilon(1e-5)
            .init();

        A2CAgent::new(policy, optim, config)
    }

    #[test]
    fn one_update_per_rollout() {
        let mut agent = agent();
        let mut buffer = RolloutBuffer::new(5, 0.99, 1.0);
        for i in 0..5 {
            buffer.add(vec![i as f32, 0.0, 1.0], vec![0.1], 1.0, i == 0, 0.0, -1.0);
        }
        buffer.compute_returns_and_advantage(0.0, false);

        let log = agent.train(&buffer, &Default::default());
        assert_eq!(log.get("n_updates"), Some(&LogData::Int(1)));
        assert!(log.get("value_loss").is_some());
    }

    #[test]
    fn test_a2c_lightweight() {
        let dir = TempDir::new().unwrap();
        let params = OnPolicyParams::new().with_n_steps(5).with_gae_lambda(1.0);
        let logger = CsvLogger::new(dir.path().join("progress.csv"), false, false);
        let action_space = BoxSpace::from((vec![-2.0], vec![2.0]));

        let mut alg: OnPolicyAlgorithm<B, _, Vec<f32>> = OnPolicyAlgorithm::new(
            params,
            agent(),
            Box::new(action_space.clone()),
            Box::new(logger),
            Default::default(),
        );
        let mut env = make_pendulum(None, RenderMode::None);

        alg.learn(&mut *env, 25, true).unwrap();
        assert_eq!(alg.num_timesteps(), 25);
        assert_eq!(alg.iterations(), 5);

        let obs = env.reset(Some(1), None);
        assert!(action_space.contains(&alg.predict(&obs, false)));
    }

    #[test]
    fn unwritable_log_fails_learn() {
        let dir = TempDir::new().unwrap();
        let params = OnPolicyParams::new().with_n_steps(5);
        let logger = CsvLogger::new(dir.path().join("missing/progress.csv"), false, true);

        let mut alg: OnPolicyAlgorithm<B, _, Vec<f32>> = OnPolicyAlgorithm::new(
            params,
            agent(),
            Box::new(BoxSpace::from((vec![-2.0], vec![2.0]))),
            Box::new(logger),
            Default::default(),
        );
        let mut env = make_pendulum(None, RenderMode::None);

        assert!(alg.learn(&mut *env, 5, true).is_err());
    }
}
