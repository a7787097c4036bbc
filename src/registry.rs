use std::{fmt, path::Path, str::FromStr};

use burn::{
    grad_clipping::GradientClippingConfig,
    optim::{AdamConfig, RmsPropConfig},
    tensor::backend::AutodiffBackend,
};

use crate::{
    a2c::{A2CAgent, A2CConfig},
    common::{
        algorithm::{Algorithm, OffPolicyAlgorithm, OfflineAlgParams},
        logger::{next_run_dir, CsvLogger, Logger},
        on_policy::{OnPolicyAlgorithm, OnPolicyParams},
        policies::{ActorCriticPolicy, PolicyAction},
        spaces::{BoxSpace, Discrete, Space},
    },
    dqn::{module::QNetwork, DQNAgent, DQNConfig},
    env::base::Env,
    error::{Error, Result},
    ppo::{PPOAgent, PPOConfig},
    sac::{
        models::{PiModel, QModelSet},
        SACAgent, SACConfig,
    },
    td3::{models::Actor, TD3Agent, TD3Config},
};

pub type ContinuousModel = Box<dyn Algorithm<Vec<f32>, Vec<f32>>>;
pub type DiscreteModel = Box<dyn Algorithm<Vec<f32>, usize>>;

/// The closed set of algorithms the runner can build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmId {
    A2C,
    DDPG,
    DQN,
    PPO,
    SAC,
    TD3,
}

impl AlgorithmId {
    pub const ALL: [AlgorithmId; 6] = [
        AlgorithmId::A2C,
        AlgorithmId::DDPG,
        AlgorithmId::DQN,
        AlgorithmId::PPO,
        AlgorithmId::SAC,
        AlgorithmId::TD3,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmId::A2C => "A2C",
            AlgorithmId::DDPG => "DDPG",
            AlgorithmId::DQN => "DQN",
            AlgorithmId::PPO => "PPO",
            AlgorithmId::SAC => "SAC",
            AlgorithmId::TD3 => "TD3",
        }
    }

    pub fn supports_continuous(&self) -> bool {
        !matches!(self, AlgorithmId::DQN)
    }

    pub fn supports_discrete(&self) -> bool {
        matches!(self, AlgorithmId::DQN | AlgorithmId::PPO | AlgorithmId::A2C)
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlgorithmId {
    type Err = Error;

    /// Names are matched exactly, `ppo` is not `PPO`
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|id| id.name() == s)
            .ok_or_else(|| Error::UnknownAlgorithm(s.to_string()))
    }
}

/// A CSV logger in the next free `{log_dir}/{ALGO}_{n}` run directory
pub fn run_logger(log_dir: &Path, algo: AlgorithmId) -> Result<Box<dyn Logger>> {
    let run_dir = next_run_dir(log_dir, algo.name());
    let logger = CsvLogger::new(run_dir.join("progress.csv"), false, true);
    logger.check_can_log(true)?;

    tracing::info!("logging {algo} training to {}", run_dir.display());

    Ok(Box::new(logger))
}

fn box_space(space: &dyn Space<Vec<f32>>, what: &str) -> Result<BoxSpace<Vec<f32>>> {
    space
        .bounds()
        .map(BoxSpace::from)
        .ok_or_else(|| Error::Config(format!("{what} space must be bounded")))
}

fn build_on_policy<B, A>(
    algo: AlgorithmId,
    obs_dim: usize,
    action_space: Box<dyn Space<A>>,
    logger: Box<dyn Logger>,
    seed: Option<u64>,
    device: &B::Device,
) -> Result<Box<dyn Algorithm<Vec<f32>, A>>>
where
    B: AutodiffBackend,
    A: PolicyAction + 'static,
{
    let head = A::head(&*action_space);

    match algo {
        AlgorithmId::PPO => {
            let config = PPOConfig::new();
            let params = OnPolicyParams::new().with_seed(seed);
            let policy = ActorCriticPolicy::new(
                obs_dim,
                head,
                &config.net_arch,
                config.log_std_init,
                device,
            );
            let optim = AdamConfig::new()
                .with_epsilon(1e-5)
                .with_grad_clipping(Some(GradientClippingConfig::Norm(config.max_grad_norm)))
                .init();

            Ok(Box::new(OnPolicyAlgorithm::<B, _, A>::new(
                params,
                PPOAgent::<_, B>::new(policy, optim, config),
                action_space,
                logger,
                device.clone(),
            )))
        }
        AlgorithmId::A2C => {
            let config = A2CConfig::new();
            let params = OnPolicyParams::new()
                .with_n_steps(5)
                .with_gae_lambda(1.0)
                .with_seed(seed);
            let policy = ActorCriticPolicy::new(
                obs_dim,
                head,
                &config.net_arch,
                config.log_std_init,
                device,
            );
            let optim = RmsPropConfig::new()
                .with_alpha(0.99)
                .with_epsilon(1e-5)
                .with_grad_clipping(Some(GradientClippingConfig::Norm(config.max_grad_norm)))
                .init();

            Ok(Box::new(OnPolicyAlgorithm::<B, _, A>::new(
                params,
                A2CAgent::<_, B>::new(policy, optim, config),
                action_space,
                logger,
                device.clone(),
            )))
        }
        _ => Err(Error::Config(format!("{algo} is not an on-policy algorithm"))),
    }
}

fn build_td3<B: AutodiffBackend>(
    config: TD3Config,
    observation_space: BoxSpace<Vec<f32>>,
    action_space: BoxSpace<Vec<f32>>,
    logger: Box<dyn Logger>,
    seed: Option<u64>,
    device: &B::Device,
) -> ContinuousModel {
    let params = OfflineAlgParams::new().with_lr(1e-3).with_seed(seed);

    let actor = Actor::<B>::new(
        observation_space.len(),
        action_space.len(),
        &config.net_arch,
        device,
    );
    let critics = QModelSet::<B>::new(
        observation_space.len(),
        action_space.len(),
        &config.net_arch,
        device,
        config.n_critics,
    );

    let agent = TD3Agent::new(
        actor,
        critics,
        AdamConfig::new().init(),
        AdamConfig::new().init(),
        config,
        observation_space,
        action_space,
    );

    Box::new(OffPolicyAlgorithm::<B, _, Vec<f32>, Vec<f32>>::new(
        params,
        agent,
        logger,
        device.clone(),
    ))
}

/// Builds a fresh model for an environment with continuous actions
pub fn build_continuous<B: AutodiffBackend>(
    algo: AlgorithmId,
    env: &dyn Env<Vec<f32>, Vec<f32>>,
    logger: Box<dyn Logger>,
    seed: Option<u64>,
    device: &B::Device,
) -> Result<ContinuousModel> {
    let observation_space = box_space(&*env.observation_space(), "observation")?;
    let action_space = box_space(&*env.action_space(), "action")?;

    tracing::debug!(
        "building {algo}: {} observations, {} actions",
        observation_space.len(),
        action_space.len()
    );

    let model: ContinuousModel = match algo {
        AlgorithmId::SAC => {
            let config = SACConfig::new();
            let params = OfflineAlgParams::new().with_seed(seed);

            let pi = PiModel::<B>::new(
                observation_space.len(),
                action_space.len(),
                &config.net_arch,
                device,
            );
            let qs = QModelSet::<B>::new(
                observation_space.len(),
                action_space.len(),
                &config.net_arch,
                device,
                config.n_critics,
            );
            let ent_optim = config.train_ent_coef.then(|| AdamConfig::new().init());

            let agent = SACAgent::new(
                pi,
                qs,
                AdamConfig::new().init(),
                AdamConfig::new().init(),
                ent_optim,
                config,
                observation_space,
                action_space,
                device,
            );

            Box::new(OffPolicyAlgorithm::<B, _, Vec<f32>, Vec<f32>>::new(
                params,
                agent,
                logger,
                device.clone(),
            ))
        }
        AlgorithmId::TD3 => build_td3::<B>(
            TD3Config::new(),
            observation_space,
            action_space,
            logger,
            seed,
            device,
        ),
        AlgorithmId::DDPG => build_td3::<B>(
            TD3Config::ddpg(),
            observation_space,
            action_space,
            logger,
            seed,
            device,
        ),
        AlgorithmId::PPO | AlgorithmId::A2C => build_on_policy::<B, Vec<f32>>(
            algo,
            observation_space.len(),
            Box::new(action_space),
            logger,
            seed,
            device,
        )?,
        AlgorithmId::DQN => {
            return Err(Error::UnsupportedActionSpace {
                algo,
                space: "continuous",
            })
        }
    };

    Ok(model)
}

/// Builds a fresh model for an environment with discrete actions
pub fn build_discrete<B: AutodiffBackend>(
    algo: AlgorithmId,
    env: &dyn Env<Vec<f32>, usize>,
    logger: Box<dyn Logger>,
    seed: Option<u64>,
    device: &B::Device,
) -> Result<DiscreteModel> {
    let observation_space = box_space(&*env.observation_space(), "observation")?;
    let action_space = Discrete::from(env.action_space().shape());

    tracing::debug!(
        "building {algo}: {} observations, {} actions",
        observation_space.len(),
        action_space.shape()
    );

    match algo {
        AlgorithmId::DQN => {
            let config = DQNConfig::new();
            let params = OfflineAlgParams::new()
                .with_lr(1e-4)
                .with_batch_size(32)
                .with_train_every(4)
                .with_seed(seed);

            let q = QNetwork::<B>::new(
                observation_space.len(),
                action_space.shape(),
                &config.net_arch,
                device,
            );
            let optim = AdamConfig::new()
                .with_grad_clipping(Some(GradientClippingConfig::Norm(config.max_grad_norm)))
                .init();
            let agent = DQNAgent::new(q, optim, config, observation_space, action_space);

            Ok(Box::new(OffPolicyAlgorithm::<B, _, Vec<f32>, usize>::new(
                params,
                agent,
                logger,
                device.clone(),
            )))
        }
        AlgorithmId::SAC | AlgorithmId::TD3 | AlgorithmId::DDPG => {
            Err(Error::UnsupportedActionSpace {
                algo,
                space: "discrete",
            })
        }
        AlgorithmId::PPO | AlgorithmId::A2C => build_on_policy::<B, usize>(
            algo,
            observation_space.len(),
            Box::new(action_space),
            logger,
            seed,
            device,
        ),
    }
}

#[cfg(test)]
mod test {
    use burn::backend::{Autodiff, NdArray};
    use tempfile::TempDir;

    use crate::{
        common::{algorithm::Algorithm, checkpoint::checkpoint_stem, logger::NullLogger},
        env::{
            base::RenderMode,
            classic_control::{cartpole::make_cartpole, pendulum::make_pendulum},
        },
        error::Error,
    };

    use super::{build_continuous, build_discrete, run_logger, AlgorithmId};

    type B = Autodiff<NdArray>;

    #[test]
    fn names_round_trip() {
        for id in AlgorithmId::ALL {
            assert_eq!(id.name().parse::<AlgorithmId>().unwrap(), id);
            assert_eq!(id.to_string(), id.name());
        }
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert!(matches!(
            "ppo".parse::<AlgorithmId>(),
            Err(Error::UnknownAlgorithm(name)) if name == "ppo"
        ));
        assert!("TRPO".parse::<AlgorithmId>().is_err());
    }

    #[test]
    fn every_algorithm_has_a_home() {
        for id in AlgorithmId::ALL {
            assert!(id.supports_continuous() || id.supports_discrete());
        }
    }

    #[test]
    fn builds_continuous_models() {
        let env = make_pendulum(None, RenderMode::None);

        for id in AlgorithmId::ALL.into_iter().filter(|id| id.supports_continuous()) {
            let model =
                build_continuous::<B>(id, &*env, Box::new(NullLogger), Some(0), &Default::default())
                    .unwrap();
            assert_eq!(model.num_timesteps(), 0);
        }
    }

    #[test]
    fn builds_discrete_models() {
        let env = make_cartpole(500, RenderMode::None);

        for id in AlgorithmId::ALL.into_iter().filter(|id| id.supports_discrete()) {
            build_discrete::<B>(id, &*env, Box::new(NullLogger), None, &Default::default()).unwrap();
        }
    }

    #[test]
    fn rejects_incompatible_action_spaces() {
        let pendulum = make_pendulum(None, RenderMode::None);
        let err = build_continuous::<B>(
            AlgorithmId::DQN,
            &*pendulum,
            Box::new(NullLogger),
            None,
            &Default::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(
            err,
            Error::UnsupportedActionSpace { algo: AlgorithmId::DQN, space: "continuous" }
        ));

        let cartpole = make_cartpole(500, RenderMode::None);
        let err = build_discrete::<B>(
            AlgorithmId::SAC,
            &*cartpole,
            Box::new(NullLogger),
            None,
            &Default::default(),
        )
        .err()
        .unwrap();
        assert_eq!(err.to_string(), "SAC does not support discrete action spaces");
    }

    #[test]
    fn continuous_checkpoints_load_into_fresh_models() {
        let dir = TempDir::new().unwrap();
        let mut env = make_pendulum(None, RenderMode::None);

        for id in [AlgorithmId::SAC, AlgorithmId::TD3, AlgorithmId::DDPG] {
            let mut model =
                build_continuous::<B>(id, &*env, Box::new(NullLogger), Some(1), &Default::default())
                    .unwrap();
            model.learn(&mut *env, 5, false).unwrap();

            let path = model
                .save(&checkpoint_stem(dir.path(), id.name(), model.num_timesteps()))
                .unwrap();
            assert!(path.ends_with(format!("{id}_5.mpk")));

            let mut fresh =
                build_continuous::<B>(id, &*env, Box::new(NullLogger), None, &Default::default())
                    .unwrap();
            fresh.load(&path).unwrap();

            let obs = env.reset(Some(3), None);
            assert_eq!(model.predict(&obs, true), fresh.predict(&obs, true));
        }
    }

    #[test]
    fn run_logger_creates_numbered_dirs() {
        let dir = TempDir::new().unwrap();

        run_logger(dir.path(), AlgorithmId::PPO).unwrap();
        assert!(dir.path().join("PPO_1").is_dir());

        run_logger(dir.path(), AlgorithmId::PPO).unwrap();
        assert!(dir.path().join("PPO_2").is_dir());
    }
}
