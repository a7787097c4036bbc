use std::path::{Path, PathBuf};

use burn::{config::Config, tensor::backend::AutodiffBackend};
use indicatif::ProgressBar;

use crate::{env::base::Env, error};

use super::{
    algorithm::{progress_bar, Algorithm, EpisodeTracker},
    logger::{LogData, LogItem, Logger},
    policies::{ActorCriticPolicy, PolicyAction},
    rollout::RolloutBuffer,
    spaces::Space,
    to_tensor::{to_vec_f32, ToTensorF},
    utils::explained_variance,
};

#[derive(Config)]
pub struct OnPolicyParams {
    /// Environment steps per rollout
    #[config(default = 2048)]
    pub n_steps: usize,
    #[config(default = 0.99)]
    pub gamma: f32,
    #[config(default = 0.95)]
    pub gae_lambda: f32,
    pub seed: Option<u64>,
}

/// An agent trained from complete rollouts
pub trait OnPolicyAgent<B: AutodiffBackend> {
    fn policy(&self) -> &ActorCriticPolicy<B>;

    /// Updates the policy from a full rollout buffer
    fn train(&mut self, buffer: &RolloutBuffer, device: &B::Device) -> LogItem;

    fn save(&self, path: &Path) -> error::Result<PathBuf>;

    fn load(&mut self, path: &Path, device: &B::Device) -> error::Result<()>;
}

/// Collect-then-train loop shared by the on-policy algorithms
pub struct OnPolicyAlgorithm<B: AutodiffBackend, Ag: OnPolicyAgent<B>, A: PolicyAction> {
    pub params: OnPolicyParams,
    action_space: Box<dyn Space<A>>,
    pub agent: Ag,
    pub buffer: RolloutBuffer,
    pub logger: Box<dyn Logger>,
    device: B::Device,
    num_timesteps: usize,
    iterations: usize,
    last_obs: Option<Vec<f32>>,
    last_episode_start: bool,
    episode: EpisodeTracker,
}

impl<B: AutodiffBackend, Ag: OnPolicyAgent<B>, A: PolicyAction> OnPolicyAlgorithm<B, Ag, A> {
    pub fn new(
        params: OnPolicyParams,
        agent: Ag,
        action_space: Box<dyn Space<A>>,
        logger: Box<dyn Logger>,
        device: B::Device,
    ) -> Self {
        let buffer = RolloutBuffer::new(params.n_steps, params.gamma, params.gae_lambda);

        Self {
            params,
            action_space,
            agent,
            buffer,
            logger,
            device,
            num_timesteps: 0,
            iterations: 0,
            last_obs: None,
            last_episode_start: true,
            episode: EpisodeTracker::default(),
        }
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    fn value_of(&self, obs: &[f32]) -> f32 {
        let obs = vec![obs.to_vec()].to_tensor(&self.device);

        to_vec_f32(self.agent.policy().value(obs).detach())[0]
    }

    fn collect_rollouts(
        &mut self,
        env: &mut dyn Env<Vec<f32>, A>,
        mut obs: Vec<f32>,
        pb: &ProgressBar,
    ) -> Vec<f32> {
        self.buffer.reset();

        while !self.buffer.full() {
            let obs_t = vec![obs.clone()].to_tensor(&self.device);
            let (dist, value) = self.agent.policy().forward(obs_t);
            let action = dist.sample().detach();
            let log_prob = to_vec_f32(dist.log_prob(action.clone()).detach())[0];
            let value = to_vec_f32(value.detach())[0];
            let action = to_vec_f32(action);

            let step_res = env.step(&A::decode(&action, &*self.action_space));
            self.num_timesteps += 1;
            pb.inc(1);

            let mut reward = step_res.reward;
            // bootstrap through time limits
            if step_res.truncated && !step_res.terminated {
                reward += self.params.gamma * self.value_of(&step_res.obs);
            }

            self.episode.record_step(step_res.reward);
            self.buffer.add(
                obs,
                action,
                reward,
                self.last_episode_start,
                value,
                log_prob,
            );

            self.last_episode_start = step_res.done();
            obs = if step_res.done() {
                self.logger.log(self.episode.finish(self.num_timesteps));
                env.reset(None, None)
            } else {
                step_res.obs
            };
        }

        let last_value = self.value_of(&obs);
        self.buffer
            .compute_returns_and_advantage(last_value, self.last_episode_start);

        obs
    }

    fn learn_inner(
        &mut self,
        env: &mut dyn Env<Vec<f32>, A>,
        total_timesteps: usize,
        reset_num_timesteps: bool,
    ) -> error::Result<()> {
        if reset_num_timesteps {
            self.num_timesteps = 0;
            self.iterations = 0;
            self.last_obs = None;
            self.last_episode_start = true;
            self.episode = EpisodeTracker::default();
        }

        let end = self.num_timesteps + total_timesteps;
        let mut obs = match self.last_obs.take() {
            Some(obs) => obs,
            None => {
                self.last_episode_start = true;
                env.reset(self.params.seed, None)
            }
        };

        let pb = progress_bar(total_timesteps);

        // whole rollouts only, so the final one may overshoot `end`
        while self.num_timesteps < end {
            obs = self.collect_rollouts(env, obs, &pb);
            self.iterations += 1;

            let ev = explained_variance(self.buffer.values(), self.buffer.returns());
            let log = self
                .agent
                .train(&self.buffer, &self.device)
                .push("explained_variance".to_string(), LogData::Float(ev))
                .push("iterations".to_string(), LogData::Int(self.iterations as i32))
                .push(
                    "total_timesteps".to_string(),
                    LogData::Int(self.num_timesteps as i32),
                );
            self.logger.log(log);
        }

        pb.finish_and_clear();
        self.last_obs = Some(obs);

        self.logger.dump()?;

        Ok(())
    }
}

impl<B: AutodiffBackend, Ag: OnPolicyAgent<B>, A: PolicyAction> Algorithm<Vec<f32>, A>
    for OnPolicyAlgorithm<B, Ag, A>
{
    fn learn(
        &mut self,
        env: &mut dyn Env<Vec<f32>, A>,
        total_timesteps: usize,
        reset_num_timesteps: bool,
    ) -> error::Result<()> {
        self.learn_inner(env, total_timesteps, reset_num_timesteps)
    }

    fn predict(&mut self, obs: &Vec<f32>, deterministic: bool) -> A {
        let obs_t = vec![obs.clone()].to_tensor(&self.device);
        let dist = self.agent.policy().distribution(obs_t);

        let action = if deterministic {
            dist.mode()
        } else {
            dist.sample()
        };

        A::decode(&to_vec_f32(action.detach()), &*self.action_space)
    }

    fn save(&self, path: &Path) -> error::Result<PathBuf> {
        self.agent.save(path)
    }

    fn load(&mut self, path: &Path) -> error::Result<()> {
        self.agent.load(path, &self.device)
    }

    fn num_timesteps(&self) -> usize {
        self.num_timesteps
    }
}
