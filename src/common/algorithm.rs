use std::path::{Path, PathBuf};
use std::time;

use burn::config::Config;
use burn::tensor::backend::AutodiffBackend;
use indicatif::{ProgressBar, ProgressStyle};

use crate::{env::base::Env, error};

use super::{
    agent::Agent,
    buffer::ReplayBuffer,
    logger::{LogData, LogItem, Logger},
    utils::mean,
};

/// A trainable model that can act in, and learn from, an environment.
///
/// Mirrors the Stable-Baselines3 model surface: `learn` may be called
/// repeatedly, and with `reset_num_timesteps = false` the step counter
/// and episode state carry over between calls.
pub trait Algorithm<O, A> {
    fn learn(
        &mut self,
        env: &mut dyn Env<O, A>,
        total_timesteps: usize,
        reset_num_timesteps: bool,
    ) -> error::Result<()>;

    fn predict(&mut self, obs: &O, deterministic: bool) -> A;

    /// Writes the model to `path`, returning the file actually written
    fn save(&self, path: &Path) -> error::Result<PathBuf>;

    fn load(&mut self, path: &Path) -> error::Result<()>;

    /// Environment steps taken across all `learn` calls
    fn num_timesteps(&self) -> usize;
}

#[derive(Config)]
pub struct OfflineAlgParams {
    #[config(default = 1_000_000)]
    pub memory_size: usize,
    #[config(default = 256)]
    pub batch_size: usize,
    /// Steps of uniformly random actions before the agent acts or trains
    #[config(default = 100)]
    pub warmup_steps: usize,
    #[config(default = 0.99)]
    pub gamma: f32,
    #[config(default = 3e-4)]
    pub lr: f64,
    #[config(default = 1)]
    pub train_every: usize,
    #[config(default = 1)]
    pub grad_steps: usize,
    pub seed: Option<u64>,
}

pub(crate) fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{pos:>7}/{len:7} {bar} [{elapsed_precise}], eta: [{eta}]")
    {
        pb.set_style(style);
    }

    pb
}

/// Running statistics of the episode in progress
#[derive(Debug)]
pub(crate) struct EpisodeTracker {
    pub episodes: usize,
    reward: f32,
    len: usize,
    losses: Vec<f32>,
    start: time::Instant,
}

impl Default for EpisodeTracker {
    fn default() -> Self {
        Self {
            episodes: 0,
            reward: 0.0,
            len: 0,
            losses: Vec::new(),
            start: time::Instant::now(),
        }
    }
}

impl EpisodeTracker {
    pub fn record_step(&mut self, reward: f32) {
        self.reward += reward;
        self.len += 1;
    }

    pub fn record_loss(&mut self, loss: f32) {
        self.losses.push(loss);
    }

    /// Closes the current episode, returning its summary
    pub fn finish(&mut self, global_step: usize) -> LogItem {
        let fps = self.len as f32 / self.start.elapsed().as_secs_f32().max(f32::EPSILON);

        let mut log = LogItem::default()
            .push("global_step".to_string(), LogData::Int(global_step as i32))
            .push("ep_num".to_string(), LogData::Int(self.episodes as i32))
            .push("ep_reward".to_string(), LogData::Float(self.reward))
            .push("ep_len".to_string(), LogData::Int(self.len as i32))
            .push("ep_fps".to_string(), LogData::Float(fps));
        if !self.losses.is_empty() {
            log = log.push("mean_loss".to_string(), LogData::Float(mean(&self.losses)));
        }

        tracing::debug!(
            "episode {} finished: reward {:.2}, length {}",
            self.episodes,
            self.reward,
            self.len
        );

        *self = Self {
            episodes: self.episodes + 1,
            ..Default::default()
        };

        log
    }
}

/// Off-policy training loop around an [`Agent`] and a [`ReplayBuffer`]
pub struct OffPolicyAlgorithm<B: AutodiffBackend, Ag: Agent<B, O, A>, O: Clone, A: Clone> {
    pub offline_params: OfflineAlgParams,
    pub agent: Ag,
    pub buffer: ReplayBuffer<O, A>,
    pub logger: Box<dyn Logger>,
    device: B::Device,
    num_timesteps: usize,
    last_obs: Option<O>,
    episode: EpisodeTracker,
}

impl<B: AutodiffBackend, Ag: Agent<B, O, A>, O: Clone, A: Clone> OffPolicyAlgorithm<B, Ag, O, A> {
    pub fn new(
        offline_params: OfflineAlgParams,
        agent: Ag,
        logger: Box<dyn Logger>,
        device: B::Device,
    ) -> Self {
        let buffer = ReplayBuffer::new(offline_params.memory_size);

        Self {
            offline_params,
            agent,
            buffer,
            logger,
            device,
            num_timesteps: 0,
            last_obs: None,
            episode: EpisodeTracker::default(),
        }
    }

    pub fn episodes(&self) -> usize {
        self.episode.episodes
    }
}

impl<B: AutodiffBackend, Ag: Agent<B, O, A>, O: Clone, A: Clone> Algorithm<O, A>
    for OffPolicyAlgorithm<B, Ag, O, A>
{
    fn learn(
        &mut self,
        env: &mut dyn Env<O, A>,
        total_timesteps: usize,
        reset_num_timesteps: bool,
    ) -> error::Result<()> {
        if reset_num_timesteps {
            self.num_timesteps = 0;
            self.last_obs = None;
            self.episode = EpisodeTracker::default();
        }

        let end = self.num_timesteps + total_timesteps;
        let params = &self.offline_params;

        let mut state = match self.last_obs.take() {
            Some(obs) => obs,
            None => env.reset(params.seed, None),
        };

        let pb = progress_bar(total_timesteps);

        for _ in 0..total_timesteps {
            let step = self.num_timesteps;
            let (action, log) = if step < params.warmup_steps {
                (env.action_space().sample(), LogItem::default())
            } else {
                self.agent
                    .act(step, step as f32 / end as f32, &state, false, &self.device)
            };
            self.logger.log(log);

            let step_res = env.step(&action);

            self.episode.record_step(step_res.reward);
            self.buffer.add(
                state,
                action,
                step_res.obs.clone(),
                step_res.reward,
                step_res.terminated,
                step_res.truncated,
            );
            self.num_timesteps += 1;
            pb.inc(1);

            if (self.num_timesteps > params.warmup_steps)
                & (self.num_timesteps % params.train_every == 0)
            {
                for _ in 0..params.grad_steps {
                    let (loss, log) =
                        self.agent
                            .train_step(self.num_timesteps, &self.buffer, params, &self.device);

                    if let Some(loss) = loss {
                        self.episode.record_loss(loss);
                    }

                    self.logger.log(log)
                }
            }

            if step_res.done() {
                self.logger.log(self.episode.finish(self.num_timesteps));
                state = env.reset(None, None);
            } else {
                state = step_res.obs;
            }
        }

        pb.finish_and_clear();
        self.last_obs = Some(state);

        self.logger.dump()?;

        Ok(())
    }

    fn predict(&mut self, obs: &O, deterministic: bool) -> A {
        self.agent
            .act(self.num_timesteps, 1.0, obs, deterministic, &self.device)
            .0
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

#[cfg(test)]
mod test {
    use assert_approx_eq::assert_approx_eq;

    use super::EpisodeTracker;
    use crate::common::logger::LogData;

    #[test]
    fn tracker_resets_between_episodes() {
        let mut tracker = EpisodeTracker::default();
        tracker.record_step(1.0);
        tracker.record_step(2.0);
        tracker.record_loss(0.5);

        let log = tracker.finish(2);
        assert_eq!(log.get("ep_len"), Some(&LogData::Int(2)));
        assert_eq!(log.get("ep_num"), Some(&LogData::Int(0)));
        match log.get("ep_reward") {
            Some(LogData::Float(r)) => assert_approx_eq!(*r, 3.0),
            other => panic!("unexpected reward entry {other:?}"),
        }

        tracker.record_step(1.0);
        let log = tracker.finish(3);
        assert_eq!(log.get("ep_num"), Some(&LogData::Int(1)));
        assert_eq!(log.get("ep_len"), Some(&LogData::Int(1)));
        assert!(log.get("mean_loss").is_none());
    }
}
