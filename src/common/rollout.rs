use burn::tensor::{backend::Backend, Tensor};
use rand::seq::SliceRandom;

use super::to_tensor::ToTensorF;

/// A minibatch of rollout data, on device
pub struct RolloutBatch<B: Backend> {
    pub observations: Tensor<B, 2>,
    pub actions: Tensor<B, 2>,
    pub old_values: Tensor<B, 1>,
    pub old_log_probs: Tensor<B, 1>,
    pub advantages: Tensor<B, 1>,
    pub returns: Tensor<B, 1>,
}

/// Fixed-length on-policy storage with generalised advantage estimation.
///
/// `episode_starts[i]` marks that `observations[i]` is the first
/// observation of a new episode.
pub struct RolloutBuffer {
    buffer_size: usize,
    gamma: f32,
    gae_lambda: f32,
    observations: Vec<Vec<f32>>,
    actions: Vec<Vec<f32>>,
    rewards: Vec<f32>,
    episode_starts: Vec<bool>,
    values: Vec<f32>,
    log_probs: Vec<f32>,
    advantages: Vec<f32>,
    returns: Vec<f32>,
}

impl RolloutBuffer {
    pub fn new(buffer_size: usize, gamma: f32, gae_lambda: f32) -> Self {
        assert!(buffer_size > 0, "rollout buffer size must be positive");

        Self {
            buffer_size,
            gamma,
            gae_lambda,
            observations: Vec::with_capacity(buffer_size),
            actions: Vec::with_capacity(buffer_size),
            rewards: Vec::with_capacity(buffer_size),
            episode_starts: Vec::with_capacity(buffer_size),
            values: Vec::with_capacity(buffer_size),
            log_probs: Vec::with_capacity(buffer_size),
            advantages: Vec::new(),
            returns: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.observations.clear();
        self.actions.clear();
        self.rewards.clear();
        self.episode_starts.clear();
        self.values.clear();
        self.log_probs.clear();
        self.advantages.clear();
        self.returns.clear();
    }

    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    pub fn full(&self) -> bool {
        self.len() == self.buffer_size
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn advantages(&self) -> &[f32] {
        &self.advantages
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn returns(&self) -> &[f32] {
        &self.returns
    }

    pub fn add(
        &mut self,
        obs: Vec<f32>,
        action: Vec<f32>,
        reward: f32,
        episode_start: bool,
        value: f32,
        log_prob: f32,
    ) {
        assert!(!self.full(), "rollout buffer is full");

        self.observations.push(obs);
        self.actions.push(action);
        self.rewards.push(reward);
        self.episode_starts.push(episode_start);
        self.values.push(value);
        self.log_probs.push(log_prob);
    }

    /// GAE(lambda) over the stored rollout.
    ///
    /// `last_value` is the value estimate of the observation after the
    /// final step and `done` whether that step ended its episode.
    pub fn compute_returns_and_advantage(&mut self, last_value: f32, done: bool) {
        let n = self.len();
        self.advantages = vec![0.0; n];

        let mut last_gae_lam = 0.0;
        for step in (0..n).rev() {
            let (next_non_terminal, next_value) = if step == n - 1 {
                (if done { 0.0 } else { 1.0 }, last_value)
            } else {
                (
                    if self.episode_starts[step + 1] { 0.0 } else { 1.0 },
                    self.values[step + 1],
                )
            };

            let delta = self.rewards[step] + self.gamma * next_value * next_non_terminal
                - self.values[step];
            last_gae_lam =
                delta + self.gamma * self.gae_lambda * next_non_terminal * last_gae_lam;
            self.advantages[step] = last_gae_lam;
        }

        self.returns = self
            .advantages
            .iter()
            .zip(self.values.iter())
            .map(|(a, v)| a + v)
            .collect();
    }

    /// Shuffled index sets covering the buffer. `None` gives one full batch.
    pub fn minibatch_indices(&self, batch_size: Option<usize>) -> Vec<Vec<usize>> {
        let mut indices: Vec<usize> = (0..self.len()).collect();
        indices.shuffle(&mut rand::rng());

        let batch_size = batch_size.unwrap_or(self.len()).max(1);
        indices.chunks(batch_size).map(|c| c.to_vec()).collect()
    }

    pub fn batch<B: Backend>(&self, indices: &[usize], device: &B::Device) -> RolloutBatch<B> {
        let pick = |v: &[f32]| -> Vec<f32> { indices.iter().map(|&i| v[i]).collect() };

        RolloutBatch {
            observations: indices
                .iter()
                .map(|&i| self.observations[i].clone())
                .collect::<Vec<_>>()
                .to_tensor(device),
            actions: indices
                .iter()
                .map(|&i| self.actions[i].clone())
                .collect::<Vec<_>>()
                .to_tensor(device),
            old_values: pick(&self.values).to_tensor(device),
            old_log_probs: pick(&self.log_probs).to_tensor(device),
            advantages: pick(&self.advantages).to_tensor(device),
            returns: pick(&self.returns).to_tensor(device),
        }
    }
}
