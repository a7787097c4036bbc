use std::path::{Path, PathBuf};

use burn::{
    module::{AutodiffModule, Module},
    nn::loss::{MseLoss, Reduction},
    optim::{adaptor::OptimizerAdaptor, GradientsParams, Optimizer, SimpleOptimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        Distribution, ElementConversion, Tensor,
    },
};

use crate::{
    common::{
        agent::{Agent, Policy},
        algorithm::OfflineAlgParams,
        buffer::ReplayBuffer,
        checkpoint::{load_checkpoint, save_checkpoint, OptimizerRecord},
        logger::{LogData, LogItem},
        spaces::{BoxSpace, Space},
        to_tensor::{to_vec_f32, ToTensorF},
    },
    error::Result,
    sac::models::QModelSet,
};

use super::{models::Actor, TD3Config};

#[derive(Debug, Module)]
struct TD3Modules<B: Backend> {
    actor: Actor<B>,
    actor_target: Actor<B>,
    critics: QModelSet<B>,
    critic_targets: QModelSet<B>,
}

pub struct TD3Agent<O: SimpleOptimizer<B::InnerBackend>, B: AutodiffBackend> {
    actor: Actor<B>,
    actor_target: Actor<B>,
    critics: QModelSet<B>,
    critic_targets: QModelSet<B>,

    actor_optim: OptimizerAdaptor<O, Actor<B>, B>,
    critic_optim: OptimizerAdaptor<O, QModelSet<B>, B>,

    config: TD3Config,
    observation_space: BoxSpace<Vec<f32>>,
    action_space: BoxSpace<Vec<f32>>,
    n_updates: usize,
}

impl<O: SimpleOptimizer<B::InnerBackend>, B: AutodiffBackend> TD3Agent<O, B> {
    pub fn new(
        actor: Actor<B>,
        critics: QModelSet<B>,
        actor_optim: OptimizerAdaptor<O, Actor<B>, B>,
        critic_optim: OptimizerAdaptor<O, QModelSet<B>, B>,
        config: TD3Config,
        observation_space: BoxSpace<Vec<f32>>,
        action_space: BoxSpace<Vec<f32>>,
    ) -> Self {
        Self {
            actor_target: actor.clone().no_grad(),
            actor,
            critic_targets: critics.clone().no_grad(),
            critics,
            actor_optim,
            critic_optim,
            config,
            observation_space,
            action_space,
            n_updates: 0,
        }
    }

    fn modules(&self) -> TD3Modules<B> {
        TD3Modules {
            actor: self.actor.clone(),
            actor_target: self.actor_target.clone(),
            critics: self.critics.clone(),
            critic_targets: self.critic_targets.clone(),
        }
    }
}

impl<O: SimpleOptimizer<B::InnerBackend>, B: AutodiffBackend> Agent<B, Vec<f32>, Vec<f32>>
    for TD3Agent<O, B>
{
    fn act(
        &self,
        _global_step: usize,
        _global_frac: f32,
        obs: &Vec<f32>,
        greedy: bool,
        inference_device: &B::Device,
    ) -> (Vec<f32>, LogItem) {
        let obs = vec![obs.clone()].to_tensor::<B::InnerBackend>(inference_device);
        let mut action = self.actor.valid().forward(obs);

        if let (false, Some(std)) = (greedy, self.config.action_noise) {
            let noise = Tensor::random_like(&action, Distribution::Normal(0.0, std as f64));
            action = (action + noise).clamp(-1.0, 1.0);
        }

        (
            self.action_space.unscale(&to_vec_f32(action)),
            LogItem::default(),
        )
    }

    fn train_step(
        &mut self,
        _global_step: usize,
        replay_buffer: &ReplayBuffer<Vec<f32>, Vec<f32>>,
        offline_params: &OfflineAlgParams,
        train_device: &B::Device,
    ) -> (Option<f32>, LogItem) {
        let sample = replay_buffer.batch_sample(offline_params.batch_size);

        let states = sample.states.clone().to_tensor(train_device);
        let actions = sample
            .actions
            .iter()
            .map(|a| self.action_space.scale(a))
            .collect::<Vec<_>>()
            .to_tensor(train_device);
        let next_states = sample.next_states.clone().to_tensor(train_device);
        let rewards: Tensor<B, 2> = sample.rewards.clone().to_tensor(train_device).unsqueeze_dim(1);
        let not_done: Tensor<B, 2> = sample
            .done_mask()
            .to_tensor(train_device)
            .unsqueeze_dim(1)
            .neg()
            .add_scalar(1.0);

        // target policy smoothing
        let mut next_actions = self.actor_target.forward(next_states.clone());
        if self.config.target_policy_noise > 0.0 {
            let clip = self.config.target_noise_clip;
            let noise = Tensor::random_like(
                &next_actions,
                Distribution::Normal(0.0, self.config.target_policy_noise as f64),
            )
            .clamp(-clip, clip);
            next_actions = (next_actions + noise).clamp(-1.0, 1.0);
        }

        let next_q = self.critic_targets.min_q(next_states, next_actions);
        let target_q = (rewards + not_done * next_q.mul_scalar(offline_params.gamma)).detach();

        let mut critic_loss: Tensor<B, 1> = Tensor::zeros([1], train_device);
        for q in self.critics.q_from_actions(states.clone(), actions) {
            critic_loss = critic_loss + MseLoss::new().forward(q, target_q.clone(), Reduction::Mean);
        }
        let critic_loss_val: f32 = critic_loss.clone().into_scalar().elem();

        let critic_grads = GradientsParams::from_grads(critic_loss.backward(), &self.critics);
        self.critics = self
            .critic_optim
            .step(offline_params.lr, self.critics.clone(), critic_grads);

        self.n_updates += 1;
        let mut log = LogItem::default()
            .push("critic_loss".to_string(), LogData::Float(critic_loss_val))
            .push("n_updates".to_string(), LogData::Int(self.n_updates as i32));

        if self.n_updates % self.config.policy_delay == 0 {
            let actor_loss = self
                .critics
                .q1(states.clone(), self.actor.forward(states))
                .mean()
                .neg();
            let actor_loss_val: f32 = actor_loss.clone().into_scalar().elem();

            let actor_grads = GradientsParams::from_grads(actor_loss.backward(), &self.actor);
            self.actor = self
                .actor_optim
                .step(offline_params.lr, self.actor.clone(), actor_grads);

            self.critic_targets.update(&self.critics, Some(self.config.tau));
            self.critic_targets = self.critic_targets.clone().no_grad();
            self.actor_target.update(&self.actor, Some(self.config.tau));
            self.actor_target = self.actor_target.clone().no_grad();

            log = log.push("actor_loss".to_string(), LogData::Float(actor_loss_val));
        }

        (Some(critic_loss_val), log)
    }

    fn observation_space(&self) -> Box<dyn Space<Vec<f32>>> {
        Box::new(self.observation_space.clone())
    }

    fn action_space(&self) -> Box<dyn Space<Vec<f32>>> {
        Box::new(self.action_space.clone())
    }

    fn save(&self, path: &Path) -> Result<PathBuf> {
        let optims = (self.actor_optim.to_record(), self.critic_optim.to_record());

        save_checkpoint::<B, _, _>(self.modules(), optims, path)
    }

    fn load(&mut self, path: &Path, device: &B::Device) -> Result<()> {
        let (loaded, (actor_optim, critic_optim)): (
            TD3Modules<B>,
            (OptimizerRecord<O, B>, OptimizerRecord<O, B>),
        ) = load_checkpoint(self.modules(), path, device)?;

        self.actor = loaded.actor;
        self.actor_target = loaded.actor_target.no_grad();
        self.critics = loaded.critics;
        self.critic_targets = loaded.critic_targets.no_grad();
        self.actor_optim = self.actor_optim.clone().load_record(actor_optim);
        self.critic_optim = self.critic_optim.clone().load_record(critic_optim);

        Ok(())
    }
}
