use std::path::{Path, PathBuf};

use burn::{
    config::Config,
    module::{AutodiffModule, Module},
    nn::loss::{MseLoss, Reduction},
    optim::{adaptor::OptimizerAdaptor, GradientsParams, Optimizer, SimpleOptimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion, Int, Tensor,
    },
};
use rand::Rng;

use crate::{
    common::{
        agent::{Agent, Policy},
        algorithm::OfflineAlgParams,
        buffer::ReplayBuffer,
        checkpoint::{load_checkpoint, save_checkpoint, OptimizerRecord},
        logger::{LogData, LogItem},
        spaces::{with_shared_rng, BoxSpace, Discrete, Space},
        to_tensor::{ToTensorF, ToTensorI},
        utils::linear_decay,
    },
    error,
};

pub mod module;

use module::QNetwork;

#[derive(Config)]
pub struct DQNConfig {
    #[config(default = 1.0)]
    pub eps_start: f32,
    #[config(default = 0.05)]
    pub eps_end: f32,
    /// Fraction of training over which epsilon decays
    #[config(default = 0.1)]
    pub exploration_fraction: f32,
    /// Env steps between hard copies into the target network
    #[config(default = 10_000)]
    pub target_update_interval: usize,
    #[config(default = 10.0)]
    pub max_grad_norm: f32,
    #[config(default = "vec![64, 64]")]
    pub net_arch: Vec<usize>,
}

#[derive(Debug, Module)]
struct DQNModules<B: Backend> {
    q: QNetwork<B>,
    q_target: QNetwork<B>,
}

pub struct DQNAgent<O: SimpleOptimizer<B::InnerBackend>, B: AutodiffBackend> {
    q: QNetwork<B>,
    q_target: QNetwork<B>,
    optim: OptimizerAdaptor<O, QNetwork<B>, B>,
    config: DQNConfig,
    last_target_update: usize,
    observation_space: BoxSpace<Vec<f32>>,
    action_space: Discrete,
}

impl<O: SimpleOptimizer<B::InnerBackend>, B: AutodiffBackend> DQNAgent<O, B> {
    pub fn new(
        q: QNetwork<B>,
        optim: OptimizerAdaptor<O, QNetwork<B>, B>,
        config: DQNConfig,
        observation_space: BoxSpace<Vec<f32>>,
        action_space: Discrete,
    ) -> Self {
        Self {
            q_target: q.clone().no_grad(),
            q,
            optim,
            config,
            last_target_update: 0,
            observation_space,
            action_space,
        }
    }

    pub fn epsilon(&self, global_frac: f32) -> f32 {
        linear_decay(
            global_frac,
            self.config.eps_start,
            self.config.eps_end,
            self.config.exploration_fraction,
        )
    }

    fn modules(&self) -> DQNModules<B> {
        DQNModules {
            q: self.q.clone(),
            q_target: self.q_target.clone(),
        }
    }
}

impl<O: SimpleOptimizer<B::InnerBackend>, B: AutodiffBackend> Agent<B, Vec<f32>, usize>
    for DQNAgent<O, B>
{
    fn act(
        &self,
        _global_step: usize,
        global_frac: f32,
        obs: &Vec<f32>,
        greedy: bool,
        inference_device: &B::Device,
    ) -> (usize, LogItem) {
        let eps = self.epsilon(global_frac);
        let explore = !greedy && with_shared_rng(|rng| rng.random::<f32>()) < eps;

        let a = if explore {
            self.action_space.clone().sample()
        } else {
            let obs = vec![obs.clone()].to_tensor::<B::InnerBackend>(inference_device);
            let best: Tensor<B::InnerBackend, 2, Int> = self.q.valid().forward(obs).argmax(1);
            best.into_scalar().elem::<i64>() as usize
        };

        let log = LogItem::default().push("eps".to_string(), LogData::Float(eps));

        (a, log)
    }

    fn train_step(
        &mut self,
        global_step: usize,
        replay_buffer: &ReplayBuffer<Vec<f32>, usize>,
        offline_params: &OfflineAlgParams,
        train_device: &B::Device,
    ) -> (Option<f32>, LogItem) {
        let sample = replay_buffer.batch_sample(offline_params.batch_size);

        let states = sample.states.clone().to_tensor(train_device);
        let actions: Tensor<B, 2, Int> = sample.actions.clone().to_tensor(train_device).unsqueeze_dim(1);
        let next_states = sample.next_states.clone().to_tensor(train_device);
        let rewards: Tensor<B, 2> = sample.rewards.clone().to_tensor(train_device).unsqueeze_dim(1);
        let not_done: Tensor<B, 2> = sample
            .done_mask()
            .to_tensor(train_device)
            .unsqueeze_dim(1)
            .neg()
            .add_scalar(1.0);

        let next_q = self.q_target.forward(next_states).max_dim(1);
        let targets = (rewards + not_done * next_q.mul_scalar(offline_params.gamma)).detach();

        let q_vals = self.q.forward(states).gather(1, actions);
        let loss = MseLoss::new().forward(q_vals, targets, Reduction::Mean);
        let loss_val: f32 = loss.clone().into_scalar().elem();

        let grads = GradientsParams::from_grads(loss.backward(), &self.q);
        self.q = self.optim.step(offline_params.lr, self.q.clone(), grads);

        let mut log = LogItem::default().push("loss".to_string(), LogData::Float(loss_val));

        if global_step >= self.last_target_update + self.config.target_update_interval {
            self.q_target.update(&self.q, None);
            self.q_target = self.q_target.clone().no_grad();
            self.last_target_update = global_step;
            log = log.push("target_update".to_string(), LogData::Int(global_step as i32));
        }

        (Some(loss_val), log)
    }

    fn observation_space(&self) -> Box<dyn Space<Vec<f32>>> {
        Box::new(self.observation_space.clone())
    }

    fn action_space(&self) -> Box<dyn Space<usize>> {
        Box::new(self.action_space.clone())
    }

    fn save(&self, path: &Path) -> error::Result<PathBuf> {
        save_checkpoint::<B, _, _>(self.modules(), self.optim.to_record(), path)
    }

    fn load(&mut self, path: &Path, device: &B::Device) -> error::Result<()> {
        let (loaded, optim): (DQNModules<B>, OptimizerRecord<O, B>) =
            load_checkpoint(self.modules(), path, device)?;
        self.q = loaded.q;
        self.q_target = loaded.q_target.no_grad();
        self.optim = self.optim.clone().load_record(optim);

        Ok(())
    }
}
