use std::path::{Path, PathBuf};

use burn::{
    module::{Module, Param},
    nn::loss::{MseLoss, Reduction},
    optim::{adaptor::OptimizerAdaptor, GradientsParams, Optimizer, SimpleOptimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion, Tensor,
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
};

use super::{
    models::{PiModel, QModelSet},
    SACConfig,
};

/// Holds `log(alpha)` so the entropy coefficient stays positive
#[derive(Debug, Module)]
pub struct EntCoefModule<B: Backend> {
    log_ent_coef: Param<Tensor<B, 1>>,
}

impl<B: Backend> EntCoefModule<B> {
    pub fn new(starting_val: f32, device: &B::Device) -> Self {
        Self {
            log_ent_coef: Param::from_tensor(Tensor::from_floats([starting_val.ln()], device)),
        }
    }

    pub fn log_val(&self) -> Tensor<B, 1> {
        self.log_ent_coef.val()
    }

    pub fn val(&self) -> f32 {
        self.log_ent_coef.val().exp().into_scalar().elem()
    }
}

enum EntCoef<O: SimpleOptimizer<B::InnerBackend>, B: AutodiffBackend> {
    Constant(f32),
    Trainable {
        module: EntCoefModule<B>,
        optim: OptimizerAdaptor<O, EntCoefModule<B>, B>,
        target_entropy: f32,
    },
}

impl<O: SimpleOptimizer<B::InnerBackend>, B: AutodiffBackend> EntCoef<O, B> {
    fn value(&self) -> f32 {
        match self {
            EntCoef::Constant(v) => *v,
            EntCoef::Trainable { module, .. } => module.val(),
        }
    }

    /// loss = -log(alpha) * (log_prob + target_entropy)
    ///
    /// Returns the coefficient to use for this step and the loss, if trained.
    fn train_step(&mut self, log_probs: Tensor<B, 2>, lr: f64) -> (f32, Option<f32>) {
        match self {
            EntCoef::Constant(val) => (*val, None),
            EntCoef::Trainable {
                module,
                optim,
                target_entropy,
            } => {
                let ent_coef = module.val();

                let log_probs = log_probs.detach().squeeze::<1>(1);
                let loss = (module.log_val() * log_probs.add_scalar(*target_entropy))
                    .mean()
                    .neg();

                let grads = GradientsParams::from_grads(loss.backward(), &*module);
                *module = optim.step(lr, module.clone(), grads);

                (ent_coef, Some(loss.into_scalar().elem()))
            }
        }
    }
}

/// Modules in a SAC checkpoint
#[derive(Debug, Module)]
struct SACModules<B: Backend> {
    pi: PiModel<B>,
    qs: QModelSet<B>,
    target_qs: QModelSet<B>,
    ent_coef: Option<EntCoefModule<B>>,
}

/// Actor, critic and (when trained) entropy optimizer state
type SACOptimRecords<O, B> = (
    OptimizerRecord<O, B>,
    OptimizerRecord<O, B>,
    Option<OptimizerRecord<O, B>>,
);

pub struct SACAgent<O: SimpleOptimizer<B::InnerBackend>, B: AutodiffBackend> {
    // models
    pi: PiModel<B>,
    qs: QModelSet<B>,
    target_qs: QModelSet<B>,

    // optimisers
    pi_optim: OptimizerAdaptor<O, PiModel<B>, B>,
    q_optim: OptimizerAdaptor<O, QModelSet<B>, B>,

    // parameters
    ent_coef: EntCoef<O, B>,
    config: SACConfig,

    // housekeeping
    observation_space: BoxSpace<Vec<f32>>,
    action_space: BoxSpace<Vec<f32>>,
    n_updates: usize,
}

impl<O: SimpleOptimizer<B::InnerBackend>, B: AutodiffBackend> SACAgent<O, B> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pi: PiModel<B>,
        qs: QModelSet<B>,
        pi_optim: OptimizerAdaptor<O, PiModel<B>, B>,
        q_optim: OptimizerAdaptor<O, QModelSet<B>, B>,
        ent_optim: Option<OptimizerAdaptor<O, EntCoefModule<B>, B>>,
        config: SACConfig,
        observation_space: BoxSpace<Vec<f32>>,
        action_space: BoxSpace<Vec<f32>>,
        device: &B::Device,
    ) -> Self {
        let target_entropy = config
            .target_entropy
            .unwrap_or(-(action_space.len() as f32));

        let ent_coef = match ent_optim {
            Some(optim) => EntCoef::Trainable {
                module: EntCoefModule::new(config.ent_coef_init, device),
                optim,
                target_entropy,
            },
            None => EntCoef::Constant(config.ent_coef_init),
        };

        Self {
            pi,
            target_qs: qs.clone().no_grad(),
            qs,
            pi_optim,
            q_optim,
            ent_coef,
            config,
            observation_space,
            action_space,
            n_updates: 0,
        }
    }

    pub fn ent_coef(&self) -> f32 {
        self.ent_coef.value()
    }

    fn modules(&self) -> SACModules<B> {
        SACModules {
            pi: self.pi.clone(),
            qs: self.qs.clone(),
            target_qs: self.target_qs.clone(),
            ent_coef: match &self.ent_coef {
                EntCoef::Trainable { module, .. } => Some(module.clone()),
                EntCoef::Constant(_) => None,
            },
        }
    }
}

impl<O: SimpleOptimizer<B::InnerBackend>, B: AutodiffBackend> Agent<B, Vec<f32>, Vec<f32>>
    for SACAgent<O, B>
{
    fn act(
        &self,
        _global_step: usize,
        _global_frac: f32,
        obs: &Vec<f32>,
        greedy: bool,
        inference_device: &B::Device,
    ) -> (Vec<f32>, LogItem) {
        let obs = vec![obs.clone()].to_tensor(inference_device);
        let scaled = to_vec_f32(self.pi.act(obs, greedy).detach());

        (self.action_space.unscale(&scaled), LogItem::default())
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

        let (actions_pi, log_prob) = self.pi.act_log_prob(states.clone());

        // entropy coefficient
        let (ent_coef, ent_coef_loss) = self
            .ent_coef
            .train_step(log_prob.clone(), offline_params.lr);

        let mut log = LogItem::default().push("ent_coef".to_string(), LogData::Float(ent_coef));
        if let Some(l) = ent_coef_loss {
            log = log.push("ent_coef_loss".to_string(), LogData::Float(l));
        }

        // soft bellman target
        let (next_actions, next_log_prob) = self.pi.act_log_prob(next_states.clone());
        let next_q = self.target_qs.min_q(next_states, next_actions.detach())
            - next_log_prob.detach().mul_scalar(ent_coef);
        let target_q = (rewards + not_done * next_q.mul_scalar(offline_params.gamma)).detach();

        // critics
        let mut critic_loss: Tensor<B, 1> = Tensor::zeros([1], train_device);
        for q in self.qs.q_from_actions(states.clone(), actions) {
            critic_loss = critic_loss + MseLoss::new().forward(q, target_q.clone(), Reduction::Mean);
        }
        // the 0.5 cancels the factor of 2 in the squared error gradient
        let critic_loss = critic_loss.mul_scalar(0.5);
        let critic_loss_val: f32 = critic_loss.clone().into_scalar().elem();

        let critic_grads = GradientsParams::from_grads(critic_loss.backward(), &self.qs);
        self.qs = self
            .q_optim
            .step(offline_params.lr, self.qs.clone(), critic_grads);

        // actor, through the freshly updated critics
        let min_q_pi = self.qs.min_q(states, actions_pi);
        let actor_loss = (log_prob.mul_scalar(ent_coef) - min_q_pi).mean();
        let actor_loss_val: f32 = actor_loss.clone().into_scalar().elem();

        let actor_grads = GradientsParams::from_grads(actor_loss.backward(), &self.pi);
        self.pi = self
            .pi_optim
            .step(offline_params.lr, self.pi.clone(), actor_grads);

        self.n_updates += 1;
        if self.n_updates % self.config.target_update_interval == 0 {
            self.target_qs.update(&self.qs, Some(self.config.tau));
            self.target_qs = self.target_qs.clone().no_grad();
        }

        let log = log
            .push("critic_loss".to_string(), LogData::Float(critic_loss_val))
            .push("actor_loss".to_string(), LogData::Float(actor_loss_val))
            .push("n_updates".to_string(), LogData::Int(self.n_updates as i32));

        (Some(critic_loss_val), log)
    }

    fn observation_space(&self) -> Box<dyn Space<Vec<f32>>> {
        Box::new(self.observation_space.clone())
    }

    fn action_space(&self) -> Box<dyn Space<Vec<f32>>> {
        Box::new(self.action_space.clone())
    }

    fn save(&self, path: &Path) -> Result<PathBuf> {
        let ent_optim = match &self.ent_coef {
            EntCoef::Trainable { optim, .. } => Some(optim.to_record()),
            EntCoef::Constant(_) => None,
        };
        let optims = (self.pi_optim.to_record(), self.q_optim.to_record(), ent_optim);

        save_checkpoint::<B, _, _>(self.modules(), optims, path)
    }

    fn load(&mut self, path: &Path, device: &B::Device) -> Result<()> {
        let (loaded, (pi_optim, q_optim, ent_optim)): (SACModules<B>, SACOptimRecords<O, B>) =
            load_checkpoint(self.modules(), path, device)?;

        self.pi = loaded.pi;
        self.qs = loaded.qs;
        self.target_qs = loaded.target_qs.no_grad();
        self.pi_optim = self.pi_optim.clone().load_record(pi_optim);
        self.q_optim = self.q_optim.clone().load_record(q_optim);
        if let EntCoef::Trainable { module, optim, .. } = &mut self.ent_coef {
            if let Some(loaded) = loaded.ent_coef {
                *module = loaded;
            }
            if let Some(record) = ent_optim {
                *optim = optim.clone().load_record(record);
            }
        }

        Ok(())
    }
}
