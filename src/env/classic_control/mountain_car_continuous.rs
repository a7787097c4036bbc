use rand::rngs::StdRng;

use crate::{
    common::spaces::{BoxSpace, Space},
    env::{
        base::{Env, EnvObservation, RenderMode, ResetOptions, RewardRange, RgbFrame},
        wrappers::TimeLimitWrapper,
    },
};

use super::{
    mountain_car::{
        draw_mountain_car, initial_state, observation_space, MAX_POSITION, MAX_SPEED,
        MIN_POSITION,
    },
    reset_rng,
};

pub struct MountainCarContinuousEnv {
    min_action: f32,
    max_action: f32,
    goal_position: f32,
    goal_velocity: f32,
    power: f32,
    render_mode: RenderMode,

    state: [f32; 2],
    rng: StdRng,
}

impl MountainCarContinuousEnv {
    pub fn new(render_mode: RenderMode) -> Self {
        Self {
            min_action: -1.0,
            max_action: 1.0,
            goal_position: 0.45,
            goal_velocity: 0.0,
            power: 0.0015,
            render_mode,
            state: [0.0, 0.0],
            rng: reset_rng(None),
        }
    }
}

impl Default for MountainCarContinuousEnv {
    fn default() -> Self {
        Self::new(RenderMode::None)
    }
}

impl Env<Vec<f32>, Vec<f32>> for MountainCarContinuousEnv {
    fn step(&mut self, action: &Vec<f32>) -> EnvObservation<Vec<f32>> {
        assert!(action.len() == 1);

        let [mut p, mut v] = self.state;
        let force = action[0].clamp(self.min_action, self.max_action);

        v += force * self.power - 0.0025 * (3.0 * p).cos();
        v = v.clamp(-MAX_SPEED, MAX_SPEED);
        p += v;
        p = p.clamp(MIN_POSITION, MAX_POSITION);

        if p <= MIN_POSITION && v < 0.0 {
            v = 0.0;
        }

        let terminated = p >= self.goal_position && v >= self.goal_velocity;
        self.state = [p, v];

        let mut reward = if terminated { 100.0 } else { 0.0 };
        reward -= action[0].powi(2) * 0.1;

        EnvObservation {
            obs: self.state.to_vec(),
            reward,
            terminated,
            truncated: false,
            info: Default::default(),
        }
    }

    fn reset(&mut self, seed: Option<u64>, _options: Option<ResetOptions>) -> Vec<f32> {
        if seed.is_some() {
            self.rng = reset_rng(seed);
        }

        self.state = initial_state(&mut self.rng);

        self.state.to_vec()
    }

    fn action_space(&self) -> Box<dyn Space<Vec<f32>>> {
        Box::new(BoxSpace::from((
            vec![self.min_action],
            vec![self.max_action],
        )))
    }

    fn observation_space(&self) -> Box<dyn Space<Vec<f32>>> {
        Box::new(observation_space())
    }

    fn reward_range(&self) -> RewardRange {
        RewardRange {
            low: -0.1,
            high: 100.0,
        }
    }

    fn render(&mut self) -> Option<RgbFrame> {
        match self.render_mode {
            RenderMode::RgbArray => draw_mountain_car(self.state[0], self.goal_position),
            RenderMode::None => None,
        }
    }

    fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    fn close(&mut self) {}
}

pub fn make_mountain_car_continuous(
    max_steps: Option<usize>,
    render_mode: RenderMode,
) -> Box<dyn Env<Vec<f32>, Vec<f32>>> {
    Box::new(TimeLimitWrapper::new(
        Box::new(MountainCarContinuousEnv::new(render_mode)),
        max_steps.unwrap_or(999),
    ))
}
