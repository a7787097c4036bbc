use core::f32;

use plotters::prelude::*;
use rand::{rngs::StdRng, Rng};

use crate::{
    common::{
        spaces::{BoxSpace, Space},
        utils::angle_normalise,
    },
    env::{
        base::{Env, EnvObservation, RenderMode, ResetOptions, RewardRange, RgbFrame},
        render::render_frame,
        wrappers::TimeLimitWrapper,
    },
};

use super::reset_rng;

const DEFAULT_X: f32 = f32::consts::PI;
const DEFAULT_Y: f32 = 1.0;
const SCREEN_DIM: u32 = 500;

pub struct PendulumEnv {
    // constant
    max_speed: f32,
    max_torque: f32,
    dt: f32,
    g: f32,
    m: f32,
    l: f32,
    obs_space: BoxSpace<Vec<f32>>,
    action_space: BoxSpace<Vec<f32>>,
    render_mode: RenderMode,

    // stateful
    state: [f32; 2],
    last_u: f32,
    rng: StdRng,
}

impl PendulumEnv {
    pub fn new(render_mode: RenderMode) -> Self {
        let high = vec![1.0, 1.0, 8.0];
        let low = vec![-1.0, -1.0, -8.0];
        Self {
            max_speed: 8.0,
            max_torque: 2.0,
            dt: 0.05,
            g: 10.0,
            m: 1.0,
            l: 1.0,
            obs_space: BoxSpace::from((low, high)),
            action_space: BoxSpace::from((vec![-2.0], vec![2.0])),
            render_mode,
            state: [0.0, 0.0],
            last_u: 0.0,
            rng: reset_rng(None),
        }
    }

    fn get_obs(&self) -> Vec<f32> {
        let [theta, theta_dot] = self.state;

        vec![theta.cos(), theta.sin(), theta_dot]
    }

    fn draw(&self) -> Option<RgbFrame> {
        let dim = SCREEN_DIM as f32;
        let centre = (SCREEN_DIM as i32 / 2, SCREEN_DIM as i32 / 2);
        let scale = dim / 4.4;
        let rod_len = self.l * scale;
        let theta = self.state[0];

        let tip = (
            centre.0 + (-rod_len * theta.sin()).round() as i32,
            centre.1 - (rod_len * theta.cos()).round() as i32,
        );
        let torque = (self.last_u / self.max_torque).abs();

        render_frame(SCREEN_DIM, SCREEN_DIM, |root| {
            root.fill(&WHITE)?;
            root.draw(&PathElement::new(
                vec![centre, tip],
                RGBColor(204, 77, 77).stroke_width((0.2 * scale) as u32),
            ))?;
            root.draw(&Circle::new(
                tip,
                (0.1 * scale) as i32,
                RGBColor(204, 77, 77).filled(),
            ))?;
            root.draw(&Circle::new(
                centre,
                (0.1 * scale) as i32,
                RGBColor(204, 77, 77).filled(),
            ))?;
            // torque indicator
            root.draw(&Circle::new(
                centre,
                ((0.05 + 0.25 * torque) * scale) as i32,
                BLACK.stroke_width(2),
            ))?;
            root.draw(&Circle::new(centre, (0.05 * scale) as i32, BLACK.filled()))?;
            Ok(())
        })
    }
}

impl Default for PendulumEnv {
    fn default() -> Self {
        Self::new(RenderMode::None)
    }
}

impl Env<Vec<f32>, Vec<f32>> for PendulumEnv {
    fn step(&mut self, action: &Vec<f32>) -> EnvObservation<Vec<f32>> {
        assert!(action.len() == 1);

        let [th, th_dot] = self.state;

        let u = action[0].clamp(-self.max_torque, self.max_torque);
        self.last_u = u;

        let costs = angle_normalise(th).powi(2) + 0.1 * th_dot.powi(2) + 0.001 * u.powi(2);

        let new_th_dot = th_dot
            + (3.0 * self.g / (2.0 * self.l) * th.sin() + 3.0 / (self.m * self.l.powi(2)) * u)
                * self.dt;
        let new_th_dot = new_th_dot.clamp(-self.max_speed, self.max_speed);
        let new_th = th + new_th_dot * self.dt;

        self.state = [new_th, new_th_dot];

        EnvObservation {
            obs: self.get_obs(),
            reward: -costs,
            terminated: false,
            truncated: false,
            info: Default::default(),
        }
    }

    fn reset(&mut self, seed: Option<u64>, options: Option<ResetOptions>) -> Vec<f32> {
        if options.is_some() {
            tracing::warn!("PendulumEnv ignores reset options");
        }

        if seed.is_some() {
            self.rng = reset_rng(seed);
        }

        self.last_u = 0.0;
        self.state = [
            self.rng.random_range(-DEFAULT_X..=DEFAULT_X),
            self.rng.random_range(-DEFAULT_Y..=DEFAULT_Y),
        ];

        self.get_obs()
    }

    fn action_space(&self) -> Box<dyn Space<Vec<f32>>> {
        Box::new(self.action_space.clone())
    }

    fn observation_space(&self) -> Box<dyn Space<Vec<f32>>> {
        Box::new(self.obs_space.clone())
    }

    fn reward_range(&self) -> RewardRange {
        // worst case cost: pi^2 + 0.1 * 8^2 + 0.001 * 2^2
        RewardRange {
            low: -16.2736044,
            high: 0.0,
        }
    }

    fn render(&mut self) -> Option<RgbFrame> {
        match self.render_mode {
            RenderMode::RgbArray => self.draw(),
            RenderMode::None => None,
        }
    }

    fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    fn close(&mut self) {}
}

pub fn make_pendulum(
    max_steps: Option<usize>,
    render_mode: RenderMode,
) -> Box<dyn Env<Vec<f32>, Vec<f32>>> {
    // 200 is default for Pendulum
    let max_steps = max_steps.unwrap_or(200);

    let env = PendulumEnv::new(render_mode);
    let env = TimeLimitWrapper::new(Box::new(env), max_steps);

    Box::new(env)
}

#[cfg(test)]
mod test {
    use assert_approx_eq::assert_approx_eq;

    use crate::env::base::{Env, RenderMode};

    use super::{make_pendulum, PendulumEnv};

    #[test]
    fn test_make_env() {
        let mut env = make_pendulum(None, RenderMode::None);
        env.reset(None, None);

        let mut done = false;
        let mut steps = 0;

        while !done {
            let res = env.step(&env.action_space().sample());
            done = res.terminated | res.truncated;
            assert!(!res.terminated);
            steps += 1;
        }

        assert_eq!(steps, 200)
    }

    #[test]
    fn test_make_env_custom_steps() {
        let custom_steps = 10;
        let mut env = make_pendulum(Some(custom_steps), RenderMode::None);
        env.reset(None, None);

        let mut done = false;
        let mut steps = 0;

        while !done {
            let res = env.step(&env.action_space().sample());
            done = res.terminated | res.truncated;
            steps += 1;
        }

        assert_eq!(steps, custom_steps)
    }

    #[test]
    fn test_upright_at_rest_has_zero_cost() {
        let mut env = PendulumEnv::default();
        env.reset(None, None);
        env.state = [0.0, 0.0];

        let res = env.step(&vec![0.0]);
        assert_approx_eq!(res.reward, 0.0);
        assert_approx_eq!(res.obs[0], 1.0);
    }

    #[test]
    fn test_seeded_reset_is_reproducible() {
        let mut env = PendulumEnv::default();

        let a = env.reset(Some(7), None);
        let b = env.reset(Some(7), None);

        assert_eq!(a, b);
        assert!(env.observation_space().contains(&a));
    }

    #[test]
    fn test_render_modes() {
        let mut env = PendulumEnv::new(RenderMode::RgbArray);
        env.reset(None, None);

        let frame = env.render().unwrap();
        assert_eq!((frame.width, frame.height), (500, 500));
        assert_eq!(frame.data.len(), 500 * 500 * 3);

        let mut env = PendulumEnv::default();
        env.reset(None, None);
        assert!(env.render().is_none());
    }
}
