use plotters::prelude::*;
use rand::{rngs::StdRng, Rng};

use crate::{
    common::spaces::{BoxSpace, Discrete, Space},
    env::{
        base::{Env, EnvObservation, RenderMode, ResetOptions, RewardRange, RgbFrame},
        render::render_frame,
        wrappers::TimeLimitWrapper,
    },
};

use super::{flip_y, reset_rng};

const SCREEN_WIDTH: u32 = 600;
const SCREEN_HEIGHT: u32 = 400;

pub struct CartpoleEnv {
    gravity: f32,
    masspole: f32,
    total_mass: f32,
    length: f32,
    polemass_length: f32,
    force_mag: f32,
    tau: f32,
    theta_threshold_radians: f32,
    x_threshold: f32,
    obs_space: BoxSpace<Vec<f32>>,
    render_mode: RenderMode,

    // x, x_dot, theta, theta_dot
    state: [f32; 4],
    steps_beyond_terminated: Option<usize>,
    rng: StdRng,
}

impl CartpoleEnv {
    pub fn new(render_mode: RenderMode) -> Self {
        let masscart = 1.0;
        let masspole = 0.1;
        let length = 0.5;
        let theta_threshold_radians = 12.0 * 2.0 * std::f32::consts::PI / 360.0;
        let x_threshold = 2.4;

        let high = vec![
            x_threshold * 2.0,
            f32::MAX,
            theta_threshold_radians * 2.0,
            f32::MAX,
        ];
        let low = high.iter().map(|h| -h).collect();

        Self {
            gravity: 9.8,
            masspole,
            total_mass: masscart + masspole,
            length,
            polemass_length: masspole * length,
            force_mag: 10.0,
            tau: 0.02,
            theta_threshold_radians,
            x_threshold,
            obs_space: BoxSpace::from((low, high)),
            render_mode,
            state: [0.0; 4],
            steps_beyond_terminated: None,
            rng: reset_rng(None),
        }
    }

    fn draw(&self) -> Option<RgbFrame> {
        let world_width = self.x_threshold * 2.0;
        let scale = SCREEN_WIDTH as f32 / world_width;
        let polewidth = 10.0;
        let polelen = scale * (2.0 * self.length);
        let cartwidth = 50.0;
        let cartheight = 30.0;
        let carty = 100.0;

        let [x, _, theta, _] = self.state;
        let cartx = x * scale + SCREEN_WIDTH as f32 / 2.0;
        let h = SCREEN_HEIGHT;

        let cart = [
            (cartx - cartwidth / 2.0, carty - cartheight / 2.0),
            (cartx + cartwidth / 2.0, carty + cartheight / 2.0),
        ];
        let axle = (cartx, carty + cartheight / 4.0);

        // pole corners rotated by -theta about the axle
        let (l, r, t, b) = (
            -polewidth / 2.0,
            polewidth / 2.0,
            polelen - polewidth / 2.0,
            -polewidth / 2.0,
        );
        let pole: Vec<(i32, i32)> = [(l, b), (l, t), (r, t), (r, b)]
            .iter()
            .map(|&(px, py)| {
                let (s, c) = (-theta).sin_cos();
                let rx = px * c - py * s + axle.0;
                let ry = px * s + py * c + axle.1;
                (rx.round() as i32, flip_y(ry, h))
            })
            .collect();

        render_frame(SCREEN_WIDTH, SCREEN_HEIGHT, |root| {
            root.fill(&WHITE)?;
            root.draw(&Rectangle::new(
                [
                    (cart[0].0.round() as i32, flip_y(cart[1].1, h)),
                    (cart[1].0.round() as i32, flip_y(cart[0].1, h)),
                ],
                BLACK.filled(),
            ))?;
            root.draw(&Polygon::new(pole, RGBColor(202, 152, 101).filled()))?;
            root.draw(&Circle::new(
                (axle.0.round() as i32, flip_y(axle.1, h)),
                (polewidth / 2.0) as i32,
                RGBColor(129, 132, 203).filled(),
            ))?;
            root.draw(&PathElement::new(
                vec![(0, flip_y(carty, h)), (SCREEN_WIDTH as i32, flip_y(carty, h))],
                BLACK.stroke_width(1),
            ))?;
            Ok(())
        })
    }
}

impl Default for CartpoleEnv {
    fn default() -> Self {
        Self::new(RenderMode::None)
    }
}

impl Env<Vec<f32>, usize> for CartpoleEnv {
    fn step(&mut self, action: &usize) -> EnvObservation<Vec<f32>> {
        assert!(*action < 2, "invalid cartpole action {action}");

        let [x, x_dot, theta, theta_dot] = self.state;
        let force = if *action == 1 {
            self.force_mag
        } else {
            -self.force_mag
        };
        let (sintheta, costheta) = theta.sin_cos();

        let temp =
            (force + self.polemass_length * theta_dot.powi(2) * sintheta) / self.total_mass;
        let thetaacc = (self.gravity * sintheta - costheta * temp)
            / (self.length
                * (4.0 / 3.0 - self.masspole * costheta.powi(2) / self.total_mass));
        let xacc = temp - self.polemass_length * thetaacc * costheta / self.total_mass;

        // euler integration
        self.state = [
            x + self.tau * x_dot,
            x_dot + self.tau * xacc,
            theta + self.tau * theta_dot,
            theta_dot + self.tau * thetaacc,
        ];

        let [x, _, theta, _] = self.state;
        let terminated = x < -self.x_threshold
            || x > self.x_threshold
            || theta < -self.theta_threshold_radians
            || theta > self.theta_threshold_radians;

        let reward = match (terminated, self.steps_beyond_terminated) {
            (false, _) => 1.0,
            (true, None) => {
                self.steps_beyond_terminated = Some(0);
                1.0
            }
            (true, Some(n)) => {
                if n == 0 {
                    tracing::warn!(
                        "CartPole stepped after termination; call reset before stepping again"
                    );
                }
                self.steps_beyond_terminated = Some(n + 1);
                0.0
            }
        };

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

        for s in self.state.iter_mut() {
            *s = self.rng.random_range(-0.05..=0.05);
        }
        self.steps_beyond_terminated = None;

        self.state.to_vec()
    }

    fn action_space(&self) -> Box<dyn Space<usize>> {
        Box::new(Discrete::from(2))
    }

    fn observation_space(&self) -> Box<dyn Space<Vec<f32>>> {
        Box::new(self.obs_space.clone())
    }

    fn reward_range(&self) -> RewardRange {
        RewardRange {
            low: 0.0,
            high: 1.0,
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

/// `CartPole-v1` uses 500 steps, `CartPole-v0` 200
pub fn make_cartpole(max_steps: usize, render_mode: RenderMode) -> Box<dyn Env<Vec<f32>, usize>> {
    Box::new(TimeLimitWrapper::new(
        Box::new(CartpoleEnv::new(render_mode)),
        max_steps,
    ))
}
