use plotters::prelude::*;
use rand::{rngs::StdRng, Rng};

use crate::{
    common::spaces::{BoxSpace, Discrete, Space},
    env::{
        base::{Env, EnvObservation, RenderMode, ResetOptions, RewardRange, RgbFrame},
        render::{render_frame, DrawResult},
        wrappers::TimeLimitWrapper,
    },
};

use super::{flip_y, reset_rng};

pub const MIN_POSITION: f32 = -1.2;
pub const MAX_POSITION: f32 = 0.6;
pub const MAX_SPEED: f32 = 0.07;

const SCREEN_WIDTH: u32 = 600;
const SCREEN_HEIGHT: u32 = 400;

/// Hill profile shared by both mountain car variants
pub(crate) fn height(xs: f32) -> f32 {
    (3.0 * xs).sin() * 0.45 + 0.55
}

/// Starting state shared by both mountain car variants
pub(crate) fn initial_state(rng: &mut StdRng) -> [f32; 2] {
    [rng.random_range(-0.6..=-0.4), 0.0]
}

pub(crate) fn observation_space() -> BoxSpace<Vec<f32>> {
    BoxSpace::from((
        vec![MIN_POSITION, -MAX_SPEED],
        vec![MAX_POSITION, MAX_SPEED],
    ))
}

/// Draws the track, the car and the goal flag
pub(crate) fn draw_mountain_car(position: f32, goal_position: f32) -> Option<RgbFrame> {
    let world_width = MAX_POSITION - MIN_POSITION;
    let scale = SCREEN_WIDTH as f32 / world_width;
    let h = SCREEN_HEIGHT;
    let to_screen = |x: f32, y: f32| ((x - MIN_POSITION) * scale, y * scale);

    let track: Vec<(i32, i32)> = (0..100)
        .map(|i| {
            let x = MIN_POSITION + world_width * i as f32 / 99.0;
            let (sx, sy) = to_screen(x, height(x));
            (sx.round() as i32, flip_y(sy, h))
        })
        .collect();

    let (cx, cy) = to_screen(position, height(position));
    let car = (cx.round() as i32, flip_y(cy + 10.0, h));

    let (fx, fy) = to_screen(goal_position, height(goal_position));
    let flag_x = fx.round() as i32;
    let flag_base = flip_y(fy, h);
    let flag_top = flip_y(fy + 50.0, h);

    render_frame(SCREEN_WIDTH, SCREEN_HEIGHT, |root| -> DrawResult {
        root.fill(&WHITE)?;
        root.draw(&PathElement::new(track, BLACK.stroke_width(2)))?;
        root.draw(&Circle::new(car, 10, BLACK.filled()))?;
        root.draw(&PathElement::new(
            vec![(flag_x, flag_base), (flag_x, flag_top)],
            BLACK.stroke_width(1),
        ))?;
        root.draw(&Polygon::new(
            vec![
                (flag_x, flag_top),
                (flag_x, flag_top + 10),
                (flag_x + 25, flag_top + 5),
            ],
            RGBColor(204, 204, 0).filled(),
        ))?;
        Ok(())
    })
}

pub struct MountainCarEnv {
    goal_position: f32,
    goal_velocity: f32,
    force: f32,
    gravity: f32,
    render_mode: RenderMode,

    // position, velocity
    state: [f32; 2],
    rng: StdRng,
}

impl MountainCarEnv {
    pub fn new(render_mode: RenderMode) -> Self {
        Self {
            goal_position: 0.5,
            goal_velocity: 0.0,
            force: 0.001,
            gravity: 0.0025,
            render_mode,
            state: [0.0, 0.0],
            rng: reset_rng(None),
        }
    }
}

impl Default for MountainCarEnv {
    fn default() -> Self {
        Self::new(RenderMode::None)
    }
}

impl Env<Vec<f32>, usize> for MountainCarEnv {
    fn step(&mut self, action: &usize) -> EnvObservation<Vec<f32>> {
        assert!(*action < 3, "invalid mountain car action {action}");

        let [mut p, mut v] = self.state;

        v += (*action as f32 - 1.0) * self.force + (3.0 * p).cos() * (-self.gravity);
        v = v.clamp(-MAX_SPEED, MAX_SPEED);
        p += v;
        p = p.clamp(MIN_POSITION, MAX_POSITION);

        if p <= MIN_POSITION && v < 0.0 {
            v = 0.0;
        }

        let terminated = p >= self.goal_position && v >= self.goal_velocity;
        self.state = [p, v];

        EnvObservation {
            obs: self.state.to_vec(),
            reward: -1.0,
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

    fn action_space(&self) -> Box<dyn Space<usize>> {
        Box::new(Discrete::from(3))
    }

    fn observation_space(&self) -> Box<dyn Space<Vec<f32>>> {
        Box::new(observation_space())
    }

    fn reward_range(&self) -> RewardRange {
        RewardRange {
            low: -1.0,
            high: -1.0,
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

pub fn make_mountain_car(
    max_steps: Option<usize>,
    render_mode: RenderMode,
) -> Box<dyn Env<Vec<f32>, usize>> {
    Box::new(TimeLimitWrapper::new(
        Box::new(MountainCarEnv::new(render_mode)),
        max_steps.unwrap_or(200),
    ))
}

#[cfg(test)]
mod test {
    use crate::env::base::{Env, RenderMode};

    use super::{make_mountain_car, MountainCarEnv, MIN_POSITION};

    #[test]
    fn test_idle_episode_truncates() {
        let mut env = make_mountain_car(None, RenderMode::None);
        env.reset(Some(0), None);

        let mut steps = 0;
        let mut total = 0.0;
        loop {
            let res = env.step(&1);
            steps += 1;
            total += res.reward;
            if res.done() {
                assert!(res.truncated && !res.terminated);
                break;
            }
        }

        assert_eq!(steps, 200);
        assert_eq!(total, -200.0);
    }

    #[test]
    fn test_left_wall_stops_car() {
        let mut env = MountainCarEnv::default();
        env.reset(None, None);
        env.state = [MIN_POSITION, -0.05];

        let res = env.step(&0);
        assert_eq!(res.obs, vec![MIN_POSITION, 0.0]);
    }

    #[test]
    fn test_reaching_goal_terminates() {
        let mut env = MountainCarEnv::default();
        env.reset(None, None);
        env.state = [0.49, 0.05];

        assert!(env.step(&2).terminated);
    }

    #[test]
    fn test_render() {
        let mut env = MountainCarEnv::new(RenderMode::RgbArray);
        env.reset(None, None);

        assert!(env.render().is_some());
    }
}
