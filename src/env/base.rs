use std::collections::HashMap;

use crate::common::{logger::LogData, spaces::Space};

#[derive(Debug, Clone, PartialEq)]
pub enum InfoData {
    String(String),
    Float(f32),
    Int(i32),
}

pub type ResetOptions = HashMap<String, LogData>;
pub type Info = HashMap<String, InfoData>;

#[derive(Clone, Debug)]
pub struct EnvObservation<O> {
    pub obs: O,
    pub reward: f32,
    pub terminated: bool,
    pub truncated: bool,
    pub info: Info,
}

impl<O> EnvObservation<O> {
    pub fn done(&self) -> bool {
        self.terminated | self.truncated
    }
}

#[derive(Clone, Debug, Copy)]
pub struct RewardRange {
    pub low: f32,
    pub high: f32,
}

/// How an environment should answer `render`
#[derive(Clone, Debug, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    None,
    RgbArray,
}

/// A single rendered frame, row-major RGB8
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

pub trait Env<O, A> {
    fn step(&mut self, action: &A) -> EnvObservation<O>;
    fn reset(&mut self, seed: Option<u64>, options: Option<ResetOptions>) -> O;
    fn action_space(&self) -> Box<dyn Space<A>>;
    fn observation_space(&self) -> Box<dyn Space<O>>;
    fn reward_range(&self) -> RewardRange;

    /// The current frame, if the env was built with `RenderMode::RgbArray`
    fn render(&mut self) -> Option<RgbFrame>;
    fn render_mode(&self) -> RenderMode;
    fn close(&mut self);
}
