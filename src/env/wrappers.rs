use std::path::{Path, PathBuf};

use crate::{
    common::spaces::Space,
    error::{Error, Result},
};

use super::{
    base::{Env, EnvObservation, RenderMode, ResetOptions, RewardRange, RgbFrame},
    video::VideoRecorder,
};

pub struct TimeLimitWrapper<O, A> {
    env: Box<dyn Env<O, A>>,
    max_steps: usize,
    curr_steps: usize,
}

impl<O, A> TimeLimitWrapper<O, A> {
    pub fn new(env: Box<dyn Env<O, A>>, max_steps: usize) -> Self {
        Self {
            env,
            max_steps,
            curr_steps: 0,
        }
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }
}

impl<O, A> Env<O, A> for TimeLimitWrapper<O, A> {
    fn step(&mut self, action: &A) -> EnvObservation<O> {
        let mut step_result = self.env.step(action);

        self.curr_steps += 1;
        step_result.truncated |= self.curr_steps >= self.max_steps;

        step_result
    }

    fn reset(&mut self, seed: Option<u64>, options: Option<ResetOptions>) -> O {
        self.curr_steps = 0;

        self.env.reset(seed, options)
    }

    fn action_space(&self) -> Box<dyn Space<A>> {
        self.env.action_space()
    }

    fn observation_space(&self) -> Box<dyn Space<O>> {
        self.env.observation_space()
    }

    fn reward_range(&self) -> RewardRange {
        self.env.reward_range()
    }

    fn render(&mut self) -> Option<RgbFrame> {
        self.env.render()
    }

    fn render_mode(&self) -> RenderMode {
        self.env.render_mode()
    }

    fn close(&mut self) {
        self.env.close()
    }
}

/// Decides from the episode index whether an episode is recorded
pub type EpisodeTrigger = Box<dyn Fn(usize) -> bool>;

/// Records rendered episodes to `{video_folder}/{name_prefix}-episode-{id}.gif`.
///
/// An episode is recorded when `episode_trigger(episode_id)` holds at
/// reset. Recording stops by itself when the episode ends. Encoding
/// errors raised inside `step`/`reset` are kept and returned by the next
/// call to [`RecordVideo::close_video_recorder`].
pub struct RecordVideo<O, A> {
    env: Box<dyn Env<O, A>>,
    video_folder: PathBuf,
    name_prefix: String,
    episode_trigger: EpisodeTrigger,
    frame_delay_ms: u32,

    episode_id: usize,
    recorder: Option<VideoRecorder>,
    recorded: Vec<PathBuf>,
    pending_error: Option<Error>,
}

impl<O, A> RecordVideo<O, A> {
    pub fn new(
        env: Box<dyn Env<O, A>>,
        video_folder: &Path,
        name_prefix: &str,
        episode_trigger: EpisodeTrigger,
    ) -> Result<Self> {
        if env.render_mode() != RenderMode::RgbArray {
            return Err(Error::Video(
                "video recording needs an environment rendering RGB frames".to_string(),
            ));
        }

        std::fs::create_dir_all(video_folder)?;

        Ok(Self {
            env,
            video_folder: video_folder.to_path_buf(),
            name_prefix: name_prefix.to_string(),
            episode_trigger,
            frame_delay_ms: 50,
            episode_id: 0,
            recorder: None,
            recorded: Vec::new(),
            pending_error: None,
        })
    }

    pub fn with_frame_delay(mut self, frame_delay_ms: u32) -> Self {
        self.frame_delay_ms = frame_delay_ms;
        self
    }

    pub fn episode_id(&self) -> usize {
        self.episode_id
    }

    pub fn recording(&self) -> bool {
        self.recorder.is_some()
    }

    /// Paths of every video written so far
    pub fn recorded_videos(&self) -> &[PathBuf] {
        &self.recorded
    }

    pub fn video_path(&self, episode_id: usize) -> PathBuf {
        self.video_folder
            .join(format!("{}-episode-{episode_id}.gif", self.name_prefix))
    }

    /// Starts recording the current episode. Does nothing if already recording.
    pub fn start_video_recorder(&mut self) {
        if self.recorder.is_some() {
            return;
        }

        let mut recorder = VideoRecorder::new(self.video_path(self.episode_id), self.frame_delay_ms);
        if let Some(frame) = self.env.render() {
            recorder.capture_frame(frame);
        }

        tracing::debug!("recording episode {} to {:?}", self.episode_id, recorder.path());
        self.recorder = Some(recorder);
    }

    /// Stops the current recording, writing the video out.
    ///
    /// Also surfaces any error from a recording that stopped by itself.
    pub fn close_video_recorder(&mut self) -> Result<Option<PathBuf>> {
        if let Some(e) = self.pending_error.take() {
            self.recorder = None;
            return Err(e);
        }

        match self.recorder.take() {
            Some(recorder) => {
                let written = recorder.close()?;
                if let Some(path) = &written {
                    self.recorded.push(path.clone());
                }
                Ok(written)
            }
            None => Ok(None),
        }
    }

    fn close_deferred(&mut self) {
        if let Err(e) = self.close_video_recorder() {
            tracing::warn!("video recording failed: {e}");
            self.pending_error = Some(e);
        }
    }
}

impl<O, A> Env<O, A> for RecordVideo<O, A> {
    fn step(&mut self, action: &A) -> EnvObservation<O> {
        let step_result = self.env.step(action);

        if self.recorder.is_some() {
            if let Some(frame) = self.env.render() {
                if let Some(recorder) = self.recorder.as_mut() {
                    recorder.capture_frame(frame);
                }
            }
        }

        if step_result.done() {
            if self.recorder.is_some() {
                self.close_deferred();
            }
            self.episode_id += 1;
        }

        step_result
    }

    fn reset(&mut self, seed: Option<u64>, options: Option<ResetOptions>) -> O {
        if self.recorder.is_some() {
            self.close_deferred();
        }

        let obs = self.env.reset(seed, options);

        if (self.episode_trigger)(self.episode_id) {
            self.start_video_recorder();
        }

        obs
    }

    fn action_space(&self) -> Box<dyn Space<A>> {
        self.env.action_space()
    }

    fn observation_space(&self) -> Box<dyn Space<O>> {
        self.env.observation_space()
    }

    fn reward_range(&self) -> RewardRange {
        self.env.reward_range()
    }

    fn render(&mut self) -> Option<RgbFrame> {
        self.env.render()
    }

    fn render_mode(&self) -> RenderMode {
        self.env.render_mode()
    }

    fn close(&mut self) {
        if self.recorder.is_some() {
            self.close_deferred();
        }

        self.env.close()
    }
}
