use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

use burn::tensor::backend::AutodiffBackend;

use crate::{
    common::{
        algorithm::Algorithm,
        checkpoint::checkpoint_stem,
        logger::NullLogger,
        spaces::seed_spaces_rng,
    },
    config::RunConfig,
    env::{
        base::{Env, RenderMode},
        registry::EnvHandle,
        wrappers::RecordVideo,
    },
    error::Result,
    registry::{build_continuous, build_discrete, run_logger, AlgorithmId},
};

/// Builds an environment from its id. `env::registry::make` in production.
pub type EnvFactory<'a> = dyn Fn(&str, RenderMode) -> Result<EnvHandle> + 'a;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Train,
    /// Evaluate the checkpoint at the given path
    Test(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    IterationLimit,
    TimeBudget,
    Cancelled,
}

#[derive(Debug)]
pub struct TrainReport {
    pub iterations: usize,
    pub checkpoints: Vec<PathBuf>,
    pub stop: StopReason,
}

#[derive(Debug, Default)]
pub struct EpisodeReport {
    pub length: usize,
    pub total_reward: f32,
    pub video: Option<PathBuf>,
}

#[derive(Debug)]
pub enum RunOutcome {
    Trained(TrainReport),
    Evaluated(EpisodeReport),
    /// The test checkpoint did not exist; nothing was run
    CheckpointMissing(PathBuf),
}

/// Sets the returned flag on Ctrl-C. A second Ctrl-C exits the process.
pub fn cancel_on_ctrl_c() -> Result<Arc<AtomicBool>> {
    let cancel = Arc::new(AtomicBool::new(false));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let flag = cancel.clone();
    std::thread::spawn(move || {
        runtime.block_on(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if flag.swap(true, Ordering::SeqCst) {
                    tracing::warn!("interrupted twice, exiting");
                    std::process::exit(130);
                }
                tracing::warn!("interrupted, stopping after the current iteration");
            }
        })
    });

    Ok(cancel)
}

/// The cancellation flag for `mode`. Only training watches for Ctrl-C.
pub fn cancel_flag(mode: &Mode) -> Result<Arc<AtomicBool>> {
    match mode {
        Mode::Train => cancel_on_ctrl_c(),
        Mode::Test(_) => Ok(Arc::new(AtomicBool::new(false))),
    }
}

pub fn run<B: AutodiffBackend>(
    gymenv: &str,
    algo: AlgorithmId,
    mode: &Mode,
    config: &RunConfig,
    make_env: &EnvFactory<'_>,
    cancel: &AtomicBool,
    device: &B::Device,
) -> Result<RunOutcome> {
    if let Some(seed) = config.seed {
        seed_spaces_rng(seed);
    }
    config.prepare_dirs()?;

    match mode {
        Mode::Train => {
            train::<B>(gymenv, algo, config, make_env, cancel, device).map(RunOutcome::Trained)
        }
        Mode::Test(path) => Ok(
            match test::<B>(gymenv, algo, path, config, make_env, device)? {
                Some(report) => RunOutcome::Evaluated(report),
                None => RunOutcome::CheckpointMissing(path.clone()),
            },
        ),
    }
}

/// Trains a fresh model until a limit is hit or `cancel` is set,
/// writing `{model_dir}/{ALGO}_{timesteps}` after every iteration.
pub fn train<B: AutodiffBackend>(
    gymenv: &str,
    algo: AlgorithmId,
    config: &RunConfig,
    make_env: &EnvFactory<'_>,
    cancel: &AtomicBool,
    device: &B::Device,
) -> Result<TrainReport> {
    config.validate()?;
    config.prepare_dirs()?;

    let handle = make_env(gymenv, RenderMode::None)?;
    let logger = run_logger(config.log_dir(), algo)?;

    match handle {
        EnvHandle::Continuous(mut env) => {
            let mut model = build_continuous::<B>(algo, &*env, logger, config.seed, device)?;
            train_loop(&mut *model, &mut *env, algo, config, cancel)
        }
        EnvHandle::Discrete(mut env) => {
            let mut model = build_discrete::<B>(algo, &*env, logger, config.seed, device)?;
            train_loop(&mut *model, &mut *env, algo, config, cancel)
        }
    }
}

fn train_loop<A>(
    model: &mut dyn Algorithm<Vec<f32>, A>,
    env: &mut dyn Env<Vec<f32>, A>,
    algo: AlgorithmId,
    config: &RunConfig,
    cancel: &AtomicBool,
) -> Result<TrainReport> {
    let start = Instant::now();
    let mut iterations = 0;
    let mut checkpoints = Vec::new();

    let stop = loop {
        if cancel.load(Ordering::SeqCst) {
            break StopReason::Cancelled;
        }
        if config.max_iterations.is_some_and(|max| iterations >= max) {
            break StopReason::IterationLimit;
        }
        if config
            .time_budget()
            .is_some_and(|budget| start.elapsed() >= budget)
        {
            break StopReason::TimeBudget;
        }

        model.learn(env, config.timesteps_per_iteration, false)?;
        iterations += 1;

        let stem = checkpoint_stem(
            config.model_dir(),
            algo.name(),
            config.timesteps_per_iteration * iterations,
        );
        let path = model.save(&stem)?;
        tracing::info!("iteration {iterations}: saved {}", path.display());

        checkpoints.push(path);
    };

    tracing::info!("training stopped after {iterations} iterations ({stop:?})");
    env.close();

    Ok(TrainReport {
        iterations,
        checkpoints,
        stop,
    })
}

/// Plays one episode with the checkpoint at `path`, recording it to
/// `{video_dir}/test-video_{ALGO}-episode-0.gif`.
///
/// Returns `None`, having built nothing, when `path` does not exist.
pub fn test<B: AutodiffBackend>(
    gymenv: &str,
    algo: AlgorithmId,
    path: &Path,
    config: &RunConfig,
    make_env: &EnvFactory<'_>,
    device: &B::Device,
) -> Result<Option<EpisodeReport>> {
    if !path.is_file() {
        println!("{} not found.", path.display());
        return Ok(None);
    }

    let name_prefix = format!("test-video_{algo}");

    let report = match make_env(gymenv, RenderMode::RgbArray)? {
        EnvHandle::Continuous(env) => {
            let mut model =
                build_continuous::<B>(algo, &*env, Box::new(NullLogger), config.seed, device)?;
            let mut env = RecordVideo::new(env, config.video_dir(), &name_prefix, even_episodes())?
                .with_frame_delay(config.video_frame_delay_ms);
            play_episode(&mut *model, &mut env, path, config.seed)?
        }
        EnvHandle::Discrete(env) => {
            let mut model =
                build_discrete::<B>(algo, &*env, Box::new(NullLogger), config.seed, device)?;
            let mut env = RecordVideo::new(env, config.video_dir(), &name_prefix, even_episodes())?
                .with_frame_delay(config.video_frame_delay_ms);
            play_episode(&mut *model, &mut env, path, config.seed)?
        }
    };

    tracing::info!(
        "episode finished: {} steps, return {:.2}",
        report.length,
        report.total_reward
    );

    Ok(Some(report))
}

fn even_episodes() -> Box<dyn Fn(usize) -> bool> {
    Box::new(|episode| episode % 2 == 0)
}

fn play_episode<A>(
    model: &mut dyn Algorithm<Vec<f32>, A>,
    env: &mut RecordVideo<Vec<f32>, A>,
    checkpoint: &Path,
    seed: Option<u64>,
) -> Result<EpisodeReport> {
    model.load(checkpoint)?;

    let mut obs = env.reset(seed, None);
    env.start_video_recorder();

    let mut report = EpisodeReport::default();
    loop {
        let action = model.predict(&obs, false);
        let step = env.step(&action);

        report.length += 1;
        report.total_reward += step.reward;

        if step.done() {
            break;
        }
        obs = step.obs;
    }

    // the recorder must be finished before the env goes away
    env.close_video_recorder()?;
    report.video = env.recorded_videos().last().cloned();
    env.close();

    Ok(report)
}
