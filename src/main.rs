use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sb3_runner::{
    cli::Cli,
    config::{DeviceKind, RunBackend},
    driver::{self, RunOutcome},
    env::registry::make,
};

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Cli::parse();
    let config = args.run_config()?;

    let device_kind = DeviceKind::select();
    let device = device_kind.device();
    tracing::info!("{} on {} using {device_kind}", args.sb3_algo, args.gymenv);

    let mode = args.mode();
    let cancel = driver::cancel_flag(&mode)?;

    let outcome = driver::run::<RunBackend>(
        &args.gymenv,
        args.sb3_algo,
        &mode,
        &config,
        &make,
        &cancel,
        &device,
    )?;

    match outcome {
        RunOutcome::Trained(report) => tracing::info!(
            "{} checkpoints written, stopped by {:?}",
            report.checkpoints.len(),
            report.stop
        ),
        RunOutcome::Evaluated(report) => {
            if let Some(video) = report.video {
                tracing::info!("video saved to {}", video.display());
            }
        }
        RunOutcome::CheckpointMissing(_) => {}
    }

    Ok(())
}
