use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use crate::{config::RunConfig, driver::Mode, error::Result, registry::AlgorithmId};

fn parse_algorithm(s: &str) -> std::result::Result<AlgorithmId, String> {
    s.parse::<AlgorithmId>().map_err(|e| e.to_string())
}

/// Train or test a Stable-Baselines3 style agent
#[derive(Debug, Parser)]
#[command(name = "sb3-runner")]
#[command(version)]
#[command(group(ArgGroup::new("mode").required(true).args(["train", "test"])))]
pub struct Cli {
    /// Environment id, e.g. Pendulum-v1
    pub gymenv: String,

    /// One of A2C, DDPG, DQN, PPO, SAC, TD3
    #[arg(value_parser = parse_algorithm)]
    pub sb3_algo: AlgorithmId,

    /// Train a fresh model, checkpointing every iteration
    #[arg(short = 't', long)]
    pub train: bool,

    /// Evaluate the checkpoint at this path for one episode
    #[arg(short = 's', long, value_name = "PATH_TO_MODEL")]
    pub test: Option<PathBuf>,

    /// Stop training after this many iterations
    #[arg(long)]
    pub iterations: Option<usize>,

    /// JSON run config; command line flags take precedence
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        match &self.test {
            Some(path) => Mode::Test(path.clone()),
            None => Mode::Train,
        }
    }

    pub fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)?,
            None => RunConfig::new(),
        };

        if self.iterations.is_some() {
            config.max_iterations = self.iterations;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use clap::Parser;

    use crate::{driver::Mode, registry::AlgorithmId};

    use super::Cli;

    #[test]
    fn parses_train() {
        let cli = Cli::try_parse_from(["sb3-runner", "Pendulum-v1", "TD3", "--train"]).unwrap();

        assert_eq!(cli.gymenv, "Pendulum-v1");
        assert_eq!(cli.sb3_algo, AlgorithmId::TD3);
        assert_eq!(cli.mode(), Mode::Train);
        assert!(cli.run_config().unwrap().max_iterations.is_none());
    }

    #[test]
    fn parses_test() {
        let cli =
            Cli::try_parse_from(["sb3-runner", "Pendulum-v1", "SAC", "-s", "./models/SAC_450000.zip"])
                .unwrap();

        assert_eq!(
            cli.mode(),
            Mode::Test(PathBuf::from("./models/SAC_450000.zip"))
        );
    }

    #[test]
    fn iterations_override() {
        let cli =
            Cli::try_parse_from(["sb3-runner", "CartPole-v1", "PPO", "-t", "--iterations", "2"])
                .unwrap();

        assert_eq!(cli.run_config().unwrap().max_iterations, Some(2));
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let err = Cli::try_parse_from(["sb3-runner", "Pendulum-v1", "TRPO", "-t"]).unwrap_err();

        assert!(err.to_string().contains("TRPO"));
        assert!(err.to_string().contains("A2C, DDPG, DQN, PPO, SAC, TD3"));
    }

    #[test]
    fn exactly_one_mode() {
        assert!(Cli::try_parse_from(["sb3-runner", "Pendulum-v1", "SAC"]).is_err());
        assert!(Cli::try_parse_from(["sb3-runner", "Pendulum-v1", "SAC", "-t", "-s", "m.mpk"]).is_err());
    }
}
