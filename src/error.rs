use std::path::PathBuf;

use thiserror::Error;

use crate::registry::AlgorithmId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown algorithm `{0}`, expected one of: A2C, DDPG, DQN, PPO, SAC, TD3")]
    UnknownAlgorithm(String),

    #[error("unknown environment id `{0}`")]
    UnknownEnvironment(String),

    #[error("{algo} does not support {space} action spaces")]
    UnsupportedActionSpace {
        algo: AlgorithmId,
        space: &'static str,
    },

    #[error("checkpoint {path:?}: {reason}")]
    Checkpoint { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("video recording failed: {0}")]
    Video(String),

    #[error("logger: {0}")]
    Logger(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
