pub mod a2c;
pub mod cli;
pub mod common;
pub mod config;
pub mod dqn;
pub mod driver;
pub mod env;
pub mod error;
pub mod ppo;
pub mod registry;
pub mod sac;
pub mod td3;

pub use error::{Error, Result};
