use crate::error::{Error, Result};

use super::{
    base::{Env, RenderMode},
    classic_control::{
        cartpole::make_cartpole, mountain_car::make_mountain_car,
        mountain_car_continuous::make_mountain_car_continuous, pendulum::make_pendulum,
    },
};

pub type ContinuousEnv = Box<dyn Env<Vec<f32>, Vec<f32>>>;
pub type DiscreteEnv = Box<dyn Env<Vec<f32>, usize>>;

/// Every environment id `make` understands
pub const ENV_IDS: [&str; 5] = [
    "CartPole-v0",
    "CartPole-v1",
    "MountainCar-v0",
    "MountainCarContinuous-v0",
    "Pendulum-v1",
];

/// A freshly made environment, split by action type
pub enum EnvHandle {
    Continuous(ContinuousEnv),
    Discrete(DiscreteEnv),
}

impl EnvHandle {
    pub fn action_kind(&self) -> &'static str {
        match self {
            EnvHandle::Continuous(_) => "continuous",
            EnvHandle::Discrete(_) => "discrete",
        }
    }
}

/// Builds a time-limited environment from its registered id
pub fn make(id: &str, render_mode: RenderMode) -> Result<EnvHandle> {
    let env = match id {
        "CartPole-v0" => EnvHandle::Discrete(make_cartpole(200, render_mode)),
        "CartPole-v1" => EnvHandle::Discrete(make_cartpole(500, render_mode)),
        "MountainCar-v0" => EnvHandle::Discrete(make_mountain_car(None, render_mode)),
        "MountainCarContinuous-v0" => {
            EnvHandle::Continuous(make_mountain_car_continuous(None, render_mode))
        }
        "Pendulum-v1" => EnvHandle::Continuous(make_pendulum(None, render_mode)),
        _ => return Err(Error::UnknownEnvironment(id.to_string())),
    };

    tracing::debug!("made {id} ({} actions)", env.action_kind());

    Ok(env)
}

#[cfg(test)]
mod test {
    use crate::env::base::RenderMode;

    use super::{make, EnvHandle, ENV_IDS};

    #[test]
    fn makes_every_registered_env() {
        for id in ENV_IDS {
            let handle = make(id, RenderMode::None).unwrap();
            match handle {
                EnvHandle::Continuous(mut env) => {
                    let obs = env.reset(Some(0), None);
                    assert!(env.observation_space().contains(&obs));
                }
                EnvHandle::Discrete(mut env) => {
                    let obs = env.reset(Some(0), None);
                    assert!(env.observation_space().contains(&obs));
                }
            }
        }
    }

    #[test]
    fn action_kinds() {
        assert_eq!(make("Pendulum-v1", RenderMode::None).unwrap().action_kind(), "continuous");
        assert_eq!(make("CartPole-v1", RenderMode::None).unwrap().action_kind(), "discrete");
    }

    #[test]
    fn unknown_env() {
        let err = make("Humanoid-v4", RenderMode::None).err().unwrap();
        assert!(err.to_string().contains("Humanoid-v4"));
    }
}
