use burn::config::Config;

pub mod agent;
pub mod models;

pub use agent::TD3Agent;

#[derive(Config)]
pub struct TD3Config {
    /// Polyak coefficient for both target networks
    #[config(default = 0.005)]
    pub tau: f32,
    /// Critic updates per actor and target update
    #[config(default = 2)]
    pub policy_delay: usize,
    /// Std of the smoothing noise added to target actions
    #[config(default = 0.2)]
    pub target_policy_noise: f32,
    #[config(default = 0.5)]
    pub target_noise_clip: f32,
    #[config(default = 2)]
    pub n_critics: usize,
    /// Std of gaussian exploration noise, in the `[-1, 1]` action scale
    pub action_noise: Option<f32>,
    #[config(default = "vec![400, 300]")]
    pub net_arch: Vec<usize>,
}

impl TD3Config {
    /// DDPG: a single critic, no target smoothing and no update delay
    pub fn ddpg() -> Self {
        Self::new()
            .with_policy_delay(1)
            .with_target_policy_noise(0.0)
            .with_target_noise_clip(0.0)
            .with_n_critics(1)
    }
}

#[cfg(test)]
mod test {
    use super::TD3Config;

    #[test]
    fn ddpg_preset() {
        let td3 = TD3Config::new();
        assert_eq!((td3.n_critics, td3.policy_delay), (2, 2));

        let ddpg = TD3Config::ddpg();
        assert_eq!((ddpg.n_critics, ddpg.policy_delay), (1, 1));
        assert_eq!(ddpg.target_policy_noise, 0.0);
        assert_eq!(ddpg.net_arch, vec![400, 300]);
    }
}
