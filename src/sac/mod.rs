use burn::config::Config;

pub mod agent;
pub mod models;

pub use agent::SACAgent;

#[derive(Config)]
pub struct SACConfig {
    /// Polyak coefficient for the target critics
    #[config(default = 0.005)]
    pub tau: f32,
    #[config(default = 1)]
    pub target_update_interval: usize,
    #[config(default = 2)]
    pub n_critics: usize,
    /// Starting entropy coefficient, or the fixed one when not trained
    #[config(default = 1.0)]
    pub ent_coef_init: f32,
    #[config(default = true)]
    pub train_ent_coef: bool,
    /// Defaults to `-action_dim`
    pub target_entropy: Option<f32>,
    #[config(default = "vec![256, 256]")]
    pub net_arch: Vec<usize>,
}
