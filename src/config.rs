use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use burn::{backend::Autodiff, config::Config, tensor::backend::Backend};

use crate::error::{self, Error};

#[cfg(feature = "wgpu")]
pub type RunBackend = Autodiff<burn::backend::Wgpu>;
#[cfg(not(feature = "wgpu"))]
pub type RunBackend = Autodiff<burn::backend::NdArray>;

/// Settings for one runner invocation
#[derive(Config, Debug)]
pub struct RunConfig {
    #[config(default = "String::from(\"models\")")]
    pub model_dir: String,
    #[config(default = "String::from(\"logs\")")]
    pub log_dir: String,
    #[config(default = "String::from(\"videos\")")]
    pub video_dir: String,
    /// Timesteps per `learn` call; one checkpoint is written after each
    #[config(default = 25_000)]
    pub timesteps_per_iteration: usize,
    pub max_iterations: Option<usize>,
    pub time_budget_secs: Option<u64>,
    pub seed: Option<u64>,
    #[config(default = 50)]
    pub video_frame_delay_ms: u32,
}

impl RunConfig {
    /// Reads a JSON config file
    pub fn from_file(path: &Path) -> error::Result<Self> {
        let config = Self::load(path)
            .map_err(|e| Error::Config(format!("could not read {}: {e:?}", path.display())))?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> error::Result<()> {
        if self.timesteps_per_iteration == 0 {
            return Err(Error::Config(
                "timesteps_per_iteration must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn model_dir(&self) -> &Path {
        Path::new(&self.model_dir)
    }

    pub fn log_dir(&self) -> &Path {
        Path::new(&self.log_dir)
    }

    pub fn video_dir(&self) -> &Path {
        Path::new(&self.video_dir)
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_secs.map(Duration::from_secs)
    }

    /// Creates the model and log directories. Safe to call repeatedly.
    pub fn prepare_dirs(&self) -> error::Result<Vec<PathBuf>> {
        let dirs = vec![self.model_dir().to_path_buf(), self.log_dir().to_path_buf()];
        for dir in &dirs {
            std::fs::create_dir_all(dir)?;
        }

        Ok(dirs)
    }
}

/// Where tensors live, fixed at build time by the `wgpu` feature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Cpu,
    Gpu,
}

impl DeviceKind {
    pub fn select() -> Self {
        if cfg!(feature = "wgpu") {
            DeviceKind::Gpu
        } else {
            DeviceKind::Cpu
        }
    }

    pub fn device(&self) -> <RunBackend as Backend>::Device {
        Default::default()
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::Cpu => f.write_str("cpu (ndarray)"),
            DeviceKind::Gpu => f.write_str("gpu (wgpu)"),
        }
    }
}

#[cfg(test)]
mod test {
    use burn::config::Config;
    use tempfile::TempDir;

    use super::{DeviceKind, RunConfig};

    #[test]
    fn defaults() {
        let config = RunConfig::new();

        assert_eq!(config.model_dir, "models");
        assert_eq!(config.log_dir, "logs");
        assert_eq!(config.video_dir, "videos");
        assert_eq!(config.timesteps_per_iteration, 25_000);
        assert!(config.max_iterations.is_none());
        assert!(config.time_budget().is_none());
    }

    #[test]
    fn prepare_dirs_is_idempotent() {
        let root = TempDir::new().unwrap();
        let config = RunConfig::new()
            .with_model_dir(root.path().join("m").display().to_string())
            .with_log_dir(root.path().join("l").display().to_string());

        config.prepare_dirs().unwrap();
        config.prepare_dirs().unwrap();

        assert!(root.path().join("m").is_dir());
        assert!(root.path().join("l").is_dir());
        assert!(!root.path().join("videos").exists());
    }

    #[test]
    fn file_round_trip() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("run.json");

        RunConfig::new()
            .with_max_iterations(Some(3))
            .with_seed(Some(7))
            .save(&path)
            .unwrap();

        let loaded = RunConfig::from_file(&path).unwrap();
        assert_eq!(loaded.max_iterations, Some(3));
        assert_eq!(loaded.seed, Some(7));
        assert_eq!(loaded.timesteps_per_iteration, 25_000);
    }

    #[test]
    fn rejects_empty_iterations() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("run.json");
        RunConfig::new()
            .with_timesteps_per_iteration(0)
            .save(&path)
            .unwrap();

        assert!(RunConfig::from_file(&path).is_err());
        assert!(RunConfig::from_file(&root.path().join("missing.json")).is_err());
    }

    #[test]
    fn device_matches_features() {
        assert_eq!(DeviceKind::select() == DeviceKind::Gpu, cfg!(feature = "wgpu"));
    }
}
