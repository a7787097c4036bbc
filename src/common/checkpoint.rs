use std::path::{Path, PathBuf};

use burn::{
    module::{Module, ParamId},
    optim::record::AdaptorRecord,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Record, Recorder},
    tensor::backend::Backend,
};
use hashbrown::HashMap;

use crate::error::{Error, Result};

pub const CHECKPOINT_EXTENSION: &str = "mpk";

pub type CheckpointRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// What `Optimizer::to_record` gives for an `OptimizerAdaptor`
pub type OptimizerRecord<O, B> = HashMap<ParamId, AdaptorRecord<O, B>>;

/// `{dir}/{algo}_{timesteps}`; the recorder appends the extension
pub fn checkpoint_stem(dir: &Path, algo: &str, timesteps: usize) -> PathBuf {
    dir.join(format!("{algo}_{timesteps}"))
}

/// The file the recorder writes for `stem`
pub fn checkpoint_file(stem: &Path) -> PathBuf {
    stem.with_extension(CHECKPOINT_EXTENSION)
}

/// Finds the checkpoint file a user path refers to, accepting the
/// path either as written or without its extension.
pub fn resolve_checkpoint(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }

    let mut with_ext = path.as_os_str().to_owned();
    with_ext.push(".");
    with_ext.push(CHECKPOINT_EXTENSION);
    let with_ext = PathBuf::from(with_ext);

    with_ext.is_file().then_some(with_ext)
}

/// Writes `module` and `extra` (optimizer state, usually) to one file
pub fn save_checkpoint<B, M, R>(module: M, extra: R, path: &Path) -> Result<PathBuf>
where
    B: Backend,
    M: Module<B>,
    R: Record<B>,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    Recorder::<B>::record(
        &CheckpointRecorder::new(),
        (module.into_record(), extra),
        path.to_path_buf(),
    )
    .map_err(|e| Error::Checkpoint {
        path: path.to_path_buf(),
        reason: format!("{e:?}"),
    })?;

    Ok(checkpoint_file(path))
}

/// Reads a file written by [`save_checkpoint`] into `module`
pub fn load_checkpoint<B, M, R>(module: M, path: &Path, device: &B::Device) -> Result<(M, R)>
where
    B: Backend,
    M: Module<B>,
    R: Record<B>,
{
    let file = resolve_checkpoint(path).ok_or_else(|| Error::Checkpoint {
        path: path.to_path_buf(),
        reason: "file not found".to_string(),
    })?;

    let (record, extra): (M::Record, R) =
        Recorder::<B>::load(&CheckpointRecorder::new(), file.clone(), device).map_err(|e| {
            Error::Checkpoint {
                path: file,
                reason: format!("{e:?}"),
            }
        })?;

    Ok((module.load_record(record), extra))
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use burn::{
        backend::{Autodiff, NdArray},
        nn::{Linear, LinearConfig},
        optim::{AdamConfig, GradientsParams, Optimizer},
        tensor::Tensor,
    };

    use super::{checkpoint_stem, load_checkpoint, resolve_checkpoint, save_checkpoint};

    type B = NdArray;
    type AB = Autodiff<NdArray>;

    #[test]
    fn stem_naming() {
        assert_eq!(
            checkpoint_stem(Path::new("models"), "SAC", 50000),
            Path::new("models/SAC_50000")
        );
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let stem = checkpoint_stem(&dir.path().join("models"), "TD3", 25000);

        let saved: Linear<B> = LinearConfig::new(3, 2).init(&device);
        let file = save_checkpoint::<B, _, _>(saved.clone(), (), &stem).unwrap();
        assert!(file.is_file());
        assert_eq!(file.extension().unwrap(), "mpk");

        assert_eq!(resolve_checkpoint(&stem), Some(file.clone()));
        assert_eq!(resolve_checkpoint(&file), Some(file.clone()));

        let fresh: Linear<B> = LinearConfig::new(3, 2).init(&device);
        let (loaded, ()) = load_checkpoint::<B, _, ()>(fresh, &file, &device).unwrap();

        let diff: f32 = (loaded.weight.val() - saved.weight.val())
            .abs()
            .sum()
            .into_scalar();
        assert!(diff < 1e-6);
    }

    #[test]
    fn optimizer_state_shares_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let stem = checkpoint_stem(dir.path(), "DQN", 10);

        let model: Linear<AB> = LinearConfig::new(3, 2).init(&device);
        let mut optim = AdamConfig::new().init();
        let loss = model.forward(Tensor::<AB, 2>::ones([4, 3], &device)).sum();
        let grads = GradientsParams::from_grads(loss.backward(), &model);
        let model = optim.step(1e-3, model, grads);

        save_checkpoint::<AB, _, _>(model.clone(), optim.to_record(), &stem).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        let fresh: Linear<AB> = LinearConfig::new(3, 2).init(&device);
        let (loaded, record) = load_checkpoint::<AB, _, _>(fresh, &stem, &device).unwrap();
        let restored = AdamConfig::new().init::<AB, Linear<AB>>().load_record(record);

        assert_eq!(restored.to_record().len(), 2);
        assert_eq!(loaded.weight.id, model.weight.id);
    }

    #[test]
    fn load_missing() {
        let dir = tempfile::tempdir().unwrap();
        let fresh: Linear<B> = LinearConfig::new(3, 2).init(&Default::default());

        let missing = dir.path().join("nope");
        assert!(load_checkpoint::<B, _, ()>(fresh, &missing, &Default::default()).is_err());
        assert_eq!(resolve_checkpoint(&dir.path().join("nope")), None);
    }
}
