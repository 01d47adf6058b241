// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores training state using Burn's CompactRecorder.
//
// What gets saved per checkpoint step:
//   1. model-{step}.mpk.gz      — all model parameters
//   2. optimizer-{step}.mpk.gz  — Adam moment estimates
//   3. latest_step.json         — which step was last saved
//
// Saved once per run:
//   train_config.json           — run hyperparameters
//   model_config.json           — architecture (needed to rebuild
//                                 the model before loading weights)
//
// Burn's CompactRecorder:
//   - Serialises records to MessagePack, gzip compressed
//   - Appends the .mpk.gz extension itself
//   - Type-safe: loading fails if the architecture doesn't match
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, path::PathBuf};
use burn::{
    optim::Optimizer,
    prelude::*,
    record::{CompactRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};

use crate::ml::model::AutoVc;

pub const TRAIN_CONFIG_FILE: &str = "train_config.json";
pub const MODEL_CONFIG_FILE: &str = "model_config.json";

const LATEST_STEP_FILE: &str = "latest_step.json";
const RECORD_EXTENSION: &str = "mpk.gz";

/// Manages saving and loading of checkpoints in one directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create the manager, creating the directory like `mkdir -p`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create save directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open an existing directory without creating it.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        anyhow::ensure!(dir.is_dir(), "Save directory '{}' does not exist", dir.display());
        Ok(Self { dir })
    }

    fn model_path(&self, step: usize) -> PathBuf {
        self.dir.join(format!("model-{step}"))
    }

    fn optimizer_path(&self, step: usize) -> PathBuf {
        self.dir.join(format!("optimizer-{step}"))
    }

    /// True when both the model and optimizer records for `step` exist.
    pub fn has_checkpoint(&self, step: usize) -> bool {
        self.model_path(step).with_extension(RECORD_EXTENSION).exists()
            && self.optimizer_path(step).with_extension(RECORD_EXTENSION).exists()
    }

    /// Save model and optimizer for `step`, then advance the latest-step pointer.
    pub fn save<B, O>(&self, model: &AutoVc<B>, optim: &O, step: usize) -> Result<()>
    where
        B: AutodiffBackend,
        O: Optimizer<AutoVc<B>, B>,
    {
        self.save_model(model, step)?;

        let path = self.optimizer_path(step);
        Recorder::<B>::record(&CompactRecorder::new(), optim.to_record(), path.clone())
            .with_context(|| format!("Failed to save optimizer to '{}'", path.display()))?;

        // Written last so it never points at a half-written checkpoint
        self.write_latest_step(step)?;
        tracing::debug!("Saved checkpoint: step {}", step);
        Ok(())
    }

    pub fn save_model<B: Backend>(&self, model: &AutoVc<B>, step: usize) -> Result<()> {
        let path = self.model_path(step);
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save model to '{}'", path.display()))?;
        Ok(())
    }

    /// Restore model weights saved at `step`.
    pub fn load_model<B: Backend>(
        &self,
        model:  AutoVc<B>,
        step:   usize,
        device: &B::Device,
    ) -> Result<AutoVc<B>> {
        let path = self.model_path(step);
        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load model checkpoint '{}'", path.display())
            })?;
        Ok(model.load_record(record))
    }

    /// Restore optimizer state saved at `step`.
    pub fn load_optimizer<B, O>(&self, optim: O, step: usize, device: &B::Device) -> Result<O>
    where
        B: AutodiffBackend,
        O: Optimizer<AutoVc<B>, B>,
    {
        let path = self.optimizer_path(step);
        let record = Recorder::<B>::load(&CompactRecorder::new(), path.clone(), device)
            .with_context(|| {
                format!("Cannot load optimizer checkpoint '{}'", path.display())
            })?;
        Ok(optim.load_record(record))
    }

    fn write_latest_step(&self, step: usize) -> Result<()> {
        let path = self.dir.join(LATEST_STEP_FILE);
        fs::write(&path, serde_json::to_string(&step)?)
            .with_context(|| format!("Failed to write '{}'", path.display()))
    }

    /// Step number of the most recent checkpoint.
    pub fn latest_step(&self) -> Result<usize> {
        let path = self.dir.join(LATEST_STEP_FILE);
        let s = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot find '{}'. Has training saved a checkpoint yet?",
                path.display()
            )
        })?;
        Ok(serde_json::from_str::<usize>(s.trim())?)
    }

    /// Write any serialisable config as pretty JSON under `name`.
    pub fn save_config<T: Serialize>(&self, name: &str, cfg: &T) -> Result<()> {
        let path = self.dir.join(name);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Make sure 'train' was run with this directory.",
                path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Cannot parse config '{}'", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::{tests::tiny_config, AutoVcConfig};
    use burn::backend::{Autodiff, NdArray};
    use burn::optim::AdamConfig;

    type TestBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn test_latest_step_missing_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        assert!(ckpt.latest_step().is_err());
    }

    #[test]
    fn test_new_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        CheckpointManager::new(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_open_requires_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CheckpointManager::open(dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        ckpt.save_config(MODEL_CONFIG_FILE, &tiny_config()).unwrap();
        let loaded: AutoVcConfig = ckpt.load_config(MODEL_CONFIG_FILE).unwrap();
        assert_eq!(loaded, tiny_config());
    }

    #[test]
    fn test_save_writes_files_and_latest_step() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let device = Default::default();
        let model = tiny_config().init::<TestBackend>(&device);
        let optim = AdamConfig::new().init::<TestBackend, AutoVc<TestBackend>>();

        ckpt.save(&model, &optim, 10).unwrap();

        assert!(ckpt.has_checkpoint(10));
        assert!(dir.path().join("model-10.mpk.gz").exists());
        assert!(dir.path().join("optimizer-10.mpk.gz").exists());
        assert_eq!(ckpt.latest_step().unwrap(), 10);
        assert!(!ckpt.has_checkpoint(20));

        let restored = ckpt.load_model(tiny_config().init::<TestBackend>(&device), 10, &device);
        assert!(restored.is_ok());
        let optim = AdamConfig::new().init::<TestBackend, AutoVc<TestBackend>>();
        assert!(ckpt.load_optimizer(optim, 10, &device).is_ok());
    }
}
