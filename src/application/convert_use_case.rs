// ============================================================
// Layer 2 — ConvertUseCase
// ============================================================
// Re-voices one mel-spectrogram file with a trained checkpoint:
//
//   Step 1: Open the save directory written by `train`
//   Step 2: Rebuild the model and load weights      (Layer 5 - ml)
//   Step 3: Read source mel + both embeddings       (Layer 4 - data)
//   Step 4: Convert and write the result as .npy    (Layer 4 - data)

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::data::{loader::{load_embedding, load_utterance}, npy::write_f32};
use crate::domain::speaker::Utterance;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::converter::{Converter, InferBackend};

/// Paths for a single conversion.
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    pub source:     PathBuf,
    pub source_emb: PathBuf,
    pub target_emb: PathBuf,
    pub output:     PathBuf,
}

pub struct ConvertUseCase<B: burn::prelude::Backend = InferBackend> {
    converter: Converter<B>,
}

impl ConvertUseCase<InferBackend> {
    /// Load the checkpoint at `step`, or the latest one, from `save_dir`.
    pub fn new(save_dir: impl Into<PathBuf>, step: Option<usize>) -> Result<Self> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        Self::with_device(save_dir, step, device)
    }
}

impl<B: burn::prelude::Backend> ConvertUseCase<B> {
    pub fn with_device(
        save_dir: impl Into<PathBuf>,
        step:     Option<usize>,
        device:   B::Device,
    ) -> Result<Self> {
        let ckpt = CheckpointManager::open(save_dir)?;
        let converter = Converter::from_checkpoint(&ckpt, step, device)?;
        Ok(Self { converter })
    }

    pub fn execute(&self, req: &ConvertRequest) -> Result<Utterance> {
        let mel = load_utterance(&req.source)?;
        let src_emb = load_embedding(&req.source_emb)?;
        let trg_emb = load_embedding(&req.target_emb)?;
        tracing::info!(
            "Converting '{}' ({} frames)",
            req.source.display(),
            mel.frames()
        );

        let out = self.converter.convert(&mel, &src_emb, &trg_emb)?;
        write_f32(&req.output, &[out.frames(), out.n_mels], &out.values)
            .with_context(|| format!("Cannot write '{}'", req.output.display()))?;
        tracing::info!("Wrote converted mel to '{}'", req.output.display());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::npy::read_f32;
    use crate::infra::checkpoint::MODEL_CONFIG_FILE;
    use crate::ml::model::{tests::tiny_config, AutoVc};
    use burn::backend::{Autodiff, NdArray};
    use burn::optim::AdamConfig;

    type TrainBackend = Autodiff<NdArray<f32>>;

    fn trained_dir(dir: &std::path::Path) {
        let ckpt = CheckpointManager::new(dir).unwrap();
        let model = tiny_config().init::<TrainBackend>(&Default::default());
        let optim = AdamConfig::new().init::<TrainBackend, AutoVc<TrainBackend>>();
        ckpt.save_config(MODEL_CONFIG_FILE, &tiny_config()).unwrap();
        ckpt.save(&model, &optim, 5).unwrap();
    }

    #[test]
    fn test_convert_writes_npy_with_source_shape() {
        let save = tempfile::tempdir().unwrap();
        let io = tempfile::tempdir().unwrap();
        trained_dir(save.path());

        let req = ConvertRequest {
            source:     io.path().join("src.npy"),
            source_emb: io.path().join("src_emb.npy"),
            target_emb: io.path().join("trg_emb.npy"),
            output:     io.path().join("out.npy"),
        };
        write_f32(&req.source, &[7, 5], &[0.2; 35]).unwrap();
        write_f32(&req.source_emb, &[3], &[1.0, 0.0, 0.0]).unwrap();
        write_f32(&req.target_emb, &[1, 3], &[0.0, 1.0, 0.0]).unwrap();

        let use_case =
            ConvertUseCase::<NdArray<f32>>::with_device(save.path(), None, Default::default()).unwrap();
        let out = use_case.execute(&req).unwrap();
        assert_eq!(out.frames(), 7);

        let written = read_f32(&req.output).unwrap();
        assert_eq!(written.shape, vec![7, 5]);
    }

    #[test]
    fn test_missing_save_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let res = ConvertUseCase::<NdArray<f32>>::with_device(
            dir.path().join("nope"),
            None,
            Default::default(),
        );
        assert!(res.is_err());
    }
}
