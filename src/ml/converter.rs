// ============================================================
// Layer 5 — Converter
// ============================================================
// Loads a trained checkpoint and re-voices a mel-spectrogram:
// content codes come from the source speaker's utterance,
// identity from the target speaker's embedding.
//
// Utterances have arbitrary length but the encoder needs a
// multiple of `freq` frames, so input is zero-padded and the
// output trimmed back to the original length.

use anyhow::{anyhow, ensure, Result};
use burn::prelude::*;

use crate::data::segment::pad_to_multiple;
use crate::domain::speaker::Utterance;
use crate::infra::checkpoint::{CheckpointManager, MODEL_CONFIG_FILE};
use crate::ml::model::{AutoVc, AutoVcConfig};

pub type InferBackend = burn::backend::Wgpu;

pub struct Converter<B: Backend> {
    model:  AutoVc<B>,
    config: AutoVcConfig,
    device: B::Device,
}

impl<B: Backend> Converter<B> {
    pub fn new(model: AutoVc<B>, config: AutoVcConfig, device: B::Device) -> Self {
        Self { model, config, device }
    }

    /// Rebuild the architecture from `model_config.json` and load the
    /// weights saved at `step` (latest checkpoint when `None`).
    pub fn from_checkpoint(
        ckpt:   &CheckpointManager,
        step:   Option<usize>,
        device: B::Device,
    ) -> Result<Self> {
        let config: AutoVcConfig = ckpt.load_config(MODEL_CONFIG_FILE)?;
        let step = match step {
            Some(step) => step,
            None => ckpt.latest_step()?,
        };

        let model = ckpt.load_model(config.init::<B>(&device), step, &device)?;
        tracing::info!("Model loaded from checkpoint step {}", step);
        Ok(Self::new(model, config, device))
    }

    /// Convert `mel` (spoken by `src_emb`) to sound like `trg_emb`.
    pub fn convert(&self, mel: &Utterance, src_emb: &[f32], trg_emb: &[f32]) -> Result<Utterance> {
        let cfg = &self.config;
        ensure!(
            mel.n_mels == cfg.n_mels,
            "mel has {} bins, model expects {}",
            mel.n_mels,
            cfg.n_mels
        );
        ensure!(mel.frames() > 0, "mel has no frames");
        for (which, emb) in [("source", src_emb), ("target", trg_emb)] {
            ensure!(
                emb.len() == cfg.dim_emb,
                "{which} embedding has {} values, model expects {}",
                emb.len(),
                cfg.dim_emb
            );
        }

        let frames = mel.frames();
        let (padded, padded_frames) = pad_to_multiple(&mel.values, cfg.n_mels, cfg.freq);
        tracing::debug!("Padded {} frames to {}", frames, padded_frames);

        let mels = Tensor::<B, 3>::from_data(
            TensorData::new(padded, [1, padded_frames, cfg.n_mels]),
            &self.device,
        );
        let src = Tensor::<B, 2>::from_data(
            TensorData::new(src_emb.to_vec(), [1, cfg.dim_emb]),
            &self.device,
        );
        let trg = Tensor::<B, 2>::from_data(
            TensorData::new(trg_emb.to_vec(), [1, cfg.dim_emb]),
            &self.device,
        );

        let out = self.model.convert(mels, src, trg);
        let mut values = out
            .rec_pst
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("Cannot read converted mel: {e:?}"))?;
        values.truncate(frames * cfg.n_mels);

        Ok(Utterance::new(mel.source.clone(), cfg.n_mels, values))
    }
}
