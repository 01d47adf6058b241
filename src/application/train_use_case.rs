// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run in order:
//
//   Step 1: Load + validate the YAML model config   (Layer 6 - infra)
//   Step 2: Validate the run settings
//   Step 3: Prepare the save directory              (Layer 6 - infra)
//   Step 4: Load the speaker corpus                 (Layer 4 - data)
//   Step 5: Check corpus against the config
//   Step 6: Build the Burn dataset                  (Layer 4 - data)
//   Step 7: Save configs next to the checkpoints    (Layer 6 - infra)
//   Step 8: Run the training loop                   (Layer 5 - ml)

use anyhow::{bail, ensure, Result};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::{dataset::SpeakerDataset, loader::SpeakerLoader};
use crate::domain::{speaker::Speaker, traits::SpeakerSource};
use crate::infra::{
    checkpoint::{CheckpointManager, MODEL_CONFIG_FILE, TRAIN_CONFIG_FILE},
    config::load_model_config,
    metrics::MetricsLogger,
};
use crate::ml::{
    model::AutoVcConfig,
    trainer::{check_worker_slices, train_loop, TrainBackend, TrainOutcome},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything about a run except the architecture, which comes
// from the YAML file at `config_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub config_path: PathBuf,
    pub data_dir:    PathBuf,
    pub save_dir:    PathBuf,
    pub n_steps:     usize,
    pub save_steps:  usize,
    pub log_steps:   usize,
    pub batch_size:  usize,
    pub seg_len:     usize,
    pub lr:          f64,
    pub lambda_cnt:  f64,
    pub seed:        u64,
    pub num_workers: usize,
    pub resume_step: Option<usize>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config.yaml"),
            data_dir:    PathBuf::from("data"),
            save_dir:    PathBuf::from("checkpoints"),
            n_steps:     10_000_000,
            save_steps:  10_000,
            log_steps:   250,
            batch_size:  2,
            seg_len:     128,
            lr:          1e-4,
            lambda_cnt:  1.0,
            seed:        42,
            num_workers: 0,
            resume_step: None,
        }
    }
}

impl TrainConfig {
    /// Check the run settings against each other and the architecture.
    pub fn validate(&self, model_cfg: &AutoVcConfig) -> Result<()> {
        ensure!(self.n_steps > 0, "n_steps must be greater than zero");
        ensure!(self.save_steps > 0, "save_steps must be greater than zero");
        ensure!(self.log_steps > 0, "log_steps must be greater than zero");
        ensure!(self.batch_size > 0, "batch_size must be greater than zero");
        ensure!(self.seg_len > 0, "seg_len must be greater than zero");
        ensure!(
            self.seg_len % model_cfg.freq == 0,
            "seg_len ({}) must be a multiple of the model's freq ({})",
            self.seg_len,
            model_cfg.freq
        );
        ensure!(self.lr > 0.0, "learning rate must be positive");
        ensure!(self.lambda_cnt >= 0.0, "lambda_cnt must not be negative");
        if let Some(step) = self.resume_step {
            ensure!(
                step <= self.n_steps,
                "resume step {} is beyond n_steps {}",
                step,
                self.n_steps
            );
        }
        Ok(())
    }
}

/// Make sure every speaker fits the architecture and there are
/// enough speakers to fill one batch in every loader worker.
pub fn validate_corpus(
    speakers:    &[Speaker],
    model_cfg:   &AutoVcConfig,
    batch_size:  usize,
    num_workers: usize,
) -> Result<()> {
    if speakers.is_empty() {
        bail!("no usable speakers found in the data directory");
    }
    ensure!(
        speakers.len() >= batch_size,
        "{} speakers cannot fill a batch of {}",
        speakers.len(),
        batch_size
    );
    check_worker_slices(speakers.len(), batch_size, num_workers)?;

    for speaker in speakers {
        ensure!(
            speaker.embedding.len() == model_cfg.dim_emb,
            "speaker '{}' embedding has {} values, config dim_emb is {}",
            speaker.name,
            speaker.embedding.len(),
            model_cfg.dim_emb
        );
        if let Some(u) = speaker.utterances.iter().find(|u| u.n_mels != model_cfg.n_mels) {
            bail!(
                "mel '{}' has {} bins, config n_mels is {}",
                u.source,
                u.n_mels,
                model_cfg.n_mels
            );
        }
    }
    Ok(())
}

pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end on the GPU
    pub fn execute(&self) -> Result<TrainOutcome> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        self.execute_with::<TrainBackend>(device)
    }

    pub fn execute_with<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainOutcome> {
        let cfg = &self.config;

        // ── Step 1–2: configs ─────────────────────────────────────────────────
        let model_cfg = load_model_config(&cfg.config_path)?;
        cfg.validate(&model_cfg)?;

        // ── Step 3: save directory ────────────────────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.save_dir)?;
        if let Some(step) = cfg.resume_step {
            ensure!(
                ckpt.has_checkpoint(step),
                "no checkpoint for step {} in '{}'",
                step,
                cfg.save_dir.display()
            );
        }

        // ── Step 4–5: corpus ──────────────────────────────────────────────────
        tracing::info!("Loading speakers from '{}'", cfg.data_dir.display());
        let speakers = SpeakerLoader::new(&cfg.data_dir).load_all()?;
        validate_corpus(&speakers, &model_cfg, cfg.batch_size, cfg.num_workers)?;

        // ── Step 6: dataset ───────────────────────────────────────────────────
        let dataset = SpeakerDataset::new(speakers, cfg.seg_len);
        tracing::info!(
            "Dataset: {} speakers, {}-frame segments, batch size {}",
            dataset.speaker_count(),
            dataset.seg_len(),
            cfg.batch_size
        );

        // ── Step 7: configs for convert / resume ──────────────────────────────
        ckpt.save_config(TRAIN_CONFIG_FILE, cfg)?;
        ckpt.save_config(MODEL_CONFIG_FILE, &model_cfg)?;
        let metrics = MetricsLogger::new(&cfg.save_dir)?;
        tracing::info!("Logging losses to '{}'", metrics.csv_path().display());

        // ── Step 8: training loop (Layer 5) ───────────────────────────────────
        train_loop::<B>(cfg, &model_cfg, dataset, &ckpt, &metrics, device)
    }
}
