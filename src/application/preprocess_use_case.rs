// ============================================================
// Layer 2 — PreprocessUseCase
// ============================================================
// Builds the training corpus from raw recordings:
//
//   wav_dir/<speaker>/*.wav      ──►  data_dir/<speaker>/<stem>.npy
//   speaker embedding            ──►  data_dir/<speaker>/emb.npy
//
// The embedding is read from `--emb-dir/<speaker>.npy` when an
// embedding directory is given, else from
// `wav_dir/<speaker>/emb.npy`. Speakers without one are skipped
// with a warning, as are WAV files too short to frame.
//
//   Step 1: Validate the mel settings
//   Step 2: List speaker directories
//   Step 3: Per speaker: embedding, then every WAV → mel .npy
//   Step 4: Record the mel settings next to the corpus

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::{
    audio::{read_wav, resample},
    loader::{load_embedding, EMBEDDING_FILE},
    mel::{MelConfig, MelSpectrogram},
    npy::write_f32,
};

pub const MEL_CONFIG_FILE: &str = "mel_config.json";

#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    pub wav_dir:  PathBuf,
    pub data_dir: PathBuf,
    pub emb_dir:  Option<PathBuf>,
    pub mel:      MelConfig,
}

/// Counts reported once preprocessing finishes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreprocessReport {
    pub speakers:         usize,
    pub utterances:       usize,
    pub skipped_speakers: usize,
    pub skipped_files:    usize,
}

pub struct PreprocessUseCase {
    config: PreprocessConfig,
}

impl PreprocessUseCase {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<PreprocessReport> {
        let cfg = &self.config;

        // ── Step 1 ────────────────────────────────────────────────────────────
        let mel = MelSpectrogram::new(cfg.mel.clone())?;

        // ── Step 2 ────────────────────────────────────────────────────────────
        let speaker_dirs = sorted_entries(&cfg.wav_dir, |p| p.is_dir())
            .with_context(|| format!("Cannot read WAV directory '{}'", cfg.wav_dir.display()))?;
        fs::create_dir_all(&cfg.data_dir)
            .with_context(|| format!("Cannot create '{}'", cfg.data_dir.display()))?;

        // ── Step 3 ────────────────────────────────────────────────────────────
        let mut report = PreprocessReport::default();
        for dir in speaker_dirs {
            let Some(name) = dir.file_name().and_then(|n| n.to_str()).map(str::to_owned) else {
                continue;
            };
            let emb_path = match &cfg.emb_dir {
                Some(emb_dir) => emb_dir.join(format!("{name}.npy")),
                None => dir.join(EMBEDDING_FILE),
            };
            if !emb_path.exists() {
                tracing::warn!("Skipping speaker '{}': no embedding at '{}'", name, emb_path.display());
                report.skipped_speakers += 1;
                continue;
            }

            let written = self.speaker(&mel, &dir, &name, &emb_path, &mut report)?;
            if written == 0 {
                report.skipped_speakers += 1;
            } else {
                report.speakers += 1;
                report.utterances += written;
                tracing::info!("Speaker '{}': {} utterances", name, written);
            }
        }

        // ── Step 4 ────────────────────────────────────────────────────────────
        let path = cfg.data_dir.join(MEL_CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(&cfg.mel)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;

        tracing::info!(
            "Preprocessed {} speakers, {} utterances into '{}'",
            report.speakers,
            report.utterances,
            cfg.data_dir.display()
        );
        Ok(report)
    }

    /// Write one speaker's mels and embedding. Returns the number of mels written.
    fn speaker(
        &self,
        mel:      &MelSpectrogram,
        dir:      &Path,
        name:     &str,
        emb_path: &Path,
        report:   &mut PreprocessReport,
    ) -> Result<usize> {
        let out_dir = self.config.data_dir.join(name);
        let wavs = sorted_entries(dir, |p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
        })?;

        let mut written = 0;
        for wav in wavs {
            let Some(stem) = wav.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if format!("{stem}.npy") == EMBEDDING_FILE {
                tracing::warn!("Skipping '{}': name clashes with {}", wav.display(), EMBEDDING_FILE);
                report.skipped_files += 1;
                continue;
            }

            let values = read_wav(&wav)
                .and_then(|w| resample(w, self.config.mel.sample_rate))
                .and_then(|w| mel.compute(&w.samples));
            let values = match values {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!("Skipping '{}': {:#}", wav.display(), e);
                    report.skipped_files += 1;
                    continue;
                }
            };

            if written == 0 {
                fs::create_dir_all(&out_dir)
                    .with_context(|| format!("Cannot create '{}'", out_dir.display()))?;
            }
            let frames = values.len() / mel.n_mels();
            let out = out_dir.join(format!("{stem}.npy"));
            write_f32(&out, &[frames, mel.n_mels()], &values)
                .with_context(|| format!("Cannot write '{}'", out.display()))?;
            tracing::debug!("'{}' → {} frames", wav.display(), frames);
            written += 1;
        }

        if written > 0 {
            let embedding = load_embedding(emb_path)?;
            let out = out_dir.join(EMBEDDING_FILE);
            write_f32(&out, &[embedding.len()], &embedding)
                .with_context(|| format!("Cannot write '{}'", out.display()))?;
        }
        Ok(written)
    }
}

fn sorted_entries(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| keep(p.as_path()))
        .collect();
    paths.sort();
    Ok(paths)
}
