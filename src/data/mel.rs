// ============================================================
// Layer 4 — Log-Mel Front End
// ============================================================
// Turns a mono waveform into the normalised mel-spectrograms
// AutoVC trains on:
//
//   reflect-pad n_fft/2 → Hann-windowed STFT → |X|
//     → Slaney mel filterbank
//     → 20·log10(max(1e-5, mel)) − ref_level_db
//     → clip((db − min_level_db) / −min_level_db, 0, 1)
//
// Output is row-major `frames × n_mels`, the layout of
// `Utterance` and of every .npy mel under data_dir.

use anyhow::{ensure, Result};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Amplitude floor, 10^(min_level_db / 20)
const MIN_AMPLITUDE: f32 = 1e-5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MelConfig {
    pub sample_rate:  u32,
    pub n_fft:        usize,
    pub hop_length:   usize,
    pub n_mels:       usize,
    pub f_min:        f32,
    pub f_max:        f32,
    pub min_level_db: f32,
    pub ref_level_db: f32,
}

impl Default for MelConfig {
    fn default() -> Self {
        Self {
            sample_rate:  16_000,
            n_fft:        1024,
            hop_length:   256,
            n_mels:       80,
            f_min:        90.0,
            f_max:        7600.0,
            min_level_db: -100.0,
            ref_level_db: 16.0,
        }
    }
}

impl MelConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.sample_rate > 0, "sample_rate must be greater than zero");
        ensure!(self.n_fft >= 2, "n_fft must be at least 2");
        ensure!(self.hop_length > 0, "hop_length must be greater than zero");
        ensure!(self.n_mels > 0, "n_mels must be greater than zero");
        ensure!(
            self.f_min >= 0.0 && self.f_min < self.f_max,
            "need 0 <= f_min < f_max, got {} and {}",
            self.f_min,
            self.f_max
        );
        ensure!(
            self.f_max <= self.sample_rate as f32 / 2.0,
            "f_max {} is above the Nyquist frequency of {} Hz",
            self.f_max,
            self.sample_rate
        );
        ensure!(self.min_level_db < 0.0, "min_level_db must be negative");
        Ok(())
    }
}

pub struct MelSpectrogram {
    config:     MelConfig,
    window:     Vec<f32>,
    filterbank: Vec<Vec<f32>>,
    fft:        Arc<dyn Fft<f32>>,
}

impl MelSpectrogram {
    pub fn new(config: MelConfig) -> Result<Self> {
        config.validate()?;
        let window = periodic_hann(config.n_fft);
        let filterbank = slaney_filterbank(&config);
        let fft = FftPlanner::new().plan_fft_forward(config.n_fft);
        Ok(Self { config, window, filterbank, fft })
    }

    pub fn n_mels(&self) -> usize {
        self.config.n_mels
    }

    /// Row-major `frames × n_mels` values in [0, 1].
    ///
    /// Needs more than `n_fft / 2` samples for the reflect padding.
    pub fn compute(&self, samples: &[f32]) -> Result<Vec<f32>> {
        let cfg = &self.config;
        let pad = cfg.n_fft / 2;
        ensure!(
            samples.len() > pad,
            "{} samples is too short for n_fft {}",
            samples.len(),
            cfg.n_fft
        );

        let padded = reflect_pad(samples, pad);
        let frames = (padded.len() - cfg.n_fft) / cfg.hop_length + 1;
        let bins = cfg.n_fft / 2 + 1;
        let scale = -cfg.min_level_db;

        let mut out = Vec::with_capacity(frames * cfg.n_mels);
        let mut buffer = vec![Complex::new(0.0f32, 0.0); cfg.n_fft];
        let mut magnitude = vec![0.0f32; bins];

        for frame in 0..frames {
            let start = frame * cfg.hop_length;
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex::new(padded[start + i] * self.window[i], 0.0);
            }
            self.fft.process(&mut buffer);
            for (m, c) in magnitude.iter_mut().zip(&buffer) {
                *m = c.norm();
            }

            for filter in &self.filterbank {
                let energy: f32 = filter.iter().zip(&magnitude).map(|(w, m)| w * m).sum();
                let db = 20.0 * energy.max(MIN_AMPLITUDE).log10() - cfg.ref_level_db;
                out.push(((db - cfg.min_level_db) / scale).clamp(0.0, 1.0));
            }
        }

        Ok(out)
    }
}

fn periodic_hann(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / len as f32;
            0.5 - 0.5 * phase.cos()
        })
        .collect()
}

/// Mirror `pad` samples on each side, excluding the edge sample.
fn reflect_pad(signal: &[f32], pad: usize) -> Vec<f32> {
    let n = signal.len();
    let mut out = Vec::with_capacity(n + 2 * pad);
    out.extend((1..=pad).rev().map(|i| signal[i]));
    out.extend_from_slice(signal);
    out.extend((1..=pad).map(|i| signal[n - 1 - i]));
    out
}

fn hz_to_mel(hz: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f32.ln() / 27.0;
    if hz >= MIN_LOG_HZ {
        min_log_mel + (hz / MIN_LOG_HZ).ln() / logstep
    } else {
        hz / F_SP
    }
}

fn mel_to_hz(mel: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f32.ln() / 27.0;
    if mel >= min_log_mel {
        MIN_LOG_HZ * (logstep * (mel - min_log_mel)).exp()
    } else {
        F_SP * mel
    }
}

/// `n_mels` triangular filters over `n_fft / 2 + 1` bins, area-normalised.
fn slaney_filterbank(cfg: &MelConfig) -> Vec<Vec<f32>> {
    let bins = cfg.n_fft / 2 + 1;
    let lo = hz_to_mel(cfg.f_min);
    let hi = hz_to_mel(cfg.f_max);
    let edges: Vec<f32> = (0..cfg.n_mels + 2)
        .map(|i| mel_to_hz(lo + (hi - lo) * i as f32 / (cfg.n_mels + 1) as f32))
        .collect();
    let bin_hz = cfg.sample_rate as f32 / cfg.n_fft as f32;

    edges
        .windows(3)
        .map(|e| {
            let (left, center, right) = (e[0], e[1], e[2]);
            let norm = 2.0 / (right - left);
            (0..bins)
                .map(|b| {
                    let f = b as f32 * bin_hz;
                    let rise = (f - left) / (center - left);
                    let fall = (right - f) / (right - center);
                    norm * rise.min(fall).max(0.0)
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(hz: f32, seconds: f32, rate: u32) -> Vec<f32> {
        let n = (seconds * rate as f32) as usize;
        (0..n)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * hz * i as f32 / rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_mel_scale_round_trip() {
        for hz in [90.0, 440.0, 1000.0, 3000.0, 7600.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 0.05, "{hz} Hz");
        }
    }

    #[test]
    fn test_filterbank_shape_and_coverage() {
        let cfg = MelConfig::default();
        let fb = slaney_filterbank(&cfg);
        assert_eq!(fb.len(), 80);
        assert!(fb.iter().all(|f| f.len() == 513));
        assert!(fb.iter().flatten().all(|&w| w >= 0.0));
        assert!(fb.iter().all(|f| f.iter().sum::<f32>() > 0.0));
    }

    #[test]
    fn test_reflect_pad() {
        assert_eq!(
            reflect_pad(&[1.0, 2.0, 3.0, 4.0], 2),
            vec![3.0, 2.0, 1.0, 2.0, 3.0, 4.0, 3.0, 2.0]
        );
    }

    #[test]
    fn test_frame_count_and_range() {
        let mel = MelSpectrogram::new(MelConfig::default()).unwrap();
        let samples = sine(440.0, 0.5, 16_000);
        let out = mel.compute(&samples).unwrap();

        // centred frames: len / hop + 1
        let frames = samples.len() / 256 + 1;
        assert_eq!(out.len(), frames * 80);
        assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(out.iter().any(|&v| v > 0.5));
    }

    #[test]
    fn test_silence_maps_to_zero() {
        let mel = MelSpectrogram::new(MelConfig::default()).unwrap();
        let out = mel.compute(&vec![0.0; 4_000]).unwrap();
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_too_short_is_error() {
        let mel = MelSpectrogram::new(MelConfig::default()).unwrap();
        assert!(mel.compute(&[0.1; 100]).is_err());
    }

    #[test]
    fn test_f_max_above_nyquist_rejected() {
        let cfg = MelConfig { f_max: 9_000.0, ..MelConfig::default() };
        assert!(MelSpectrogram::new(cfg).is_err());
    }
}
