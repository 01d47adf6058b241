// ============================================================
// Layer 4 — WAV Input
// ============================================================
// Reads a WAV file as mono f32 in [-1, 1] and brings it to the
// sample rate the mel front end expects.

use anyhow::{ensure, Context, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::path::Path;

/// Mono samples plus the rate they were recorded at.
#[derive(Debug, Clone)]
pub struct Waveform {
    pub samples:     Vec<f32>,
    pub sample_rate: u32,
}

/// Read any PCM or float WAV; multi-channel audio is averaged down to mono.
pub fn read_wav(path: &Path) -> Result<Waveform> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("Cannot open WAV '{}'", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()
            .with_context(|| format!("Cannot decode '{}'", path.display()))?,
        hound::SampleFormat::Int => {
            let scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<f32>, _>>()
                .with_context(|| format!("Cannot decode '{}'", path.display()))?
        }
    };

    let samples = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    Ok(Waveform { samples, sample_rate: spec.sample_rate })
}

/// Windowed-sinc resampling to `target_rate`. A no-op when the rates match.
pub fn resample(wave: Waveform, target_rate: u32) -> Result<Waveform> {
    if wave.sample_rate == target_rate || wave.samples.is_empty() {
        return Ok(Waveform { sample_rate: target_rate, ..wave });
    }
    ensure!(wave.sample_rate > 0, "WAV reports a sample rate of 0");

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = target_rate as f64 / wave.sample_rate as f64;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, wave.samples.len(), 1)
        .context("Cannot build resampler")?;
    let input = vec![wave.samples];
    let mut out = resampler
        .process(&input, None)
        .context("Resampling failed")?;

    tracing::debug!("Resampled {} Hz → {} Hz", wave.sample_rate, target_rate);
    Ok(Waveform {
        samples:     out.pop().unwrap_or_default(),
        sample_rate: target_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, rate: u32, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut w = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            w.write_sample(s).unwrap();
        }
        w.finalize().unwrap();
    }

    #[test]
    fn test_stereo_is_averaged_to_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("st.wav");
        write_wav(&path, 2, 16_000, &[16384, 0, -16384, -16384]);

        let wave = read_wav(&path).unwrap();
        assert_eq!(wave.sample_rate, 16_000);
        assert_eq!(wave.samples.len(), 2);
        assert!((wave.samples[0] - 0.25).abs() < 1e-4);
        assert!((wave.samples[1] + 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_wav(&dir.path().join("none.wav")).is_err());
    }

    #[test]
    fn test_same_rate_is_untouched() {
        let wave = Waveform { samples: vec![0.1, 0.2, 0.3], sample_rate: 16_000 };
        let out = resample(wave, 16_000).unwrap();
        assert_eq!(out.samples, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_downsample_changes_rate() {
        let samples: Vec<f32> = (0..4_800).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let out = resample(Waveform { samples, sample_rate: 48_000 }, 16_000).unwrap();
        assert_eq!(out.sample_rate, 16_000);
        assert!(!out.samples.is_empty());
        assert!(out.samples.len() <= 1_700);
    }
}
