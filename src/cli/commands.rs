// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands, `preprocess`, `train` and
// `convert`, and all their flags. clap's derive macros generate --help, missing
// argument errors and string → number conversion.

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::{
    convert_use_case::ConvertRequest,
    preprocess_use_case::PreprocessConfig,
    train_use_case::TrainConfig,
};
use crate::data::mel::MelConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Turn per-speaker WAV folders into the training corpus
    Preprocess(PreprocessArgs),

    /// Train AutoVC on a directory of speaker mel-spectrograms
    Train(TrainArgs),

    /// Convert one utterance to another speaker's voice
    Convert(ConvertArgs),
}

#[derive(Args, Debug)]
pub struct PreprocessArgs {
    /// Directory with one sub-directory of .wav files per speaker
    pub wav_dir: PathBuf,

    /// Output corpus directory for `train`
    pub data_dir: PathBuf,

    /// Directory of <speaker>.npy embeddings
    /// (defaults to emb.npy inside each speaker's WAV folder)
    #[arg(long)]
    pub emb_dir: Option<PathBuf>,

    /// Audio is resampled to this rate before analysis
    #[arg(long, default_value_t = 16_000)]
    pub sample_rate: u32,

    #[arg(long, default_value_t = 1024)]
    pub n_fft: usize,

    #[arg(long, default_value_t = 256)]
    pub hop_length: usize,

    /// Mel bins; must match n_mels in the model config
    #[arg(long, default_value_t = 80)]
    pub n_mels: usize,

    #[arg(long, default_value_t = 90.0)]
    pub f_min: f32,

    #[arg(long, default_value_t = 7600.0)]
    pub f_max: f32,
}

impl From<PreprocessArgs> for PreprocessConfig {
    fn from(a: PreprocessArgs) -> Self {
        PreprocessConfig {
            wav_dir:  a.wav_dir,
            data_dir: a.data_dir,
            emb_dir:  a.emb_dir,
            mel: MelConfig {
                sample_rate: a.sample_rate,
                n_fft:       a.n_fft,
                hop_length:  a.hop_length,
                n_mels:      a.n_mels,
                f_min:       a.f_min,
                f_max:       a.f_max,
                ..MelConfig::default()
            },
        }
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// YAML file with the model architecture
    pub config_path: PathBuf,

    /// Directory with one sub-directory per speaker
    /// (emb.npy plus one .npy mel per utterance)
    pub data_dir: PathBuf,

    /// Where checkpoints and metrics.csv are written
    pub save_dir: PathBuf,

    /// Total number of optimisation steps
    #[arg(long, default_value_t = 10_000_000)]
    pub n_steps: usize,

    /// Save a checkpoint every N steps
    #[arg(long, default_value_t = 10_000)]
    pub save_steps: usize,

    /// Append losses to metrics.csv every N steps
    #[arg(long, default_value_t = 250)]
    pub log_steps: usize,

    /// Speakers per batch
    #[arg(long, default_value_t = 2)]
    pub batch_size: usize,

    /// Frames per training segment, a multiple of the model's freq
    #[arg(long, default_value_t = 128)]
    pub seg_len: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,

    /// Weight of the content-code loss
    #[arg(long, default_value_t = 1.0)]
    pub lambda_cnt: f64,

    /// Seed for shuffling and weight init
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Background data loader threads (0 loads on the training thread)
    #[arg(long, default_value_t = 0)]
    pub num_workers: usize,

    /// Continue from the checkpoint saved at this step
    #[arg(long)]
    pub resume_step: Option<usize>,
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            config_path: a.config_path,
            data_dir:    a.data_dir,
            save_dir:    a.save_dir,
            n_steps:     a.n_steps,
            save_steps:  a.save_steps,
            log_steps:   a.log_steps,
            batch_size:  a.batch_size,
            seg_len:     a.seg_len,
            lr:          a.lr,
            lambda_cnt:  a.lambda_cnt,
            seed:        a.seed,
            num_workers: a.num_workers,
            resume_step: a.resume_step,
        }
    }
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Save directory written by `train`
    pub save_dir: PathBuf,

    /// Source mel-spectrogram (.npy, frames × n_mels)
    #[arg(long)]
    pub source: PathBuf,

    /// Embedding of the source speaker (.npy)
    #[arg(long)]
    pub source_emb: PathBuf,

    /// Embedding of the target speaker (.npy)
    #[arg(long)]
    pub target_emb: PathBuf,

    /// Where to write the converted mel (.npy)
    #[arg(long)]
    pub output: PathBuf,

    /// Checkpoint step to load (defaults to the latest)
    #[arg(long)]
    pub step: Option<usize>,
}

impl ConvertArgs {
    pub fn request(&self) -> ConvertRequest {
        ConvertRequest {
            source:     self.source.clone(),
            source_emb: self.source_emb.clone(),
            target_emb: self.target_emb.clone(),
            output:     self.output.clone(),
        }
    }
}
