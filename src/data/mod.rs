// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between recordings on disk and device-resident
// tensor batches.
//
//   wav_dir/<speaker>/*.wav
//       │
//       ▼
//   audio + mel       → mono 16 kHz waveform → normalised log-mel
//       │               (written once by `preprocess`)
//       ▼
//   data_dir/<speaker>/*.npy
//       │
//       ▼
//   npy               → decodes float32 .npy files
//       │
//       ▼
//   SpeakerLoader     → one Speaker per sub-directory
//       │
//       ▼
//   SpeakerDataset    → implements Burn's Dataset trait,
//       │               random utterance + random window
//       ▼
//   MelBatcher        → stacks samples into tensor batches
//       │
//       ▼
//   DataLoader        → Burn's shuffling loader
//       │
//       ▼
//   BatchStream       → endless full batches for the step loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// WAV decoding and resampling
pub mod audio;

/// STFT + mel filterbank front end
pub mod mel;

/// Minimal float32 .npy reader/writer
pub mod npy;

/// Loads speaker directories from disk
pub mod loader;

/// Crop / pad mels to a fixed number of frames
pub mod segment;

/// Implements Burn's Dataset trait for speaker samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Refilling iterator that yields only full batches
pub mod stream;
