// ============================================================
// Layer 3 — Speaker Domain Types
// ============================================================
// A training corpus for AutoVC is organised by speaker:
//   - each speaker has ONE fixed-length embedding vector
//     (the identity the decoder is conditioned on)
//   - each speaker has MANY utterances, stored as
//     mel-spectrograms of varying length
//
// Mel-spectrograms are kept as flat row-major buffers
// (frame after frame) with the mel width stored alongside.
// This is the same layout the tensors use later, so batching
// is a plain copy with no transposition.

/// One mel-spectrogram, `frames × n_mels`, row-major.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// Where the mel was loaded from
    pub source: String,

    /// Number of mel bins per frame
    pub n_mels: usize,

    /// Flattened values, `frames * n_mels` long
    pub values: Vec<f32>,
}

impl Utterance {
    pub fn new(source: impl Into<String>, n_mels: usize, values: Vec<f32>) -> Self {
        Self {
            source: source.into(),
            n_mels,
            values,
        }
    }

    /// Number of time frames in this utterance
    pub fn frames(&self) -> usize {
        if self.n_mels == 0 {
            0
        } else {
            self.values.len() / self.n_mels
        }
    }
}

/// A speaker: identity embedding plus every utterance found for it.
#[derive(Debug, Clone)]
pub struct Speaker {
    pub name:       String,
    pub embedding:  Vec<f32>,
    pub utterances: Vec<Utterance>,
}

impl Speaker {
    pub fn new(name: impl Into<String>, embedding: Vec<f32>, utterances: Vec<Utterance>) -> Self {
        Self {
            name: name.into(),
            embedding,
            utterances,
        }
    }

    pub fn total_frames(&self) -> usize {
        self.utterances.iter().map(Utterance::frames).sum()
    }
}
