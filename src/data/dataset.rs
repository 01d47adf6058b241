use burn::data::dataset::Dataset;
use rand::{seq::SliceRandom, Rng};

use crate::data::segment::{crop_or_pad, max_offset};
use crate::domain::speaker::Speaker;

/// One training example: a fixed-length mel segment and the
/// embedding of the speaker who produced it.
#[derive(Debug, Clone)]
pub struct SpeakerSample {
    /// `seg_len * n_mels` values, row-major
    pub mel:    Vec<f32>,
    pub emb:    Vec<f32>,
    pub n_mels: usize,
}

impl SpeakerSample {
    pub fn frames(&self) -> usize {
        self.mel.len() / self.n_mels.max(1)
    }
}

/// Indexed by speaker. Each `get` draws a random utterance of
/// that speaker and a random window inside it, so repeated
/// passes see different segments.
pub struct SpeakerDataset {
    speakers: Vec<Speaker>,
    seg_len:  usize,
}

impl SpeakerDataset {
    pub fn new(speakers: Vec<Speaker>, seg_len: usize) -> Self {
        Self { speakers, seg_len }
    }

    pub fn speaker_count(&self) -> usize {
        self.speakers.len()
    }

    pub fn seg_len(&self) -> usize {
        self.seg_len
    }
}

impl Dataset<SpeakerSample> for SpeakerDataset {
    fn get(&self, index: usize) -> Option<SpeakerSample> {
        let speaker = self.speakers.get(index)?;
        let mut rng = rand::thread_rng();

        let utterance = speaker.utterances.choose(&mut rng)?;
        let offset = rng.gen_range(0..=max_offset(utterance.frames(), self.seg_len));

        Some(SpeakerSample {
            mel:    crop_or_pad(utterance, self.seg_len, offset),
            emb:    speaker.embedding.clone(),
            n_mels: utterance.n_mels,
        })
    }

    fn len(&self) -> usize {
        self.speakers.len()
    }
}
