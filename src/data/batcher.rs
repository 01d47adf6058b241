// ============================================================
// Layer 4 — Mel Batcher
// ============================================================
// Implements Burn's Batcher trait to stack SpeakerSamples
// into tensors on the training device.
//
//   Input:  Vec of N SpeakerSamples, each seg_len × n_mels
//   Output: MelBatch
//             mels [N, seg_len, n_mels]
//             embs [N, dim_emb]
//
// Every sample was already cropped/padded to seg_len by the
// dataset, so stacking is a flat copy followed by a reshape.

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::dataset::SpeakerSample;
use crate::data::stream::SizedBatch;

/// A batch of (mel segment, speaker embedding) pairs.
#[derive(Debug, Clone)]
pub struct MelBatch<B: Backend> {
    /// shape: [batch_size, seg_len, n_mels]
    pub mels: Tensor<B, 3>,

    /// shape: [batch_size, dim_emb]
    pub embs: Tensor<B, 2>,
}

impl<B: Backend> SizedBatch for MelBatch<B> {
    fn batch_len(&self) -> usize {
        self.mels.dims()[0]
    }
}

#[derive(Clone, Debug)]
pub struct MelBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> MelBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<SpeakerSample, MelBatch<B>> for MelBatcher<B> {
    fn batch(&self, items: Vec<SpeakerSample>) -> MelBatch<B> {
        let batch_size = items.len();
        let n_mels     = items.first().map(|s| s.n_mels).unwrap_or(0);
        let seg_len    = items.first().map(SpeakerSample::frames).unwrap_or(0);
        let dim_emb    = items.first().map(|s| s.emb.len()).unwrap_or(0);

        let mel_flat: Vec<f32> = items.iter().flat_map(|s| s.mel.iter().copied()).collect();
        let emb_flat: Vec<f32> = items.iter().flat_map(|s| s.emb.iter().copied()).collect();

        let mels = Tensor::<B, 3>::from_data(
            TensorData::new(mel_flat, [batch_size, seg_len, n_mels]),
            &self.device,
        );
        let embs = Tensor::<B, 2>::from_data(
            TensorData::new(emb_flat, [batch_size, dim_emb]),
            &self.device,
        );

        MelBatch { mels, embs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn sample(fill: f32) -> SpeakerSample {
        SpeakerSample {
            mel:    vec![fill; 4 * 3],
            emb:    vec![fill; 5],
            n_mels: 3,
        }
    }

    #[test]
    fn test_batch_shapes() {
        let batcher = MelBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.batch(vec![sample(1.0), sample(2.0)]);

        assert_eq!(batch.mels.dims(), [2, 4, 3]);
        assert_eq!(batch.embs.dims(), [2, 5]);
        assert_eq!(batch.batch_len(), 2);
    }

    #[test]
    fn test_rows_keep_sample_order() {
        let batcher = MelBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.batch(vec![sample(1.0), sample(2.0)]);

        let embs: Vec<f32> = batch.embs.into_data().to_vec().unwrap();
        assert_eq!(&embs[..5], &[1.0; 5]);
        assert_eq!(&embs[5..], &[2.0; 5]);
    }
}
