// ============================================================
// Layer 4 — Fixed-Length Mel Segments
// ============================================================
// Utterances vary in length but a batch tensor needs every
// sample to have exactly `seg_len` frames.
//
//   frames >  seg_len → take a window of seg_len frames
//                       starting at `offset`
//   frames == seg_len → returned as-is
//   frames <  seg_len → zero-padded at the end
//
// Example with seg_len=4, offset=1:
//   Utterance: f0 f1 f2 f3 f4 f5
//   Segment:      f1 f2 f3 f4
//
// Example with seg_len=4:
//   Utterance: f0 f1
//   Segment:   f0 f1 0  0

use crate::domain::speaker::Utterance;

/// Largest valid crop offset for an utterance of `frames` frames.
pub fn max_offset(frames: usize, seg_len: usize) -> usize {
    frames.saturating_sub(seg_len)
}

/// Cut or pad `utterance` to exactly `seg_len` frames.
///
/// `offset` is clamped to [`max_offset`], so any value is safe.
pub fn crop_or_pad(utterance: &Utterance, seg_len: usize, offset: usize) -> Vec<f32> {
    let n_mels = utterance.n_mels;
    let frames = utterance.frames();
    let offset = offset.min(max_offset(frames, seg_len));

    let take = seg_len.min(frames - offset);
    let mut out = Vec::with_capacity(seg_len * n_mels);
    out.extend_from_slice(&utterance.values[offset * n_mels..(offset + take) * n_mels]);
    out.resize(seg_len * n_mels, 0.0);
    out
}

/// Zero-pad a row-major mel so its frame count is a multiple of `multiple`.
/// Returns the padded buffer and its new frame count.
pub fn pad_to_multiple(values: &[f32], n_mels: usize, multiple: usize) -> (Vec<f32>, usize) {
    let frames = values.len() / n_mels;
    let padded_frames = frames.div_ceil(multiple).max(1) * multiple;

    let mut out = values.to_vec();
    out.resize(padded_frames * n_mels, 0.0);
    (out, padded_frames)
}
