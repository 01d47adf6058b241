// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal each
// (building a corpus, training, or converting an utterance).
//
// Rules for this layer:
//   - No model math here (that's Layer 5)
//   - No printing here (that's Layer 1)
//   - File formats live in Layer 4 and 6
//   - Only workflow coordination

// WAV recordings → mel corpus
pub mod preprocess_use_case;

// The training workflow
pub mod train_use_case;

// The voice conversion workflow
pub mod convert_use_case;
