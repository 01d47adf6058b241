// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing the training corpus.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits

// A speaker with its embedding and utterance mels
pub mod speaker;

// Core abstractions (traits) that other layers implement
pub mod traits;
