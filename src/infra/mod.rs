// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns shared by training and conversion:
//
//   config.rs     — YAML model config loading and validation
//
//   checkpoint.rs — Model + optimizer records (CompactRecorder),
//                   latest-step pointer, JSON run configs
//
//   metrics.rs    — Loss scalars appended to metrics.csv
//
// Reference: Burn Book §5 (Checkpointing)

/// YAML architecture config loading
pub mod config;

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
