// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn modules and training code live here.
//
//   model.rs     — AutoVC: encoder with content bottleneck,
//                  decoder conditioned on a speaker embedding,
//                  residual postnet, and the three-term loss
//
//   trainer.rs   — Step loop: batch, forward, backward, Adam,
//                  periodic checkpoint and metrics
//
//   converter.rs — Loads a checkpoint and converts one mel to
//                  another speaker's voice
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Qian et al. (2019) AutoVC

/// AutoVC architecture and losses
pub mod model;

/// Step-based training loop with checkpointing
pub mod trainer;

/// Voice conversion from a trained checkpoint
pub mod converter;
