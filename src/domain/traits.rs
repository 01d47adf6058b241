// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer talks to these traits, never to
// the concrete loaders behind them.

use anyhow::Result;

use crate::domain::speaker::Speaker;

// ─── SpeakerSource ────────────────────────────────────────────────────────────
/// Any component that can produce a speaker corpus.
///
/// Implementations:
///   - SpeakerLoader → one sub-directory of `.npy` files per speaker
pub trait SpeakerSource {
    /// Load every usable speaker from this source.
    fn load_all(&self) -> Result<Vec<Speaker>>;
}
