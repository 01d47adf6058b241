// ============================================================
// Layer 4 — Speaker Corpus Loader
// ============================================================
// Loads a preprocessed AutoVC corpus from disk.
//
// Expected layout (one sub-directory per speaker):
//
//   data_dir/
//     p225/
//       emb.npy          ← speaker embedding, shape (dim_emb,) or (1, dim_emb)
//       p225_001.npy     ← utterance mel, shape (frames, n_mels)
//       p225_002.npy
//       ...
//     p226/
//       ...
//
// Speakers missing an embedding or without a single readable
// utterance are skipped with a warning, as are individual
// unreadable utterance files. Only the data directory itself
// being unreadable is fatal.

use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::npy;
use crate::domain::speaker::{Speaker, Utterance};
use crate::domain::traits::SpeakerSource;

/// File name of the per-speaker embedding
pub const EMBEDDING_FILE: &str = "emb.npy";

/// Loads every speaker sub-directory of a data directory.
/// Implements the SpeakerSource trait from Layer 3.
pub struct SpeakerLoader {
    dir: PathBuf,
}

impl SpeakerLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SpeakerSource for SpeakerLoader {
    fn load_all(&self) -> Result<Vec<Speaker>> {
        let mut speaker_dirs: Vec<PathBuf> = fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot read data directory '{}'", self.dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir())
            .collect();

        // read_dir order is platform dependent
        speaker_dirs.sort();

        let mut speakers = Vec::new();
        for path in speaker_dirs {
            match load_speaker(&path) {
                Ok(speaker) => {
                    tracing::debug!(
                        "Loaded speaker '{}': {} utterances, {} frames",
                        speaker.name,
                        speaker.utterances.len(),
                        speaker.total_frames()
                    );
                    speakers.push(speaker);
                }
                Err(e) => {
                    tracing::warn!("Skipping speaker '{}': {:#}", path.display(), e);
                }
            }
        }

        tracing::info!(
            "Loaded {} speakers from '{}'",
            speakers.len(),
            self.dir.display()
        );
        Ok(speakers)
    }
}

/// Load one speaker directory: its embedding plus every utterance mel.
fn load_speaker(dir: &Path) -> Result<Speaker> {
    let name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    let emb_path = dir.join(EMBEDDING_FILE);
    if !emb_path.exists() {
        bail!("no {EMBEDDING_FILE}");
    }
    let embedding = load_embedding(&emb_path)?;

    let mut mel_paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Cannot read '{}'", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("npy"))
        .filter(|p| p.file_name().and_then(|n| n.to_str()) != Some(EMBEDDING_FILE))
        .collect();
    mel_paths.sort();

    let mut utterances = Vec::with_capacity(mel_paths.len());
    for path in mel_paths {
        match load_utterance(&path) {
            Ok(u) => utterances.push(u),
            // One bad file should not drop the whole speaker
            Err(e) => tracing::warn!("Skipping utterance '{}': {:#}", path.display(), e),
        }
    }

    if utterances.is_empty() {
        bail!("no readable utterances");
    }

    Ok(Speaker::new(name, embedding, utterances))
}

/// Load a speaker embedding; accepts shape (dim,) or (1, dim).
pub fn load_embedding(path: &Path) -> Result<Vec<f32>> {
    let arr = npy::read_f32(path)
        .with_context(|| format!("Cannot read embedding '{}'", path.display()))?;

    match arr.shape.as_slice() {
        [_] | [1, _] => Ok(arr.values),
        other => bail!(
            "embedding '{}' has shape {:?}, expected (dim,) or (1, dim)",
            path.display(),
            other
        ),
    }
}

/// Load an utterance mel of shape (frames, n_mels).
pub fn load_utterance(path: &Path) -> Result<Utterance> {
    let arr = npy::read_f32(path)
        .with_context(|| format!("Cannot read mel '{}'", path.display()))?;

    let n_mels = match arr.shape.as_slice() {
        [frames, n_mels] if *frames > 0 && *n_mels > 0 => *n_mels,
        other => bail!("mel has shape {:?}, expected non-empty (frames, n_mels)", other),
    };

    Ok(Utterance::new(path.display().to_string(), n_mels, arr.values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::npy::write_f32;

    fn write_speaker(root: &Path, name: &str, with_emb: bool, mels: &[usize]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        if with_emb {
            write_f32(&dir.join(EMBEDDING_FILE), &[4], &[0.1, 0.2, 0.3, 0.4]).unwrap();
        }
        for (i, frames) in mels.iter().enumerate() {
            let values = vec![0.5; frames * 3];
            write_f32(&dir.join(format!("{name}_{i:03}.npy")), &[*frames, 3], &values).unwrap();
        }
    }

    #[test]
    fn test_loads_speakers_sorted() {
        let root = tempfile::tempdir().unwrap();
        write_speaker(root.path(), "p226", true, &[10]);
        write_speaker(root.path(), "p225", true, &[5, 7]);

        let speakers = SpeakerLoader::new(root.path()).load_all().unwrap();
        assert_eq!(speakers.len(), 2);
        assert_eq!(speakers[0].name, "p225");
        assert_eq!(speakers[0].utterances.len(), 2);
        assert_eq!(speakers[0].embedding.len(), 4);
        assert_eq!(speakers[1].utterances[0].frames(), 10);
    }

    #[test]
    fn test_skips_speaker_without_embedding() {
        let root = tempfile::tempdir().unwrap();
        write_speaker(root.path(), "good", true, &[4]);
        write_speaker(root.path(), "no_emb", false, &[4]);

        let speakers = SpeakerLoader::new(root.path()).load_all().unwrap();
        assert_eq!(speakers.len(), 1);
        assert_eq!(speakers[0].name, "good");
    }

    #[test]
    fn test_skips_speaker_without_utterances() {
        let root = tempfile::tempdir().unwrap();
        write_speaker(root.path(), "empty", true, &[]);
        let speakers = SpeakerLoader::new(root.path()).load_all().unwrap();
        assert!(speakers.is_empty());
    }

    #[test]
    fn test_skips_bad_utterance_but_keeps_speaker() {
        let root = tempfile::tempdir().unwrap();
        write_speaker(root.path(), "p1", true, &[6]);
        fs::write(root.path().join("p1").join("broken.npy"), b"garbage").unwrap();

        let speakers = SpeakerLoader::new(root.path()).load_all().unwrap();
        assert_eq!(speakers[0].utterances.len(), 1);
    }

    #[test]
    fn test_missing_directory_is_error() {
        let root = tempfile::tempdir().unwrap();
        let loader = SpeakerLoader::new(root.path().join("nope"));
        assert!(loader.load_all().is_err());
    }

    #[test]
    fn test_embedding_with_leading_unit_axis() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("emb.npy");
        write_f32(&path, &[1, 3], &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(load_embedding(&path).unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_rank_one_mel_rejected() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("mel.npy");
        write_f32(&path, &[3], &[1.0, 2.0, 3.0]).unwrap();
        assert!(load_utterance(&path).is_err());
    }
}
