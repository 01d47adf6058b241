// ============================================================
// Layer 6 — Model Config Loader
// ============================================================
// The architecture is described by a YAML file such as:
//
//   dim_neck: 32
//   dim_emb: 256
//   dim_pre: 512
//   freq: 32
//
// Absent keys take the AutoVC defaults; unknown keys are
// ignored so a config shared with other tools still loads.

use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::ml::model::AutoVcConfig;

/// Read, parse and validate a YAML model config.
pub fn load_model_config(path: &Path) -> Result<AutoVcConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read config '{}'", path.display()))?;

    let cfg = if text.trim().is_empty() {
        AutoVcConfig::default()
    } else {
        serde_yaml::from_str::<AutoVcConfig>(&text)
            .with_context(|| format!("Cannot parse config '{}'", path.display()))?
    };

    cfg.validate()
        .with_context(|| format!("Invalid config '{}'", path.display()))?;

    tracing::debug!("Model config: {:?}", cfg);
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(text: &str) -> tempfile::NamedTempFile {
        let f = tempfile::NamedTempFile::new().unwrap();
        fs::write(f.path(), text).unwrap();
        f
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let f = write("dim_neck: 16\nfreq: 16\n");
        let cfg = load_model_config(f.path()).unwrap();
        assert_eq!(cfg.dim_neck, 16);
        assert_eq!(cfg.freq, 16);
        assert_eq!(cfg.dim_emb, 256);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let f = write("dim_neck: 8\nsample_rate: 16000\n");
        assert_eq!(load_model_config(f.path()).unwrap().dim_neck, 8);
    }

    #[test]
    fn test_empty_file_is_default() {
        let f = write("\n");
        assert_eq!(load_model_config(f.path()).unwrap(), AutoVcConfig::default());
    }

    #[test]
    fn test_invalid_value_rejected() {
        let f = write("freq: 0\n");
        assert!(load_model_config(f.path()).is_err());
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        let f = write("dim_neck: [not, a, number]\n");
        assert!(load_model_config(f.path()).is_err());
    }

    #[test]
    fn test_missing_file_rejected() {
        assert!(load_model_config(Path::new("/definitely/not/here.yaml")).is_err());
    }
}
