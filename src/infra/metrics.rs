// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records the three training losses to a CSV file every
// `log_steps` steps.
//
// Columns:
//   step     — 1-based step number the row was logged at
//   org_rec  — MSE between decoder output and input mel
//   pst_rec  — MSE between postnet output and input mel
//   content  — L1 between codes of the reconstruction and
//              codes of the input
//
// Output file: {save_dir}/metrics.csv
//
//   step,org_rec,pst_rec,content
//   250,0.412300,0.398100,0.021400
//   500,0.201800,0.187600,0.018900
//
// The file is appended to, so a resumed run continues the
// same curve. Resuming from step k first removes rows past k,
// keeping steps strictly increasing.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

const HEADER: &str = "step,org_rec,pst_rec,content";

/// One row of the metrics log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepMetrics {
    pub step:    usize,
    pub org_rec: f64,
    pub pst_rec: f64,
    pub content: f64,
}

impl StepMetrics {
    pub fn new(step: usize, org_rec: f64, pst_rec: f64, content: f64) -> Self {
        Self { step, org_rec, pst_rec, content }
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Open `{dir}/metrics.csv`, writing the header if the file is new.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let csv_path = dir.join("metrics.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &StepMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6}",
            m.step, m.org_rec, m.pst_rec, m.content,
        )?;
        Ok(())
    }

    /// Remove every row logged after `step`. Returns how many were removed.
    pub fn truncate_after(&self, step: usize) -> Result<usize> {
        let text = fs::read_to_string(&self.csv_path)
            .with_context(|| format!("Cannot read '{}'", self.csv_path.display()))?;

        let mut kept = String::with_capacity(text.len());
        let mut removed = 0;
        for (i, line) in text.lines().enumerate() {
            let row_step = line.split(',').next().and_then(|s| s.trim().parse::<usize>().ok());
            if i > 0 && row_step.is_some_and(|s| s > step) {
                removed += 1;
                continue;
            }
            kept.push_str(line);
            kept.push('\n');
        }

        if removed > 0 {
            fs::write(&self.csv_path, kept)
                .with_context(|| format!("Cannot rewrite '{}'", self.csv_path.display()))?;
        }
        Ok(removed)
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
