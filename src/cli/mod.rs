// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap and delegates everything else to Layer 2.
//
//   1. `preprocess` — WAV recordings → per-speaker mel corpus
//   2. `train`      — trains AutoVC on speaker mel-spectrograms
//   3. `convert`    — loads a checkpoint and re-voices one mel

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, ConvertArgs, PreprocessArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "autovc",
    version,
    about = "Train an AutoVC voice conversion model, then convert utterances between speakers."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route the subcommand to its use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Preprocess(args) => run_preprocess(args),
            Commands::Train(args)      => run_train(args),
            Commands::Convert(args)    => run_convert(args),
        }
    }
}

fn run_preprocess(args: PreprocessArgs) -> Result<()> {
    use crate::application::preprocess_use_case::PreprocessUseCase;

    let report = PreprocessUseCase::new(args.into()).execute()?;
    println!(
        "Wrote {} utterances for {} speakers ({} speakers, {} files skipped).",
        report.utterances, report.speakers, report.skipped_speakers, report.skipped_files
    );
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on speakers in: {}", args.data_dir.display());

    let outcome = TrainUseCase::new(args.into()).execute()?;

    match outcome.last {
        Some(m) => println!(
            "Training finished at step {} after {} data passes. \
             org_rec={:.4} pst_rec={:.4} content={:.4}",
            outcome.last_step, outcome.data_passes, m.org_rec, m.pst_rec, m.content
        ),
        None => println!("Nothing to do: already at step {}.", outcome.last_step),
    }
    Ok(())
}

fn run_convert(args: ConvertArgs) -> Result<()> {
    use crate::application::convert_use_case::ConvertUseCase;

    let use_case = ConvertUseCase::new(args.save_dir.clone(), args.step)?;
    let out = use_case.execute(&args.request())?;

    println!("Wrote {} frames to {}", out.frames(), args.output.display());
    Ok(())
}
