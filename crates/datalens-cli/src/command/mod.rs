use clap::{Parser, Subcommand};

use self::{analyze::AnalyzeArg, generate_dataset::GenerateDatasetArg};

mod analyze;
mod generate_dataset;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Analyze train/validation batches and write figures
    Analyze(#[clap(flatten)] AnalyzeArg),
    /// Generate a synthetic segmentation dataset as JSON Lines
    GenerateDataset(#[clap(flatten)] GenerateDatasetArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Analyze(arg) => analyze::run(&arg)?,
        Mode::GenerateDataset(arg) => generate_dataset::run(&arg)?,
    }
    Ok(())
}
