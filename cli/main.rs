#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::Parser;
use pairnet::config::PipelineConfig;
use pairnet::run::{RunError, run_windowed};
use std::path::{Path, PathBuf};
use std::process;

/// Train a growth-score network on the first window of a shuffled, sampled
/// interaction table.
///
/// Settings come from the windowed preset, overlaid with `pairnet.toml` when it
/// exists in the working directory.
#[derive(Parser, Debug)]
#[command(name = "pairnet-windowed", version)]
pub struct Cli {
    /// Directory receiving the model, history, validation dumps and plots. Its
    /// name also tags the artifact file names. Defaults to the configured
    /// output directory.
    #[arg(long, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

fn run(cli: Cli) -> Result<(), RunError> {
    let config = PipelineConfig::discover_in(Path::new("."), PipelineConfig::windowed())?;
    let summary = run_windowed(&config, cli.directory.as_deref())?;

    println!("Rows loaded:       {}", summary.rows_loaded);
    println!("Rows sampled:      {}", summary.rows_sampled);
    println!("Distinct alleles:  {}", summary.vocabulary_size);
    if let Some(windows) = summary.windows {
        println!("Windows:           {windows}");
    }
    println!(
        "First window:      {} training / {} validation",
        summary.train_rows, summary.validation_rows
    );
    if let (Some(loss), Some(val_loss)) = (summary.final_loss, summary.final_val_loss) {
        println!("Final loss:        {loss:.6} (validation {val_loss:.6})");
    }
    println!("Validation MSE:    {:.6}", summary.validation_mse);
    println!("Model written to:  {}", summary.artifacts.model.display());
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
