// ========================================================================================
//
//                      THE ONE-SHOT ORCHESTRATOR: PAIRNET
//
// ========================================================================================
//
// Trains a growth-score regressor on a seeded fraction of the interaction table, holding
// out a single validation split of the sampled rows.
//
// ### Configuration ###
//
// There are no tuning flags. Paths and hyperparameters come from the one-shot preset,
// overlaid with `pairnet.toml` when that file exists in the working directory.

use clap::Parser;
use pairnet::config::PipelineConfig;
use pairnet::run::{RunSummary, run_one_shot};
use std::path::Path;
use std::process;
use std::time::Instant;

// ========================================================================================
//                         COMMAND-LINE INTERFACE DEFINITION
// ========================================================================================

#[derive(Parser, Debug)]
#[clap(
    name = "pairnet",
    version,
    about = "Train a growth-score network on one train/validation split of allele pairs."
)]
struct Args {}

// ========================================================================================
//                           THE MAIN ORCHESTRATION LOGIC
// ========================================================================================

fn main() {
    let start_time = Instant::now();
    Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match PipelineConfig::discover_in(Path::new("."), PipelineConfig::one_shot()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };
    eprintln!("> Reading interactions from {}", config.input_path.display());

    match run_one_shot(&config) {
        Ok(summary) => report(&summary),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }

    eprintln!("> Finished in {:.2?}", start_time.elapsed());
}

fn report(summary: &RunSummary) {
    println!("Rows loaded:       {}", summary.rows_loaded);
    println!("Rows sampled:      {}", summary.rows_sampled);
    println!("Distinct alleles:  {}", summary.vocabulary_size);
    println!(
        "Split:             {} training / {} validation",
        summary.train_rows, summary.validation_rows
    );
    if let Some(loss) = summary.final_loss {
        println!("Final loss:        {loss:.6}");
    }
    println!("Validation MSE:    {:.6}", summary.validation_mse);
    println!("Model written to:  {}", summary.artifacts.model.display());
}
