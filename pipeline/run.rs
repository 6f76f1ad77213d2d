//! # Run Orchestration
//!
//! The two end-to-end flows behind the binaries. Both load the interaction
//! table in chunks, keep a seeded fraction of its rows, encode the allele pairs
//! and hand one train/validation split to the network driver. They differ only
//! in how that split is drawn: [`run_one_shot`] splits every sampled row,
//! [`run_windowed`] trains on the first window of a [`WindowedSplitter`].

use crate::config::{ConfigError, PipelineConfig};
use crate::dataset::{EncodedDataset, ShapeError};
use crate::design::encode_pairs;
use crate::loader::{LoadError, load_table};
use crate::model::ModelError;
use crate::model::artifacts::{
    ArtifactPaths, TrainedModel, model_stem, save_history, write_validation_features,
    write_validation_targets,
};
use crate::model::network::{DenseNetwork, NetworkArchitecture};
use crate::model::optimizer::{Adam, AdamConfig};
use crate::model::plot::{plot_loss_curves, plot_truth_vs_prediction};
use crate::model::train::{FitOptions, evaluate, fit, predict};
use crate::registry::Vocabulary;
use crate::sample::{SampleError, sample_rows};
use crate::split::{SplitError, TrainValidationSplit, WindowedSplitter, train_validation_split};
use ndarray::Array1;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Sample(#[from] SampleError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("Failed to create output directory '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "The sampled data has {rows} rows, fewer than one window of {window}; no window to train on."
    )]
    NoCompleteWindow { rows: usize, window: usize },
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub rows_loaded: usize,
    pub rows_sampled: usize,
    pub vocabulary_size: usize,
    pub train_rows: usize,
    pub validation_rows: usize,
    /// Windows available to the windowed flow; `None` for the one-shot flow.
    pub windows: Option<usize>,
    pub final_loss: Option<f64>,
    pub final_val_loss: Option<f64>,
    pub validation_mse: f64,
    pub artifacts: ArtifactPaths,
}

struct PreparedData {
    rows_loaded: usize,
    vocabulary: Vocabulary,
    dataset: EncodedDataset,
}

/// Load, sample and encode.
fn prepare(config: &PipelineConfig) -> Result<PreparedData, RunError> {
    let table = load_table(&config.input_path, config.loader_options())?;
    let rows_loaded = table.len();
    log::info!("Number of rows: {rows_loaded}");
    log::debug!("Table holds about {} bytes of column data", table.heap_bytes());

    log::info!(
        "Sampling {} of the rows with seed {}",
        config.sample_fraction,
        config.seed
    );
    let rows = sample_rows(table.len(), config.sample_fraction, config.seed)?;
    let sampled = table.take(&rows);
    drop(table);

    log::info!("Encoding allele pairs into a sparse design matrix");
    let encoded = encode_pairs(
        &sampled.query_allele,
        &sampled.array_allele,
        config.collision_policy,
    );
    log::info!(
        "{} distinct alleles across {} sampled rows",
        encoded.vocabulary.len(),
        sampled.len()
    );
    let dataset = EncodedDataset::new(encoded.design, Array1::from(sampled.growth_score))?;

    Ok(PreparedData {
        rows_loaded,
        vocabulary: encoded.vocabulary,
        dataset,
    })
}

fn train_and_persist(
    config: &PipelineConfig,
    prepared: PreparedData,
    split: TrainValidationSplit,
    windows: Option<usize>,
    tag: Option<&str>,
    output_dir: &Path,
    rng: &mut StdRng,
) -> Result<RunSummary, RunError> {
    fs::create_dir_all(output_dir).map_err(|source| RunError::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let vocabulary_size = prepared.vocabulary.len();
    let architecture = NetworkArchitecture {
        input_dim: vocabulary_size,
        input_layer_width: config.input_layer_width.unwrap_or(vocabulary_size).max(1),
        hidden_width: config.hidden_width,
        hidden_layers: config.hidden_layers,
    };
    let mut network = DenseNetwork::new(&architecture, rng);
    let mut optimizer = Adam::new(
        &network,
        AdamConfig {
            learning_rate: config.learning_rate as f32,
            ..AdamConfig::default()
        },
    );

    let options = FitOptions {
        epochs: config.epochs,
        batch_size: config.batch_size,
        shuffle: config.reshuffle_each_epoch,
    };
    let history = fit(
        &mut network,
        &mut optimizer,
        &split.train,
        Some(&split.validation),
        &options,
        rng,
    )?;

    let stem = model_stem(
        tag,
        config.epochs,
        config.batch_size,
        architecture.input_layer_width,
        architecture.depth(),
    );
    let artifacts = ArtifactPaths::new(output_dir, &stem);

    save_history(&history, &artifacts.history)?;
    write_validation_features(&split.validation, &prepared.vocabulary, &artifacts.validation_x)?;
    write_validation_targets(&split.validation, &artifacts.validation_y)?;

    let validation_mse = evaluate(&network, &split.validation)?;
    log::info!("Validation MSE: {validation_mse:.6}");

    let predictions = predict(&network, split.validation.design())?;
    let model = TrainedModel {
        collision_policy: config.collision_policy,
        vocabulary: prepared.vocabulary,
        network,
    };
    model.save(&artifacts.model)?;
    log::info!("Saved model to '{}'", artifacts.model.display());

    plot_loss_curves(&history, &artifacts.loss_plot)?;
    plot_truth_vs_prediction(
        split.validation.targets().as_slice().unwrap_or(&[]),
        predictions.as_slice().unwrap_or(&[]),
        &artifacts.truth_vs_prediction_plot,
    )?;

    Ok(RunSummary {
        rows_loaded: prepared.rows_loaded,
        rows_sampled: prepared.dataset.len(),
        vocabulary_size,
        train_rows: split.train.len(),
        validation_rows: split.validation.len(),
        windows,
        final_loss: history.final_loss(),
        final_val_loss: history.final_val_loss(),
        validation_mse,
        artifacts,
    })
}

/// Splits every sampled row once and trains on the result.
pub fn run_one_shot(config: &PipelineConfig) -> Result<RunSummary, RunError> {
    config.validate()?;
    let prepared = prepare(config)?;

    log::info!("Splitting into training and validation sets");
    let mut rng = StdRng::seed_from_u64(config.seed);
    let split = train_validation_split(&prepared.dataset, config.validation_fraction, &mut rng)?;

    let output_dir = config.output_dir.clone();
    train_and_persist(config, prepared, split, None, None, &output_dir, &mut rng)
}

/// Walks the sampled rows in windows of `config.window_size` and trains on
/// the first one. Artifacts go to `directory` when given, otherwise to
/// `config.output_dir`; the directory's name tags the artifact file names.
pub fn run_windowed(
    config: &PipelineConfig,
    directory: Option<&Path>,
) -> Result<RunSummary, RunError> {
    config.validate()?;
    let prepared = prepare(config)?;

    let output_dir = directory.unwrap_or(&config.output_dir).to_path_buf();
    let tag = output_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());

    log::info!(
        "Splitting into windows of {} rows",
        config.window_size
    );
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut splitter = WindowedSplitter::new(
        &prepared.dataset,
        config.window_size,
        config.validation_fraction,
        config.drop_incomplete_final_batch,
        &mut rng,
    )?;
    let windows = splitter.window_count();
    if splitter.dropped_rows() > 0 {
        log::info!(
            "{} trailing rows do not fill a window and are left out",
            splitter.dropped_rows()
        );
    }
    let first = splitter.next();
    drop(splitter);

    let split = first.ok_or(RunError::NoCompleteWindow {
        rows: prepared.dataset.len(),
        window: config.window_size,
    })?;
    if split.train.is_empty() {
        return Err(SplitError::EmptyTrainingSet {
            rows: split.validation.len(),
            validation_fraction: config.validation_fraction,
        }
        .into());
    }
    log::info!(
        "Training on window 1 of {windows}: {} training / {} validation rows",
        split.train.len(),
        split.validation.len()
    );

    train_and_persist(
        config,
        prepared,
        split,
        Some(windows),
        tag.as_deref(),
        &output_dir,
        &mut rng,
    )
}
