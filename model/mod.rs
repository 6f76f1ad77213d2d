//! # Dense Network Driver
//!
//! A stack of fully-connected layers trained with Adam on mean squared error.
//! The first layer reads sparse design rows directly, so a minibatch of allele
//! pairs is never expanded into a dense feature block.

pub mod artifacts;
pub mod network;
pub mod optimizer;
pub mod plot;
pub mod train;

use thiserror::Error;

/// Errors raised while training, evaluating or persisting a network.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read or write a model artifact: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML artifact: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize artifact to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Failed to write CSV artifact: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Failed to render plot: {0}")]
    PlotError(String),
    #[error("Data has {found} feature columns, but the network expects {expected}.")]
    MismatchedFeatureCount { found: usize, expected: usize },
    #[error("Cannot train on an empty training set.")]
    EmptyTrainingSet,
    #[error("Minibatch size must be at least 1 row.")]
    ZeroBatchSize,
    #[error("Network layer {layer} has shape {found:?}, expected {expected:?}.")]
    MalformedLayer {
        layer: usize,
        found: (usize, usize),
        expected: (usize, usize),
    },
}
