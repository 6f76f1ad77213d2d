//! Minibatch training loop, evaluation and batched prediction.

use super::ModelError;
use super::network::{DenseNetwork, Gradients};
use super::optimizer::Adam;
use crate::dataset::EncodedDataset;
use crate::design::SparseDesign;
use crate::minibatch::MinibatchProvider;
use crate::progress::create_progress_bar;
use ndarray::{Array1, Axis};
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Rows per prediction block; blocks are evaluated in parallel.
const PREDICT_BLOCK_ROWS: usize = 4_096;

/// Per-epoch training loss and, when a validation set was given, validation
/// loss. Both are mean squared error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub loss: Vec<f64>,
    #[serde(default)]
    pub val_loss: Vec<f64>,
}

impl TrainingHistory {
    pub fn epochs(&self) -> usize {
        self.loss.len()
    }

    pub fn final_loss(&self) -> Option<f64> {
        self.loss.last().copied()
    }

    pub fn final_val_loss(&self) -> Option<f64> {
        self.val_loss.last().copied()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FitOptions {
    pub epochs: usize,
    pub batch_size: usize,
    /// Redraw the minibatch order after every epoch.
    pub shuffle: bool,
}

fn check_features(network: &DenseNetwork, design: &SparseDesign) -> Result<(), ModelError> {
    if design.n_cols() != network.input_dim() {
        return Err(ModelError::MismatchedFeatureCount {
            found: design.n_cols(),
            expected: network.input_dim(),
        });
    }
    Ok(())
}

/// Trains `network` in place for `options.epochs` epochs.
///
/// Each epoch visits every training row once in minibatches of
/// `options.batch_size`; the recorded training loss is the row-weighted mean of
/// the minibatch losses. Validation loss is computed after each epoch.
pub fn fit<R: Rng + ?Sized>(
    network: &mut DenseNetwork,
    optimizer: &mut Adam,
    train: &EncodedDataset,
    validation: Option<&EncodedDataset>,
    options: &FitOptions,
    rng: &mut R,
) -> Result<TrainingHistory, ModelError> {
    if train.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    if options.batch_size == 0 {
        return Err(ModelError::ZeroBatchSize);
    }
    check_features(network, train.design())?;
    if let Some(validation) = validation {
        check_features(network, validation.design())?;
    }

    let mut provider = MinibatchProvider::new(train.len(), options.batch_size, options.shuffle, rng);
    let mut grads = Gradients::zeros_like(network);
    let mut history = TrainingHistory::default();
    let targets = train.targets().mapv(|t| t as f32);

    log::info!(
        "Training on {} rows for {} epochs ({} minibatches of up to {} rows per epoch)",
        train.len(),
        options.epochs,
        provider.len(),
        options.batch_size
    );
    let pb = create_progress_bar(Some(options.epochs as u64), "Training");

    for epoch in 1..=options.epochs {
        let mut weighted_loss = 0.0f64;
        for rows in provider.iter() {
            let batch = train.design().select_rows(rows);
            let batch_targets = targets.select(Axis(0), rows);
            let loss = network.loss_and_gradients(&batch, batch_targets.view(), &mut grads);
            optimizer.step(network, &grads);
            weighted_loss += f64::from(loss) * rows.len() as f64;
        }
        let loss = weighted_loss / train.len() as f64;
        history.loss.push(loss);

        match validation.filter(|v| !v.is_empty()) {
            Some(validation) => {
                let val_loss = evaluate(network, validation)?;
                history.val_loss.push(val_loss);
                log::info!("Epoch {epoch}/{}: loss {loss:.6}, val_loss {val_loss:.6}", options.epochs);
                pb.set_message(format!("loss {loss:.4} val_loss {val_loss:.4}"));
            }
            None => {
                log::info!("Epoch {epoch}/{}: loss {loss:.6}", options.epochs);
                pb.set_message(format!("loss {loss:.4}"));
            }
        }
        pb.inc(1);
        provider.on_epoch_end(rng);
    }
    pb.finish_with_message("Training complete");
    Ok(history)
}

/// Predictions for every row of `design`, in row order.
pub fn predict(network: &DenseNetwork, design: &SparseDesign) -> Result<Array1<f64>, ModelError> {
    check_features(network, design)?;
    let rows: Vec<usize> = (0..design.n_rows()).collect();
    let blocks: Vec<Array1<f32>> = rows
        .par_chunks(PREDICT_BLOCK_ROWS)
        .map(|block| network.forward(&design.select_rows(block)))
        .collect();
    Ok(blocks
        .iter()
        .flat_map(|block| block.iter().map(|&p| f64::from(p)))
        .collect())
}

/// Mean squared error of the network over `dataset`.
pub fn evaluate(network: &DenseNetwork, dataset: &EncodedDataset) -> Result<f64, ModelError> {
    if dataset.is_empty() {
        return Ok(0.0);
    }
    let predictions = predict(network, dataset.design())?;
    let sum: f64 = predictions
        .iter()
        .zip(dataset.targets().iter())
        .map(|(p, t)| (p - t) * (p - t))
        .sum();
    Ok(sum / dataset.len() as f64)
}
