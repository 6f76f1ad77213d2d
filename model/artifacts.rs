//! On-disk outputs of a run: the trained model, its training history, and the
//! validation split it was scored against.

use super::ModelError;
use super::network::DenseNetwork;
use super::train::{TrainingHistory, predict};
use crate::dataset::EncodedDataset;
use crate::design::{CollisionPolicy, encode_with_vocabulary};
use crate::registry::Vocabulary;
use crate::table::GROWTH_SCORE;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// A trained network together with the column layout it was trained on.
///
/// Serialized to TOML. Field order matters: scalar fields come before the
/// nested network tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub collision_policy: CollisionPolicy,
    pub vocabulary: Vocabulary,
    pub network: DenseNetwork,
}

impl TrainedModel {
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Loads a model and checks that its parameters agree with its stored
    /// architecture and vocabulary.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let toml_string = fs::read_to_string(path)?;
        let model: TrainedModel = toml::from_str(&toml_string)?;
        model.network.check_shapes()?;
        if model.vocabulary.len() != model.network.input_dim() {
            return Err(ModelError::MismatchedFeatureCount {
                found: model.vocabulary.len(),
                expected: model.network.input_dim(),
            });
        }
        Ok(model)
    }

    /// Predicted growth scores for new allele pairs. Alleles outside the
    /// vocabulary contribute no input.
    pub fn predict_pairs<S: AsRef<str>>(
        &self,
        query_allele: &[S],
        array_allele: &[S],
    ) -> Result<Array1<f64>, ModelError> {
        let design = encode_with_vocabulary(
            &self.vocabulary,
            query_allele,
            array_allele,
            self.collision_policy,
        );
        predict(&self.network, &design)
    }
}

/// File stem shared by every artifact of a run, e.g.
/// `rawData_NxN_300epochs_batch1000_4066neurons_12layers`.
pub fn model_stem(
    tag: Option<&str>,
    epochs: usize,
    batch_size: usize,
    first_layer_width: usize,
    layer_count: usize,
) -> String {
    let suffix = format!(
        "{epochs}epochs_batch{batch_size}_{first_layer_width}neurons_{layer_count}layers"
    );
    match tag {
        Some(tag) if !tag.is_empty() => format!("rawData_{tag}_{suffix}"),
        _ => format!("rawData_{suffix}"),
    }
}

/// Locations of every artifact written for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub history: PathBuf,
    pub validation_x: PathBuf,
    pub validation_y: PathBuf,
    pub loss_plot: PathBuf,
    pub truth_vs_prediction_plot: PathBuf,
}

impl ArtifactPaths {
    pub fn new(output_dir: &Path, stem: &str) -> Self {
        let file = |suffix: &str| output_dir.join(format!("{stem}{suffix}"));
        Self {
            model: file(".toml"),
            history: file("_training_history.toml"),
            validation_x: file("_validation_x.csv"),
            validation_y: file("_validation_y.csv"),
            loss_plot: file("_loss.svg"),
            truth_vs_prediction_plot: file("_truth_vs_prediction.svg"),
        }
    }
}

pub fn save_history(history: &TrainingHistory, path: &Path) -> Result<(), ModelError> {
    fs::write(path, toml::to_string_pretty(history)?)?;
    Ok(())
}

pub fn load_history(path: &Path) -> Result<TrainingHistory, ModelError> {
    Ok(toml::from_str(&fs::read_to_string(path)?)?)
}

fn format_feature<'a>(value: f32, buffer: &'a mut ryu::Buffer) -> &'a [u8] {
    if value == 0.0 {
        b"0"
    } else if value == 1.0 {
        b"1"
    } else if value == 2.0 {
        b"2"
    } else {
        buffer.format(value).as_bytes()
    }
}

/// Writes the validation features as a dense table with one column per
/// vocabulary entry. Rows are expanded one at a time.
pub fn write_validation_features(
    dataset: &EncodedDataset,
    vocabulary: &Vocabulary,
    path: &Path,
) -> Result<(), ModelError> {
    if vocabulary.len() != dataset.n_features() {
        return Err(ModelError::MismatchedFeatureCount {
            found: dataset.n_features(),
            expected: vocabulary.len(),
        });
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(vocabulary.names())?;

    let mut dense = Vec::with_capacity(dataset.n_features());
    let mut buffer = ryu::Buffer::new();
    for row in 0..dataset.len() {
        dataset.design().row_values_dense(row, &mut dense);
        for &value in &dense {
            writer.write_field(format_feature(value, &mut buffer))?;
        }
        writer.write_record(None::<&[u8]>)?;
    }
    writer.flush()?;
    log::info!(
        "Wrote {} validation rows x {} columns to '{}'",
        dataset.len(),
        dataset.n_features(),
        path.display()
    );
    Ok(())
}

/// Writes the validation growth scores, one per line under a single header.
pub fn write_validation_targets(dataset: &EncodedDataset, path: &Path) -> Result<(), ModelError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([GROWTH_SCORE])?;
    let mut buffer = ryu::Buffer::new();
    for &target in dataset.targets() {
        writer.write_record([buffer.format(target)])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::encode_pairs;
    use crate::model::network::NetworkArchitecture;
    use ndarray::array;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tempfile::tempdir;

    fn toy_dataset() -> (Vocabulary, EncodedDataset) {
        let encoded = encode_pairs(&["A", "B", "A"], &["B", "C", "A"], CollisionPolicy::Sum);
        let dataset = EncodedDataset::new(encoded.design, array![1.0, 2.0, 3.5]).unwrap();
        (encoded.vocabulary, dataset)
    }

    fn toy_model(vocabulary: Vocabulary) -> TrainedModel {
        let architecture = NetworkArchitecture {
            input_dim: vocabulary.len(),
            input_layer_width: 4,
            hidden_width: 3,
            hidden_layers: 1,
        };
        TrainedModel {
            collision_policy: CollisionPolicy::Sum,
            vocabulary,
            network: DenseNetwork::new(&architecture, &mut StdRng::seed_from_u64(8)),
        }
    }

    #[test]
    fn stems_carry_the_run_shape() {
        assert_eq!(
            model_stem(Some("NxN"), 300, 1000, 4066, 12),
            "rawData_NxN_300epochs_batch1000_4066neurons_12layers"
        );
        assert_eq!(
            model_stem(None, 300, 10000, 4066, 12),
            "rawData_300epochs_batch10000_4066neurons_12layers"
        );
        let paths = ArtifactPaths::new(Path::new("out"), "run");
        assert_eq!(paths.model, PathBuf::from("out/run.toml"));
        assert_eq!(paths.validation_y, PathBuf::from("out/run_validation_y.csv"));
    }

    #[test]
    fn saved_model_predicts_identically_after_reload() {
        let dir = tempdir().unwrap();
        let (vocabulary, dataset) = toy_dataset();
        let model = toy_model(vocabulary);
        let path = dir.path().join("model.toml");
        model.save(&path).unwrap();

        let loaded = TrainedModel::load(&path).unwrap();
        assert_eq!(loaded.vocabulary, model.vocabulary);
        let before = predict(&model.network, dataset.design()).unwrap();
        let after = predict(&loaded.network, dataset.design()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn predict_pairs_matches_encoded_prediction() {
        let (vocabulary, dataset) = toy_dataset();
        let model = toy_model(vocabulary);
        let by_pairs = model
            .predict_pairs(&["A", "B", "A"], &["B", "C", "A"])
            .unwrap();
        assert_eq!(by_pairs, predict(&model.network, dataset.design()).unwrap());
        assert_eq!(model.predict_pairs(&["Z"], &["A"]).unwrap().len(), 1);
    }

    #[test]
    fn validation_dump_is_dense_with_vocabulary_header() {
        let dir = tempdir().unwrap();
        let (vocabulary, dataset) = toy_dataset();
        let x_path = dir.path().join("x.csv");
        let y_path = dir.path().join("y.csv");
        write_validation_features(&dataset, &vocabulary, &x_path).unwrap();
        write_validation_targets(&dataset, &y_path).unwrap();

        let x = fs::read_to_string(&x_path).unwrap();
        assert_eq!(x, "A,B,C\n1,1,0\n0,1,1\n2,0,0\n");
        let y = fs::read_to_string(&y_path).unwrap();
        assert_eq!(y, "aggregated_growth_score\n1.0\n2.0\n3.5\n");
    }

    #[test]
    fn history_round_trips() {
        let dir = tempdir().unwrap();
        let history = TrainingHistory {
            loss: vec![0.9, 0.4],
            val_loss: vec![1.0, 0.6],
        };
        let path = dir.path().join("history.toml");
        save_history(&history, &path).unwrap();
        assert_eq!(load_history(&path).unwrap(), history);
    }
}
