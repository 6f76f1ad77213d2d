//! # Run Configuration
//!
//! Every path and hyperparameter of a training run lives in [`PipelineConfig`].
//! Each entry point starts from its own preset and overlays the keys found in
//! an optional `pairnet.toml` in the working directory; keys absent from the
//! file keep the preset value. Unknown keys are rejected.

use crate::design::CollisionPolicy;
use crate::loader::{DEFAULT_CHUNK_SIZE, LoaderOptions};
use crate::table::TableSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the working directory by both binaries.
pub const CONFIG_FILE_NAME: &str = "pairnet.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize configuration to TOML: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Delimited interaction file.
    pub input_path: PathBuf,
    /// Directory receiving model, history, validation dumps and plots.
    pub output_dir: PathBuf,
    /// Single ASCII field delimiter.
    pub delimiter: char,
    /// Rows parsed per loader chunk.
    pub chunk_size: usize,
    /// Fraction of loaded rows kept for training, in (0, 1].
    pub sample_fraction: f64,
    /// Fraction of each split held out for validation, in [0, 1).
    pub validation_fraction: f64,
    /// Rows per window of the windowed splitter.
    pub window_size: usize,
    pub drop_incomplete_final_batch: bool,
    /// Rows per optimizer step.
    pub batch_size: usize,
    pub epochs: usize,
    /// Width of the first dense layer. When unset, the vocabulary size is used.
    pub input_layer_width: Option<usize>,
    pub hidden_width: usize,
    pub hidden_layers: usize,
    pub learning_rate: f64,
    pub collision_policy: CollisionPolicy,
    pub reshuffle_each_epoch: bool,
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::one_shot()
    }
}

impl PipelineConfig {
    /// Preset of the single-split entry point.
    pub fn one_shot() -> Self {
        Self {
            input_path: PathBuf::from("yeastRawData_StrainID_aggregateGrowth_weightedPval.csv"),
            output_dir: PathBuf::from("."),
            delimiter: ',',
            chunk_size: DEFAULT_CHUNK_SIZE,
            sample_fraction: 0.2,
            validation_fraction: 0.2,
            window_size: 1_000,
            drop_incomplete_final_batch: true,
            batch_size: 10_000,
            epochs: 300,
            input_layer_width: Some(4_066),
            hidden_width: 64,
            hidden_layers: 10,
            learning_rate: 1e-3,
            collision_policy: CollisionPolicy::Sum,
            reshuffle_each_epoch: true,
            seed: 42,
        }
    }

    /// Preset of the windowed entry point.
    pub fn windowed() -> Self {
        Self {
            input_path: PathBuf::from("NxN_yeastRawData_StrainID_aggregateGrowth_weightedPval.csv"),
            output_dir: PathBuf::from("NxN"),
            sample_fraction: 0.5,
            batch_size: 1_000,
            input_layer_width: None,
            ..Self::one_shot()
        }
    }

    /// Overlays the keys of a TOML document on `base`.
    pub fn from_toml_str(text: &str, base: &PipelineConfig) -> Result<Self, ConfigError> {
        let overrides: toml::Table = text.parse()?;
        let mut merged = match toml::Value::try_from(base)? {
            toml::Value::Table(table) => table,
            other => {
                return Err(ConfigError::Invalid(format!(
                    "expected a table, found {}",
                    other.type_str()
                )));
            }
        };
        merged.extend(overrides);
        let config: PipelineConfig = toml::Value::Table(merged).try_into()?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path, base: &PipelineConfig) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, base)
    }

    /// Loads `dir/pairnet.toml` over `base` when the file exists, otherwise
    /// returns `base`. The result is validated either way.
    pub fn discover_in(dir: &Path, base: PipelineConfig) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            log::info!("Reading configuration overrides from '{}'", path.display());
            Self::load(&path, &base)
        } else {
            base.validate()?;
            Ok(base)
        }
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if !(self.sample_fraction > 0.0 && self.sample_fraction <= 1.0) {
            return invalid(format!(
                "sample_fraction must be in (0, 1], got {}",
                self.sample_fraction
            ));
        }
        if !(0.0..1.0).contains(&self.validation_fraction) {
            return invalid(format!(
                "validation_fraction must be in [0, 1), got {}",
                self.validation_fraction
            ));
        }
        for (name, value) in [
            ("chunk_size", self.chunk_size),
            ("window_size", self.window_size),
            ("batch_size", self.batch_size),
            ("epochs", self.epochs),
            ("hidden_width", self.hidden_width),
        ] {
            if value == 0 {
                return invalid(format!("{name} must be at least 1"));
            }
        }
        if self.input_layer_width == Some(0) {
            return invalid("input_layer_width must be at least 1 when set".to_string());
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid(format!(
                "learning_rate must be finite and positive, got {}",
                self.learning_rate
            ));
        }
        if !self.delimiter.is_ascii() {
            return invalid(format!(
                "delimiter must be a single ASCII character, got {:?}",
                self.delimiter
            ));
        }
        Ok(())
    }

    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            delimiter: self.delimiter as u8,
            chunk_size: self.chunk_size,
            schema: TableSchema::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn presets_are_valid() {
        PipelineConfig::one_shot().validate().unwrap();
        PipelineConfig::windowed().validate().unwrap();
        assert_eq!(PipelineConfig::windowed().input_layer_width, None);
        assert_eq!(PipelineConfig::windowed().chunk_size, 100_000);
    }

    #[test]
    fn overrides_replace_only_listed_keys() {
        let text = "epochs = 5\ncollision_policy = \"binary\"\ninput_layer_width = 12\n";
        let config = PipelineConfig::from_toml_str(text, &PipelineConfig::windowed()).unwrap();
        assert_eq!(config.epochs, 5);
        assert_eq!(config.collision_policy, CollisionPolicy::Binary);
        assert_eq!(config.input_layer_width, Some(12));
        assert_eq!(config.batch_size, 1_000);
        assert_eq!(config.output_dir, PathBuf::from("NxN"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = PipelineConfig::from_toml_str("epoch = 5\n", &PipelineConfig::one_shot());
        assert!(matches!(err, Err(ConfigError::TomlParseError(_))));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for text in [
            "sample_fraction = 0.0",
            "sample_fraction = 1.5",
            "validation_fraction = 1.0",
            "batch_size = 0",
            "learning_rate = -0.1",
            "input_layer_width = 0",
            "delimiter = \"é\"",
        ] {
            let result = PipelineConfig::from_toml_str(text, &PipelineConfig::one_shot());
            assert!(
                matches!(result, Err(ConfigError::Invalid(_))),
                "{text} should be invalid, got {result:?}"
            );
        }
    }

    #[test]
    fn round_trips_through_toml() {
        let config = PipelineConfig::one_shot();
        let text = config.to_toml_string().unwrap();
        let parsed = PipelineConfig::from_toml_str(&text, &PipelineConfig::windowed()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn discovery_falls_back_to_the_preset() {
        let dir = tempdir().unwrap();
        let config = PipelineConfig::discover_in(dir.path(), PipelineConfig::windowed()).unwrap();
        assert_eq!(config, PipelineConfig::windowed());

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "seed = 7\n").unwrap();
        let config = PipelineConfig::discover_in(dir.path(), PipelineConfig::windowed()).unwrap();
        assert_eq!(config.seed, 7);
    }

    #[test]
    fn tab_delimiter_maps_to_loader_byte() {
        let config = PipelineConfig::from_toml_str("delimiter = \"\\t\"", &PipelineConfig::one_shot())
            .unwrap();
        assert_eq!(config.loader_options().delimiter, b'\t');
    }
}
