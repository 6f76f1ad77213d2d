use std::fs;
use std::path::Path;
use std::process::Command;

use pairnet::model::artifacts::{TrainedModel, load_history};
use tempfile::tempdir;

const HEADER: &str = "Query_allele,Array_allele,aggregated_growth_score,weighted_average_pvalue";

fn write_interactions(path: &Path, rows: usize) {
    let mut text = String::from(HEADER);
    text.push('\n');
    for i in 0..rows {
        let q = i % 9;
        let a = (i * 5) % 13;
        let pvalue = if i % 17 == 0 { "NA".to_string() } else { format!("{}", 0.001 * (i % 50) as f64) };
        text.push_str(&format!(
            "YAL{q:03}W,YBR{a:03}C,{},{pvalue}\n",
            (q as f64 - 4.0) * 0.05 + (a as f64 - 6.0) * 0.02
        ));
    }
    fs::write(path, text).expect("write interaction file");
}

fn write_settings(dir: &Path, input: &str) {
    let settings = format!(
        "input_path = \"{input}\"\n\
output_dir = \"out\"\n\
chunk_size = 50\n\
sample_fraction = 0.5\n\
window_size = 60\n\
batch_size = 20\n\
epochs = 2\n\
input_layer_width = 6\n\
hidden_width = 4\n\
hidden_layers = 2\n"
    );
    fs::write(dir.join("pairnet.toml"), settings).expect("write pairnet.toml");
}

#[test]
fn one_shot_binary_writes_artifacts_into_the_output_dir() {
    let tmp = tempdir().expect("temporary directory");
    write_interactions(&tmp.path().join("interactions.csv"), 300);
    write_settings(tmp.path(), "interactions.csv");

    let status = Command::new(env!("CARGO_BIN_EXE_pairnet"))
        .current_dir(tmp.path())
        .status()
        .expect("run pairnet");
    assert!(status.success(), "pairnet exited with status {status:?}");

    let stem = tmp.path().join("out").join("rawData_2epochs_batch20_6neurons_4layers");
    let model = TrainedModel::load(&stem.with_extension("toml")).expect("model loads");
    assert_eq!(model.vocabulary.len(), model.network.input_dim());

    let history = load_history(&tmp.path().join("out/rawData_2epochs_batch20_6neurons_4layers_training_history.toml"))
        .expect("history loads");
    assert_eq!(history.loss.len(), 2);
    assert_eq!(history.val_loss.len(), 2);
}

#[test]
fn windowed_binary_tags_artifacts_with_the_directory() {
    let tmp = tempdir().expect("temporary directory");
    write_interactions(&tmp.path().join("interactions.csv"), 300);
    write_settings(tmp.path(), "interactions.csv");

    let status = Command::new(env!("CARGO_BIN_EXE_pairnet-windowed"))
        .current_dir(tmp.path())
        .args(["--directory", "NxN"])
        .status()
        .expect("run pairnet-windowed");
    assert!(status.success(), "pairnet-windowed exited with status {status:?}");

    let out = tmp.path().join("NxN");
    let stem = "rawData_NxN_2epochs_batch20_6neurons_4layers";
    for suffix in [
        ".toml",
        "_training_history.toml",
        "_validation_x.csv",
        "_validation_y.csv",
        "_loss.svg",
        "_truth_vs_prediction.svg",
    ] {
        let path = out.join(format!("{stem}{suffix}"));
        assert!(path.is_file(), "{} missing", path.display());
    }

    // 150 sampled rows give two windows of 60; the first holds out 12.
    let targets = fs::read_to_string(out.join(format!("{stem}_validation_y.csv"))).unwrap();
    assert_eq!(targets.lines().count(), 1 + 12);
    let features = fs::read_to_string(out.join(format!("{stem}_validation_x.csv"))).unwrap();
    let header_width = features.lines().next().unwrap().split(',').count();
    assert!(features.lines().all(|line| line.split(',').count() == header_width));
}

#[test]
fn bad_settings_exit_with_failure() {
    let tmp = tempdir().expect("temporary directory");
    fs::write(tmp.path().join("pairnet.toml"), "sample_fraction = 2.0\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_pairnet-windowed"))
        .current_dir(tmp.path())
        .output()
        .expect("run pairnet-windowed");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("sample_fraction"), "unexpected stderr: {stderr}");
}

#[test]
fn missing_input_reports_the_path() {
    let tmp = tempdir().expect("temporary directory");
    write_settings(tmp.path(), "absent.csv");

    let output = Command::new(env!("CARGO_BIN_EXE_pairnet"))
        .current_dir(tmp.path())
        .output()
        .expect("run pairnet");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("absent.csv"), "unexpected stderr: {stderr}");
}
