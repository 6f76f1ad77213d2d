//! SVG figures for a finished run. The figures carry no text, so rendering
//! needs no font support.

use super::ModelError;
use super::train::TrainingHistory;
use itertools::{Itertools, MinMaxResult};
use plotters::prelude::*;
use std::path::Path;

fn plot_error<E: std::fmt::Display>(e: E) -> ModelError {
    ModelError::PlotError(e.to_string())
}

/// Span of `values` padded by 5% on each side; degenerate spans are widened
/// so the chart range is never empty. With no finite values the range is
/// exactly `0..1`.
fn value_range<'a>(values: impl Iterator<Item = &'a f64>) -> (f64, f64) {
    let (lo, hi) = match values.filter(|v| v.is_finite()).minmax_by(|a, b| a.total_cmp(b)) {
        MinMaxResult::NoElements => return (0.0, 1.0),
        MinMaxResult::OneElement(&v) => (v, v),
        MinMaxResult::MinMax(&lo, &hi) => (lo, hi),
    };
    let pad = if hi > lo { (hi - lo) * 0.05 } else { 0.5 };
    (lo - pad, hi + pad)
}

/// Training loss in red and validation loss in blue, one point per epoch.
pub fn plot_loss_curves(history: &TrainingHistory, path: &Path) -> Result<(), ModelError> {
    let root = SVGBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let epochs = history.epochs().max(1) as f64;
    let (lo, hi) = value_range(history.loss.iter().chain(history.val_loss.iter()));
    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .build_cartesian_2d(1.0..epochs.max(2.0), lo.min(0.0)..hi)
        .map_err(plot_error)?;

    let series = [(&history.loss, RED), (&history.val_loss, BLUE)];
    for (values, color) in series {
        chart
            .draw_series(LineSeries::new(
                values
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| ((i + 1) as f64, v)),
                ShapeStyle::from(&color).stroke_width(2),
            ))
            .map_err(plot_error)?;
    }
    root.present().map_err(plot_error)?;
    Ok(())
}

/// Scatter of observed against predicted growth scores with the identity line.
pub fn plot_truth_vs_prediction(
    truth: &[f64],
    predicted: &[f64],
    path: &Path,
) -> Result<(), ModelError> {
    let root = SVGBackend::new(path, (600, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let (lo, hi) = value_range(truth.iter().chain(predicted.iter()));
    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .build_cartesian_2d(lo..hi, lo..hi)
        .map_err(plot_error)?;

    chart
        .draw_series(LineSeries::new(
            [(lo, lo), (hi, hi)],
            ShapeStyle::from(&BLACK).stroke_width(1),
        ))
        .map_err(plot_error)?;
    chart
        .draw_series(
            truth
                .iter()
                .zip(predicted.iter())
                .filter(|(t, p)| t.is_finite() && p.is_finite())
                .map(|(&t, &p)| Circle::new((t, p), 2, BLUE.mix(0.5).filled())),
        )
        .map_err(plot_error)?;
    root.present().map_err(plot_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn range_is_padded_and_never_empty() {
        assert_eq!(value_range([0.0f64; 0].iter()), (0.0, 1.0));
        assert_eq!(value_range([f64::NAN, f64::INFINITY].iter()), (0.0, 1.0));
        assert_eq!(value_range([2.0].iter()), (1.5, 2.5));
        let (lo, hi) = value_range([0.0, f64::NAN, 10.0].iter());
        assert!((lo + 0.5).abs() < 1e-12);
        assert!((hi - 10.5).abs() < 1e-12);
    }

    #[test]
    fn writes_both_figures() {
        let dir = tempdir().unwrap();
        let history = TrainingHistory {
            loss: vec![1.0, 0.5, 0.25],
            val_loss: vec![1.2, 0.7, 0.4],
        };
        let loss_path = dir.path().join("loss.svg");
        plot_loss_curves(&history, &loss_path).unwrap();

        let scatter_path = dir.path().join("scatter.svg");
        plot_truth_vs_prediction(&[0.1, 0.2, 0.3], &[0.15, 0.18, 0.35], &scatter_path).unwrap();

        for path in [loss_path, scatter_path] {
            let svg = std::fs::read_to_string(&path).unwrap();
            assert!(svg.contains("<svg"), "{} is not an svg", path.display());
        }
    }

    #[test]
    fn single_epoch_history_still_plots() {
        let dir = tempdir().unwrap();
        let history = TrainingHistory {
            loss: vec![0.3],
            val_loss: Vec::new(),
        };
        plot_loss_curves(&history, &dir.path().join("loss.svg")).unwrap();
    }
}
