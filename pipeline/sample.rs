//! Seeded row sampling without replacement.

use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SampleError {
    #[error("Sample fraction must be in (0, 1], got {0}.")]
    FractionOutOfRange(f64),
}

/// Number of rows a fractional sample of `n` rows holds.
pub fn sample_size(n: usize, fraction: f64) -> usize {
    ((n as f64) * fraction).round() as usize
}

/// Draws `round(fraction * n)` distinct row indices from `0..n`.
///
/// The same `(n, fraction, seed)` always yields the same indices in the same
/// order. The order is the draw order, not ascending row order.
pub fn sample_rows(n: usize, fraction: f64, seed: u64) -> Result<Vec<usize>, SampleError> {
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(SampleError::FractionOutOfRange(fraction));
    }
    let amount = sample_size(n, fraction).min(n);
    let mut rng = StdRng::seed_from_u64(seed);
    Ok(rand::seq::index::sample(&mut rng, n, amount).into_vec())
}
