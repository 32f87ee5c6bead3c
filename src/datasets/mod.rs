//! Synthetic dataset generators
//!
//! Seeded generators for regression and classification problems with
//! controllable dimensionality, noise, separability and class count:
//! - [`make_regression`] - random linear model with Gaussian features
//! - [`make_classification`] - Gaussian clusters on hypercube vertices

mod classification;
mod regression;

pub use classification::{make_classification, ClassificationConfig};
pub use regression::{make_regression, RegressionConfig};

use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Build the generator RNG, seeded when a random state is given
pub(crate) fn make_rng(random_state: Option<u64>) -> ChaCha8Rng {
    match random_state {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// One standard normal draw (Marsaglia polar method)
pub(crate) fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    loop {
        let u: f64 = rng.gen_range(-1.0..1.0);
        let v: f64 = rng.gen_range(-1.0..1.0);
        let s = u * u + v * v;
        if s > 0.0 && s < 1.0 {
            return u * (-2.0 * s.ln() / s).sqrt();
        }
    }
}

/// Matrix of independent standard normal draws
pub(crate) fn standard_normal_matrix<R: Rng>(rng: &mut R, rows: usize, cols: usize) -> Array2<f64> {
    Array2::from_shape_simple_fn((rows, cols), || standard_normal(rng))
}

/// Matrix of independent U(0, 1) draws
pub(crate) fn uniform_matrix<R: Rng>(rng: &mut R, rows: usize, cols: usize) -> Array2<f64> {
    Array2::from_shape_simple_fn((rows, cols), || rng.gen::<f64>())
}

/// Shuffle rows of `x` and the matching rows of the targets, then permute feature columns
pub(crate) fn shuffle_rows_and_features<R: Rng, T: Clone>(
    rng: &mut R,
    x: &Array2<f64>,
    targets: &[T],
) -> (Array2<f64>, Vec<T>, Vec<usize>) {
    let n_samples = x.nrows();
    let n_features = x.ncols();

    let mut rows: Vec<usize> = (0..n_samples).collect();
    rows.shuffle(rng);
    let mut cols: Vec<usize> = (0..n_features).collect();
    cols.shuffle(rng);

    let shuffled = Array2::from_shape_fn((n_samples, n_features), |(i, j)| x[[rows[i], cols[j]]]);
    let targets = rows.iter().map(|&i| targets[i].clone()).collect();

    (shuffled, targets, cols)
}

/// Collect target rows back into an array
pub(crate) fn rows_to_array(rows: Vec<Array1<f64>>, n_cols: usize) -> Array2<f64> {
    let n_rows = rows.len();
    let mut out = Array2::zeros((n_rows, n_cols));
    for (i, row) in rows.into_iter().enumerate() {
        out.row_mut(i).assign(&row);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_normal_moments() {
        let mut rng = make_rng(Some(7));
        let draws: Vec<f64> = (0..20_000).map(|_| standard_normal(&mut rng)).collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        let var = draws.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / draws.len() as f64;
        assert!(mean.abs() < 0.05, "mean = {}", mean);
        assert!((var - 1.0).abs() < 0.05, "var = {}", var);
    }

    #[test]
    fn test_shuffle_keeps_rows_paired() {
        let mut rng = make_rng(Some(1));
        let x = Array2::from_shape_fn((5, 1), |(i, _)| i as f64);
        let targets: Vec<usize> = (0..5).collect();
        let (xs, ts, _) = shuffle_rows_and_features(&mut rng, &x, &targets);
        for (i, t) in ts.iter().enumerate() {
            assert_eq!(xs[[i, 0]], *t as f64);
        }
    }
}
