//! Random linear regression problems

use super::{make_rng, rows_to_array, shuffle_rows_and_features, standard_normal, standard_normal_matrix, uniform_matrix};
use crate::error::{KolosalError, Result};
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Parameters of [`make_regression`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionConfig {
    pub n_samples: usize,
    pub n_features: usize,
    /// Features with a non-zero ground-truth coefficient
    pub n_informative: usize,
    pub n_targets: usize,
    pub bias: f64,
    /// Standard deviation of the Gaussian noise added to the targets
    pub noise: f64,
    pub shuffle: bool,
    pub random_state: Option<u64>,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            n_samples: 100,
            n_features: 100,
            n_informative: 10,
            n_targets: 1,
            bias: 0.0,
            noise: 0.0,
            shuffle: true,
            random_state: None,
        }
    }
}

impl RegressionConfig {
    pub fn new(n_samples: usize, n_features: usize) -> Self {
        Self {
            n_samples,
            n_features,
            ..Self::default()
        }
    }

    pub fn with_informative(mut self, n_informative: usize) -> Self {
        self.n_informative = n_informative;
        self
    }

    pub fn with_targets(mut self, n_targets: usize) -> Self {
        self.n_targets = n_targets;
        self
    }

    pub fn with_bias(mut self, bias: f64) -> Self {
        self.bias = bias;
        self
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }
}

/// Generate `(x, y)` with `y = x·w + bias + noise`, `y` shaped `(n_samples, n_targets)`.
///
/// Only the first `n_informative` features (before shuffling) carry weight; their
/// coefficients are drawn from `100 * U(0, 1)`.
pub fn make_regression(config: &RegressionConfig) -> Result<(Array2<f64>, Array2<f64>)> {
    if config.n_samples == 0 || config.n_features == 0 {
        return Err(KolosalError::DataError(
            "make_regression needs at least one sample and one feature".to_string(),
        ));
    }
    if config.n_targets == 0 {
        return Err(KolosalError::invalid_param("n_targets", 0, "must be positive"));
    }
    if config.noise < 0.0 {
        return Err(KolosalError::invalid_param("noise", config.noise, "must be non-negative"));
    }

    let mut rng = make_rng(config.random_state);
    let n_informative = config.n_informative.min(config.n_features);

    let x = standard_normal_matrix(&mut rng, config.n_samples, config.n_features);

    let mut ground_truth = Array2::<f64>::zeros((config.n_features, config.n_targets));
    let informative = uniform_matrix(&mut rng, n_informative, config.n_targets) * 100.0;
    ground_truth.slice_mut(s![..n_informative, ..]).assign(&informative);

    let mut y = x.dot(&ground_truth) + config.bias;
    if config.noise > 0.0 {
        y.mapv_inplace(|v| v + config.noise * standard_normal(&mut rng));
    }

    debug!(
        n_samples = config.n_samples,
        n_features = config.n_features,
        n_informative,
        n_targets = config.n_targets,
        "Generated regression dataset"
    );

    if !config.shuffle {
        return Ok((x, y));
    }

    let rows: Vec<_> = y.rows().into_iter().map(|r| r.to_owned()).collect();
    let (x, rows, _) = shuffle_rows_and_features(&mut rng, &x, &rows);
    Ok((x, rows_to_array(rows, config.n_targets)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::LinearRegression;

    #[test]
    fn test_shapes() {
        let config = RegressionConfig::new(200, 14).with_informative(14).with_targets(2).with_random_state(42);
        let (x, y) = make_regression(&config).unwrap();
        assert_eq!(x.dim(), (200, 14));
        assert_eq!(y.dim(), (200, 2));
    }

    #[test]
    fn test_seed_is_reproducible() {
        let config = RegressionConfig::new(50, 5).with_random_state(3);
        let (x1, y1) = make_regression(&config).unwrap();
        let (x2, y2) = make_regression(&config).unwrap();
        assert_eq!(x1, x2);
        assert_eq!(y1, y2);
    }

    #[test]
    fn test_noiseless_targets_are_linear() {
        let config = RegressionConfig::new(100, 6).with_random_state(11);
        let (x, y) = make_regression(&config).unwrap();
        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();
        let r2 = model.score(&x, &y).unwrap();
        assert!(r2 > 0.999_999, "noiseless data should be fit exactly, R² = {}", r2);
    }

    #[test]
    fn test_rejects_zero_targets() {
        let config = RegressionConfig::new(10, 2).with_targets(0);
        assert!(make_regression(&config).is_err());
    }
}
