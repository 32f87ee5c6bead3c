//! PCA - Principal Component Analysis
//!
//! Computes the top-k eigenvectors of the covariance matrix using power
//! iteration with deflation.

use crate::error::{KolosalError, Result};
use crate::optimizer::ParamValue;
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Transformer;

const MAX_ITER: usize = 1000;
const TOL: f64 = 1e-10;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PcaState {
    mean: Array1<f64>,
    /// One component per row, `(n_components, n_features)`
    components: Array2<f64>,
    explained_variance: Array1<f64>,
    explained_variance_ratio: Array1<f64>,
}

/// Linear projection onto the directions of largest variance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pca {
    /// Number of output dimensions
    pub n_components: usize,
    /// Seed for power iteration initialization
    pub random_state: u64,
    state: Option<PcaState>,
}

impl Default for Pca {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Pca {
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            random_state: 42,
            state: None,
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Principal axes, one per row
    pub fn components(&self) -> Option<&Array2<f64>> {
        self.state.as_ref().map(|s| &s.components)
    }

    /// Variance captured by each component
    pub fn explained_variance(&self) -> Option<&Array1<f64>> {
        self.state.as_ref().map(|s| &s.explained_variance)
    }

    /// Fraction of total variance captured by each component
    pub fn explained_variance_ratio(&self) -> Option<&Array1<f64>> {
        self.state.as_ref().map(|s| &s.explained_variance_ratio)
    }

    /// Power iteration with deflation to extract top-k eigenvectors.
    fn power_iteration(&self, cov: &Array2<f64>, k: usize) -> (Array1<f64>, Array2<f64>) {
        let d = cov.nrows();
        let mut work = cov.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);

        let mut eigenvalues = Array1::zeros(k);
        let mut eigenvectors = Array2::zeros((k, d));

        for component in 0..k {
            let mut v: Array1<f64> = (0..d).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let norm = v.dot(&v).sqrt().max(1e-12);
            v /= norm;

            let mut eigenvalue = 0.0f64;
            for _ in 0..MAX_ITER {
                let w = work.dot(&v);
                eigenvalue = v.dot(&w);

                let w_norm = w.dot(&w).sqrt();
                if w_norm < 1e-12 {
                    break;
                }
                let new_v = w / w_norm;
                let diff = (&new_v - &v).mapv(|a| a * a).sum().sqrt();
                v = new_v;
                if diff < TOL {
                    break;
                }
            }

            // Sign convention: largest-magnitude loading is positive
            let pivot = v.iter().fold(0.0f64, |m, &a| if a.abs() > m.abs() { a } else { m });
            if pivot < 0.0 {
                v.mapv_inplace(|a| -a);
            }

            let eigenvalue = eigenvalue.max(0.0);
            eigenvalues[component] = eigenvalue;
            eigenvectors.row_mut(component).assign(&v);

            // Deflate: A = A - eigenvalue * v * v^T
            for i in 0..d {
                for j in 0..d {
                    work[[i, j]] -= eigenvalue * v[i] * v[j];
                }
            }
        }

        (eigenvalues, eigenvectors)
    }
}

impl Transformer for Pca {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let (n, d) = x.dim();
        if n < 2 {
            return Err(KolosalError::DataError("PCA requires at least 2 samples".to_string()));
        }
        if self.n_components == 0 || self.n_components > d {
            return Err(KolosalError::invalid_param(
                "n_components",
                self.n_components,
                format!("must be in 1..={}", d),
            ));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| KolosalError::DataError("empty input".to_string()))?;
        let centered = x - &mean;
        let cov = centered.t().dot(&centered) / (n as f64 - 1.0);
        let total_variance = cov.diag().sum().max(1e-12);

        let (explained_variance, components) = self.power_iteration(&cov, self.n_components);
        let explained_variance_ratio = &explained_variance / total_variance;

        debug!(
            n_samples = n,
            n_features = d,
            n_components = self.n_components,
            captured = explained_variance_ratio.sum(),
            "PCA fitted"
        );

        self.state = Some(PcaState {
            mean,
            components,
            explained_variance,
            explained_variance_ratio,
        });
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let state = self.state.as_ref().ok_or(KolosalError::ModelNotFitted)?;
        if x.ncols() != state.mean.len() {
            return Err(KolosalError::shape(
                format!("{} features", state.mean.len()),
                format!("{} features", x.ncols()),
            ));
        }
        Ok((x - &state.mean).dot(&state.components.t()))
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_components" => self.n_components = value.as_usize(name)?,
            "random_state" => self.random_state = value.as_usize(name)? as u64,
            _ => return Err(KolosalError::invalid_param(name, value, "unknown parameter for Pca")),
        }
        self.state = None;
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    fn clone_box(&self) -> Box<dyn Transformer> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_pca_basic() {
        // Perfectly linear data has a single axis of variance
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0], [5.0, 10.0]];

        let mut pca = Pca::new(1);
        let z = pca.fit_transform(&x).unwrap();

        assert_eq!(z.dim(), (5, 1));
        let ratio = pca.explained_variance_ratio().unwrap();
        assert!(ratio[0] > 0.999, "ratio = {}", ratio[0]);

        let axis = pca.components().unwrap().row(0).to_owned();
        let expected = array![1.0, 2.0] / 5f64.sqrt();
        assert!((&axis - &expected).mapv(f64::abs).sum() < 1e-6);
    }

    #[test]
    fn test_components_orthonormal() {
        let x = array![
            [2.5, 2.4, 0.5],
            [0.5, 0.7, 1.5],
            [2.2, 2.9, 0.1],
            [1.9, 2.2, 0.9],
            [3.1, 3.0, 0.3],
            [2.3, 2.7, 1.1],
            [2.0, 1.6, 0.2],
            [1.0, 1.1, 1.9]
        ];
        let mut pca = Pca::new(2);
        pca.fit(&x).unwrap();
        let c = pca.components().unwrap();
        let gram = c.dot(&c.t());
        assert!((gram[[0, 0]] - 1.0).abs() < 1e-6);
        assert!((gram[[1, 1]] - 1.0).abs() < 1e-6);
        assert!(gram[[0, 1]].abs() < 1e-6);

        let ratio = pca.explained_variance_ratio().unwrap();
        assert!(ratio[0] >= ratio[1]);
        assert!(ratio.sum() <= 1.0 + 1e-9);
    }

    #[test]
    fn test_projection_is_centered() {
        let x = array![[0.0, 1.0], [2.0, 3.0], [4.0, 1.0], [6.0, 7.0]];
        let mut pca = Pca::new(2);
        let z = pca.fit_transform(&x).unwrap();
        let mean = z.mean_axis(Axis(0)).unwrap();
        assert!(mean.iter().all(|m| m.abs() < 1e-9));
    }

    #[test]
    fn test_invalid_components() {
        let x = array![[0.0, 1.0], [1.0, 0.0]];
        assert!(Pca::new(3).fit(&x).is_err());
        assert!(Pca::new(0).fit(&x).is_err());
        assert!(Pca::new(1).transform(&x).is_err());
    }
}
