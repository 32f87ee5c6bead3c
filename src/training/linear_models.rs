//! Floating-point linear models
//!
//! These are the reference implementations the quantized models in
//! [`crate::models`] are benchmarked against.

use crate::error::{KolosalError, Result};
use crate::optimizer::ParamValue;
use crate::utils::metrics::{accuracy_score, r2_score};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::{Estimator, TaskType};

/// Cholesky factor `L` of a symmetric positive-definite matrix (`A = L Lᵀ`).
/// Retries once with a small ridge when the matrix is not positive definite.
fn cholesky_factor(a: &Array2<f64>) -> Option<Array2<f64>> {
    fn factor(a: &Array2<f64>) -> Option<Array2<f64>> {
        let n = a.nrows();
        let mut l = Array2::zeros((n, n));
        for i in 0..n {
            for j in 0..=i {
                let mut sum = 0.0;
                for k in 0..j {
                    sum += l[[i, k]] * l[[j, k]];
                }
                if i == j {
                    let diag = a[[i, i]] - sum;
                    if diag <= 0.0 {
                        return None;
                    }
                    l[[i, j]] = diag.sqrt();
                } else {
                    l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
                }
            }
        }
        Some(l)
    }

    let n = a.nrows();
    if n != a.ncols() {
        return None;
    }
    factor(a).or_else(|| {
        let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
        let mut a_reg = a.clone();
        for k in 0..n {
            a_reg[[k, k]] += ridge.max(1e-12);
        }
        factor(&a_reg)
    })
}

/// Solve `L Lᵀ x = b` given the Cholesky factor
fn cholesky_solve(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();

    // Forward substitution: L * y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }
    x
}

/// Gauss-Jordan inverse with partial pivoting, the fallback for singular Gram matrices
fn matrix_inverse(m: &Array2<f64>) -> Option<Array2<f64>> {
    let n = m.nrows();
    if n != m.ncols() {
        return None;
    }

    let mut aug = Array2::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = m[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    for col in 0..n {
        let mut max_row = col;
        for row in col + 1..n {
            if aug[[row, col]].abs() > aug[[max_row, col]].abs() {
                max_row = row;
            }
        }
        if max_row != col {
            for j in 0..2 * n {
                aug.swap([col, j], [max_row, j]);
            }
        }
        if aug[[col, col]].abs() < 1e-10 {
            return None;
        }

        let pivot = aug[[col, col]];
        for j in 0..2 * n {
            aug[[col, j]] /= pivot;
        }
        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                for j in 0..2 * n {
                    aug[[row, j]] -= factor * aug[[col, j]];
                }
            }
        }
    }

    let mut inv = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            inv[[i, j]] = aug[[i, n + j]];
        }
    }
    Some(inv)
}

/// Solve `(XᵀX + alpha I) W = XᵀY` for every target column at once
fn solve_normal_equations(x: &Array2<f64>, y: &Array2<f64>, alpha: f64) -> Result<Array2<f64>> {
    let n_features = x.ncols();
    let mut xtx = x.t().dot(x);
    if alpha > 0.0 {
        for i in 0..n_features {
            xtx[[i, i]] += alpha;
        }
    }
    let xty = x.t().dot(y);

    if let Some(l) = cholesky_factor(&xtx) {
        let mut w = Array2::zeros((n_features, y.ncols()));
        for (t, rhs) in xty.axis_iter(Axis(1)).enumerate() {
            w.column_mut(t).assign(&cholesky_solve(&l, &rhs.to_owned()));
        }
        return Ok(w);
    }

    matrix_inverse(&xtx)
        .map(|inv| inv.dot(&xty))
        .ok_or_else(|| KolosalError::ComputationError("Matrix is singular, cannot solve least squares".to_string()))
}

fn check_rows(x: &Array2<f64>, n_targets: usize) -> Result<()> {
    if x.nrows() != n_targets {
        return Err(KolosalError::shape(
            format!("y length = {}", x.nrows()),
            format!("y length = {}", n_targets),
        ));
    }
    if x.nrows() == 0 {
        return Err(KolosalError::DataError("cannot fit on an empty dataset".to_string()));
    }
    Ok(())
}

/// Ordinary least squares with optional intercept and L2 penalty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Fitted coefficients, shape `(n_features, n_targets)`
    pub coefficients: Option<Array2<f64>>,
    /// Fitted intercept per target
    pub intercept: Option<Array1<f64>>,
    /// Whether to fit intercept
    pub fit_intercept: bool,
    /// Regularization strength (L2)
    pub alpha: f64,
    /// Whether model is fitted
    pub is_fitted: bool,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    /// Create a new linear regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            fit_intercept: true,
            alpha: 0.0,
            is_fitted: false,
        }
    }

    /// Enable/disable fitting intercept
    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// Set regularization strength (Ridge regression)
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Fit the model, `y` shaped `(n_samples, n_targets)`
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<&mut Self> {
        check_rows(x, y.nrows())?;

        let (coefficients, intercept) = if self.fit_intercept {
            let x_mean = x.mean_axis(Axis(0)).ok_or_else(|| KolosalError::DataError("empty x".to_string()))?;
            let y_mean = y.mean_axis(Axis(0)).ok_or_else(|| KolosalError::DataError("empty y".to_string()))?;
            let x_centered = x - &x_mean;
            let y_centered = y - &y_mean;

            let w = solve_normal_equations(&x_centered, &y_centered, self.alpha)?;
            let b = &y_mean - &x_mean.dot(&w);
            (w, b)
        } else {
            let w = solve_normal_equations(x, y, self.alpha)?;
            (w, Array1::zeros(y.ncols()))
        };

        debug!(n_samples = x.nrows(), n_features = x.ncols(), n_targets = y.ncols(), "Fitted linear regression");

        self.coefficients = Some(coefficients);
        self.intercept = Some(intercept);
        self.is_fitted = true;
        Ok(self)
    }

    fn params(&self) -> Result<(&Array2<f64>, &Array1<f64>)> {
        match (&self.coefficients, &self.intercept) {
            (Some(w), Some(b)) if self.is_fitted => Ok((w, b)),
            _ => Err(KolosalError::ModelNotFitted),
        }
    }

    /// Make predictions, shape `(n_samples, n_targets)`
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (w, b) = self.params()?;
        if x.ncols() != w.nrows() {
            return Err(KolosalError::shape(
                format!("{} features", w.nrows()),
                format!("{} features", x.ncols()),
            ));
        }
        Ok(x.dot(w) + b)
    }

    /// Get R² score
    pub fn score(&self, x: &Array2<f64>, y: &Array2<f64>) -> Result<f64> {
        r2_score(y, &self.predict(x)?)
    }
}

impl Estimator for LinearRegression {
    type Target = Array2<f64>;
    type Output = Array2<f64>;

    fn fit(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<()> {
        LinearRegression::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        LinearRegression::predict(self, x)
    }

    fn score(&self, x: &Array2<f64>, y: &Array2<f64>) -> Result<f64> {
        LinearRegression::score(self, x, y)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "alpha" => self.alpha = value.as_f64(name)?,
            "fit_intercept" => self.fit_intercept = value.as_bool(name)?,
            _ => return Err(KolosalError::invalid_param(name, value, "unknown parameter for LinearRegression")),
        }
        self.is_fitted = false;
        Ok(())
    }

    fn task(&self) -> TaskType {
        TaskType::Regression
    }
}

/// L2-regularized logistic regression
///
/// Binary problems learn a single logit passed through a sigmoid; with more
/// classes one logit per class is learned and normalized with a softmax.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients, shape `(n_features, n_logits)`
    pub coefficients: Option<Array2<f64>>,
    /// Fitted intercept per logit
    pub intercept: Option<Array1<f64>>,
    /// Sorted distinct training labels
    pub classes: Vec<usize>,
    /// Regularization strength (L2)
    pub alpha: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance
    pub tol: f64,
    /// Learning rate
    pub learning_rate: f64,
    /// Whether model is fitted
    pub is_fitted: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    /// Create a new logistic regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            classes: Vec::new(),
            alpha: 0.01,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
            is_fitted: false,
        }
    }

    /// Set regularization strength
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub(crate) fn sigmoid(z: f64) -> f64 {
        1.0 / (1.0 + (-z).exp())
    }

    /// Turn logits into class probabilities, shape `(n_samples, n_classes)`
    pub(crate) fn logits_to_proba(logits: &Array2<f64>) -> Array2<f64> {
        if logits.ncols() == 1 {
            let p = logits.column(0).mapv(Self::sigmoid);
            let mut proba = Array2::zeros((logits.nrows(), 2));
            proba.column_mut(0).assign(&p.mapv(|v| 1.0 - v));
            proba.column_mut(1).assign(&p);
            return proba;
        }

        let mut proba = logits.clone();
        for mut row in proba.rows_mut() {
            let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|v| v / sum);
        }
        proba
    }

    /// Index of the most probable class per row; first index wins ties
    pub(crate) fn argmax_rows(proba: &Array2<f64>) -> Array1<usize> {
        proba
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0usize, f64::NEG_INFINITY), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
                    .0
            })
            .collect()
    }

    /// One-hot target matrix for the logits being learned
    fn encode_targets(&self, y: &Array1<usize>) -> Array2<f64> {
        let n_logits = if self.classes.len() == 2 { 1 } else { self.classes.len() };
        let mut t = Array2::zeros((y.len(), n_logits));
        for (i, label) in y.iter().enumerate() {
            // classes is sorted and built from y, so the search always succeeds
            let idx = self.classes.binary_search(label).unwrap_or(0);
            if n_logits == 1 {
                t[[i, 0]] = idx as f64;
            } else {
                t[[i, idx]] = 1.0;
            }
        }
        t
    }

    /// Fit the model using full-batch gradient descent
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<&mut Self> {
        check_rows(x, y.len())?;

        let mut classes: Vec<usize> = y.iter().copied().collect();
        classes.sort_unstable();
        classes.dedup();
        if classes.len() < 2 {
            return Err(KolosalError::TrainingError(format!(
                "LogisticRegression needs at least 2 classes, got {}",
                classes.len()
            )));
        }
        self.classes = classes;

        let n_samples = x.nrows() as f64;
        let targets = self.encode_targets(y);
        let n_logits = targets.ncols();

        let mut weights = Array2::<f64>::zeros((x.ncols(), n_logits));
        let mut bias = Array1::<f64>::zeros(n_logits);
        let mut iterations = 0;

        for _ in 0..self.max_iter {
            iterations += 1;
            let logits = x.dot(&weights) + &bias;
            let predictions = if n_logits == 1 {
                logits.mapv(Self::sigmoid)
            } else {
                Self::logits_to_proba(&logits)
            };

            let errors = &predictions - &targets;
            let dw = x.t().dot(&errors) / n_samples + &(&weights * self.alpha);
            let db = errors.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_logits));

            let grad_norm = (dw.mapv(|v| v * v).sum() + db.mapv(|v| v * v).sum()).sqrt();
            if grad_norm < self.tol {
                break;
            }

            weights = weights - &(dw * self.learning_rate);
            bias = bias - &(db * self.learning_rate);
        }

        debug!(
            n_samples = x.nrows(),
            n_classes = self.classes.len(),
            iterations,
            "Fitted logistic regression"
        );

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        self.is_fitted = true;
        Ok(self)
    }

    /// Raw logits, shape `(n_samples, n_logits)`
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (w, b) = match (&self.coefficients, &self.intercept) {
            (Some(w), Some(b)) if self.is_fitted => (w, b),
            _ => return Err(KolosalError::ModelNotFitted),
        };
        if x.ncols() != w.nrows() {
            return Err(KolosalError::shape(
                format!("{} features", w.nrows()),
                format!("{} features", x.ncols()),
            ));
        }
        Ok(x.dot(w) + b)
    }

    /// Predict probabilities, shape `(n_samples, n_classes)`
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(Self::logits_to_proba(&self.decision_function(x)?))
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(Self::argmax_rows(&proba).mapv(|i| self.classes[i]))
    }

    /// Get accuracy score
    pub fn score(&self, x: &Array2<f64>, y: &Array1<usize>) -> Result<f64> {
        accuracy_score(y, &self.predict(x)?)
    }
}

impl Estimator for LogisticRegression {
    type Target = Array1<usize>;
    type Output = Array1<usize>;

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<()> {
        LogisticRegression::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        LogisticRegression::predict(self, x)
    }

    fn score(&self, x: &Array2<f64>, y: &Array1<usize>) -> Result<f64> {
        LogisticRegression::score(self, x, y)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "alpha" => self.alpha = value.as_f64(name)?,
            "max_iter" => self.max_iter = value.as_usize(name)?,
            "learning_rate" => self.learning_rate = value.as_f64(name)?,
            _ => return Err(KolosalError::invalid_param(name, value, "unknown parameter for LogisticRegression")),
        }
        self.is_fitted = false;
        Ok(())
    }

    fn task(&self) -> TaskType {
        TaskType::Classification
    }
}
