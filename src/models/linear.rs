//! Quantized linear regression

use crate::error::{KolosalError, Result};
use crate::fhe::{CompilationConfig, ExecutionMode, FheCircuit};
use crate::optimizer::ParamValue;
use crate::training::{self, Estimator, TaskType};
use crate::utils::metrics::r2_score;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::layer::QuantizedLinearCore;
use super::DEFAULT_N_BITS;

/// Least-squares regression executed with `n_bits` integers
///
/// Training happens in floating point; the fitted coefficients are then
/// quantized so inference can run in the clear or on encrypted inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    n_bits: u8,
    /// Whether to fit intercept
    pub fit_intercept: bool,
    /// Regularization strength (L2)
    pub alpha: f64,
    core: Option<QuantizedLinearCore>,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new(DEFAULT_N_BITS)
    }
}

impl LinearRegression {
    pub fn new(n_bits: u8) -> Self {
        Self {
            n_bits,
            fit_intercept: true,
            alpha: 0.0,
            core: None,
        }
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn n_bits(&self) -> u8 {
        self.n_bits
    }

    pub fn is_fitted(&self) -> bool {
        self.core.is_some()
    }

    pub fn is_compiled(&self) -> bool {
        self.core.as_ref().map_or(false, QuantizedLinearCore::is_compiled)
    }

    /// Compiled circuit, once [`compile`](Self::compile) succeeded
    pub fn circuit(&self) -> Option<&FheCircuit> {
        self.core.as_ref().and_then(QuantizedLinearCore::circuit)
    }

    /// Quantized parameters
    pub fn core(&self) -> Option<&QuantizedLinearCore> {
        self.core.as_ref()
    }

    fn reference_model(&self) -> training::LinearRegression {
        training::LinearRegression::new()
            .with_fit_intercept(self.fit_intercept)
            .with_alpha(self.alpha)
    }

    fn fit_with_reference(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<training::LinearRegression> {
        self.core = None;
        let mut reference = self.reference_model();
        reference.fit(x, y)?;

        let (weights, bias) = match (&reference.coefficients, &reference.intercept) {
            (Some(w), Some(b)) => (w, b),
            _ => return Err(KolosalError::TrainingError("reference model has no coefficients".to_string())),
        };
        self.core = Some(QuantizedLinearCore::fit(self.n_bits, x, weights, bias)?);
        Ok(reference)
    }

    /// Fit on `y` shaped `(n_samples, n_targets)`; drops any compiled circuit
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<&mut Self> {
        self.fit_with_reference(x, y)?;
        Ok(self)
    }

    /// Fit, and return the floating-point model trained on the same data
    pub fn fit_benchmark(mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<(Self, training::LinearRegression)> {
        let reference = self.fit_with_reference(x, y)?;
        Ok((self, reference))
    }

    fn fitted_core(&self) -> Result<&QuantizedLinearCore> {
        self.core.as_ref().ok_or(KolosalError::ModelNotFitted)
    }

    /// Clear quantized inference, `(n_samples, n_targets)`
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.predict_with(x, ExecutionMode::Clear)
    }

    pub fn predict_with(&self, x: &Array2<f64>, mode: ExecutionMode) -> Result<Array2<f64>> {
        self.fitted_core()?.forward(x, mode)
    }

    /// Compile for encrypted execution, calibrating on `x`
    pub fn compile(&mut self, x: &Array2<f64>, config: &CompilationConfig) -> Result<&FheCircuit> {
        self.core.as_mut().ok_or(KolosalError::ModelNotFitted)?.compile(x, config)
    }

    /// R² of clear predictions
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
            "n_bits" => self.n_bits = value.as_u8(name)?,
            "alpha" => self.alpha = value.as_f64(name)?,
            "fit_intercept" => self.fit_intercept = value.as_bool(name)?,
            _ => return Err(KolosalError::invalid_param(name, value, "unknown parameter for LinearRegression")),
        }
        self.core = None;
        Ok(())
    }

    fn task(&self) -> TaskType {
        TaskType::Regression
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn data() -> (Array2<f64>, Array2<f64>) {
        let x = array![[1.0, 1.0], [2.0, 1.0], [1.0, 2.0], [2.0, 2.0], [3.0, 1.0], [0.0, 3.0]];
        let y = x.dot(&array![[2.0], [3.0]]) + 1.0;
        (x, y)
    }

    #[test]
    fn test_fit_benchmark_returns_matching_reference() {
        let (x, y) = data();
        let (model, reference) = LinearRegression::new(12).fit_benchmark(&x, &y).unwrap();
        let r2 = r2_score(&reference.predict(&x).unwrap(), &model.predict(&x).unwrap()).unwrap();
        assert!(r2 > 0.999, "r2 = {}", r2);
    }

    #[test]
    fn test_not_fitted() {
        let model = LinearRegression::default();
        assert_eq!(model.n_bits(), DEFAULT_N_BITS);
        assert!(matches!(model.predict(&array![[1.0, 2.0]]), Err(KolosalError::ModelNotFitted)));
        let mut model = model;
        assert!(matches!(
            model.compile(&array![[1.0, 2.0]], &CompilationConfig::for_testing()),
            Err(KolosalError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_refit_drops_circuit() {
        let (x, y) = data();
        let mut model = LinearRegression::new(3);
        model.fit(&x, &y).unwrap();
        model.compile(&x, &CompilationConfig::for_testing()).unwrap();
        assert!(model.is_compiled());

        model.fit(&x, &y).unwrap();
        assert!(model.is_fitted());
        assert!(!model.is_compiled());
    }

    #[test]
    fn test_set_n_bits_resets_fit() {
        let (x, y) = data();
        let mut model = LinearRegression::new(3);
        model.fit(&x, &y).unwrap();
        Estimator::set_param(&mut model, "n_bits", &ParamValue::Int(5)).unwrap();
        assert_eq!(model.n_bits(), 5);
        assert!(!model.is_fitted());
        assert!(Estimator::set_param(&mut model, "n_bits", &ParamValue::Float(2.5)).is_err());
    }

    #[test]
    fn test_large_intercept_fails_cleanly() {
        let x = Array2::from_shape_fn((50, 1), |(i, _)| i as f64 / 49.0);
        let y = x.mapv(|v| 1e7 + 1e-6 * v);
        let mut model = LinearRegression::new(20);
        assert!(matches!(model.fit(&x, &y), Err(KolosalError::QuantizationError(_))));
        assert!(!model.is_fitted());
    }

    #[test]
    fn test_invalid_bit_width_fails_fit() {
        let (x, y) = data();
        assert!(LinearRegression::new(0).fit(&x, &y).is_err());
        assert!(LinearRegression::new(40).fit(&x, &y).is_err());
    }
}
