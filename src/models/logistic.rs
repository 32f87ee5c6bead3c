//! Quantized logistic regression

use crate::error::{KolosalError, Result};
use crate::fhe::{CompilationConfig, ExecutionMode, FheCircuit};
use crate::optimizer::ParamValue;
use crate::training::{self, Estimator, TaskType};
use crate::utils::metrics::accuracy_score;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::layer::QuantizedLinearCore;
use super::DEFAULT_N_BITS;

/// Logistic regression whose logits are computed with `n_bits` integers
///
/// The sigmoid/softmax runs on dequantized logits after the integer layer,
/// so only the linear part ever needs to be encrypted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    n_bits: u8,
    /// Regularization strength (L2)
    pub alpha: f64,
    /// Maximum gradient descent iterations
    pub max_iter: usize,
    /// Learning rate
    pub learning_rate: f64,
    classes: Vec<usize>,
    core: Option<QuantizedLinearCore>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(DEFAULT_N_BITS)
    }
}

impl LogisticRegression {
    pub fn new(n_bits: u8) -> Self {
        let reference = training::LogisticRegression::new();
        Self {
            n_bits,
            alpha: reference.alpha,
            max_iter: reference.max_iter,
            learning_rate: reference.learning_rate,
            classes: Vec::new(),
            core: None,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn n_bits(&self) -> u8 {
        self.n_bits
    }

    /// Sorted distinct training labels
    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    pub fn is_fitted(&self) -> bool {
        self.core.is_some()
    }

    pub fn is_compiled(&self) -> bool {
        self.core.as_ref().map_or(false, QuantizedLinearCore::is_compiled)
    }

    pub fn circuit(&self) -> Option<&FheCircuit> {
        self.core.as_ref().and_then(QuantizedLinearCore::circuit)
    }

    pub fn core(&self) -> Option<&QuantizedLinearCore> {
        self.core.as_ref()
    }

    fn fit_with_reference(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<training::LogisticRegression> {
        self.core = None;
        let mut reference = training::LogisticRegression::new()
            .with_alpha(self.alpha)
            .with_max_iter(self.max_iter)
            .with_learning_rate(self.learning_rate);
        reference.fit(x, y)?;

        let (weights, bias) = match (&reference.coefficients, &reference.intercept) {
            (Some(w), Some(b)) => (w, b),
            _ => return Err(KolosalError::TrainingError("reference model has no coefficients".to_string())),
        };
        self.core = Some(QuantizedLinearCore::fit(self.n_bits, x, weights, bias)?);
        self.classes = reference.classes.clone();
        Ok(reference)
    }

    /// Fit on integer class labels; drops any compiled circuit
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<&mut Self> {
        self.fit_with_reference(x, y)?;
        Ok(self)
    }

    /// Fit, and return the floating-point model trained on the same data
    pub fn fit_benchmark(
        mut self,
        x: &Array2<f64>,
        y: &Array1<usize>,
    ) -> Result<(Self, training::LogisticRegression)> {
        let reference = self.fit_with_reference(x, y)?;
        Ok((self, reference))
    }

    /// Dequantized logits, `(n_samples, n_logits)`
    pub fn decision_function_with(&self, x: &Array2<f64>, mode: ExecutionMode) -> Result<Array2<f64>> {
        self.core.as_ref().ok_or(KolosalError::ModelNotFitted)?.forward(x, mode)
    }

    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.decision_function_with(x, ExecutionMode::Clear)
    }

    /// Class probabilities, `(n_samples, n_classes)`
    pub fn predict_proba_with(&self, x: &Array2<f64>, mode: ExecutionMode) -> Result<Array2<f64>> {
        let logits = self.decision_function_with(x, mode)?;
        Ok(training::LogisticRegression::logits_to_proba(&logits))
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.predict_proba_with(x, ExecutionMode::Clear)
    }

    /// Class labels
    pub fn predict_with(&self, x: &Array2<f64>, mode: ExecutionMode) -> Result<Array1<usize>> {
        let proba = self.predict_proba_with(x, mode)?;
        Ok(training::LogisticRegression::argmax_rows(&proba).mapv(|i| self.classes[i]))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        self.predict_with(x, ExecutionMode::Clear)
    }

    /// Compile for encrypted execution, calibrating on `x`
    pub fn compile(&mut self, x: &Array2<f64>, config: &CompilationConfig) -> Result<&FheCircuit> {
        self.core.as_mut().ok_or(KolosalError::ModelNotFitted)?.compile(x, config)
    }

    /// Accuracy of clear predictions
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
            "n_bits" => self.n_bits = value.as_u8(name)?,
            "alpha" => self.alpha = value.as_f64(name)?,
            "max_iter" => self.max_iter = value.as_usize(name)?,
            "learning_rate" => self.learning_rate = value.as_f64(name)?,
            _ => return Err(KolosalError::invalid_param(name, value, "unknown parameter for LogisticRegression")),
        }
        self.core = None;
        Ok(())
    }

    fn task(&self) -> TaskType {
        TaskType::Classification
    }
}
