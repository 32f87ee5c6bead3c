//! Feature scaling

use crate::error::{KolosalError, Result};
use crate::optimizer::ParamValue;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::Transformer;

/// Parameters for a fitted scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalerParams {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

/// Standard scaling (z-score normalization): `(x - mean) / std`
///
/// Uses the population standard deviation; constant features keep a scale of 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Subtract the per-feature mean
    pub with_mean: bool,
    /// Divide by the per-feature standard deviation
    pub with_std: bool,
    params: Option<ScalerParams>,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardScaler {
    pub fn new() -> Self {
        Self {
            with_mean: true,
            with_std: true,
            params: None,
        }
    }

    pub fn with_mean(mut self, with_mean: bool) -> Self {
        self.with_mean = with_mean;
        self
    }

    pub fn with_std(mut self, with_std: bool) -> Self {
        self.with_std = with_std;
        self
    }

    pub fn mean(&self) -> Option<&Array1<f64>> {
        self.params.as_ref().map(|p| &p.mean)
    }

    pub fn scale(&self) -> Option<&Array1<f64>> {
        self.params.as_ref().map(|p| &p.scale)
    }

    /// Undo the scaling
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let params = self.params.as_ref().ok_or(KolosalError::ModelNotFitted)?;
        check_width(x, params.mean.len())?;
        Ok(x * &params.scale + &params.mean)
    }
}

fn check_width(x: &Array2<f64>, expected: usize) -> Result<()> {
    if x.ncols() != expected {
        return Err(KolosalError::shape(
            format!("{} features", expected),
            format!("{} features", x.ncols()),
        ));
    }
    Ok(())
}

impl Transformer for StandardScaler {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let n_features = x.ncols();
        let mean = if self.with_mean {
            x.mean_axis(Axis(0))
                .ok_or_else(|| KolosalError::DataError("cannot fit a scaler on an empty dataset".to_string()))?
        } else {
            Array1::zeros(n_features)
        };
        let scale = if self.with_std {
            if x.nrows() == 0 {
                return Err(KolosalError::DataError("cannot fit a scaler on an empty dataset".to_string()));
            }
            x.std_axis(Axis(0), 0.0)
                .mapv(|s| if s > f64::EPSILON { s } else { 1.0 })
        } else {
            Array1::ones(n_features)
        };

        self.params = Some(ScalerParams { mean, scale });
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let params = self.params.as_ref().ok_or(KolosalError::ModelNotFitted)?;
        check_width(x, params.mean.len())?;
        Ok((x - &params.mean) / &params.scale)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "with_mean" => self.with_mean = value.as_bool(name)?,
            "with_std" => self.with_std = value.as_bool(name)?,
            _ => return Err(KolosalError::invalid_param(name, value, "unknown parameter for StandardScaler")),
        }
        self.params = None;
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.params.is_some()
    }

    fn clone_box(&self) -> Box<dyn Transformer> {
        Box::new(self.clone())
    }
}
