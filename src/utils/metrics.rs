//! Scoring functions shared by the models, the grid search and the tests

use crate::error::{KolosalError, Result};
use ndarray::{Array1, Array2, Axis};

/// R² of a single column; a constant target scores 1.0 only when matched exactly
fn column_r2(y_true: ndarray::ArrayView1<f64>, y_pred: ndarray::ArrayView1<f64>) -> f64 {
    let mean = y_true.mean().unwrap_or(0.0);
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Coefficient of determination, uniformly averaged over output columns
pub fn r2_score(y_true: &Array2<f64>, y_pred: &Array2<f64>) -> Result<f64> {
    if y_true.dim() != y_pred.dim() {
        return Err(KolosalError::shape(
            format!("{:?}", y_true.dim()),
            format!("{:?}", y_pred.dim()),
        ));
    }
    if y_true.nrows() == 0 {
        return Err(KolosalError::DataError("r2_score on empty arrays".to_string()));
    }

    let n_outputs = y_true.ncols();
    let total: f64 = y_true
        .axis_iter(Axis(1))
        .zip(y_pred.axis_iter(Axis(1)))
        .map(|(t, p)| column_r2(t, p))
        .sum();

    Ok(total / n_outputs as f64)
}

/// R² for single-output predictions
pub fn r2_score_1d(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    if y_true.len() != y_pred.len() {
        return Err(KolosalError::shape(
            format!("{} predictions", y_true.len()),
            format!("{} predictions", y_pred.len()),
        ));
    }
    if y_true.is_empty() {
        return Err(KolosalError::DataError("r2_score on empty arrays".to_string()));
    }
    Ok(column_r2(y_true.view(), y_pred.view()))
}

/// Fraction of labels predicted exactly
pub fn accuracy_score(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> Result<f64> {
    if y_true.len() != y_pred.len() {
        return Err(KolosalError::shape(
            format!("{} labels", y_true.len()),
            format!("{} labels", y_pred.len()),
        ));
    }
    if y_true.is_empty() {
        return Err(KolosalError::DataError("accuracy_score on empty arrays".to_string()));
    }

    let correct = y_true.iter().zip(y_pred.iter()).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// View class labels as a single-column regression target
pub fn labels_to_targets(labels: &Array1<usize>) -> Array2<f64> {
    labels.mapv(|l| l as f64).insert_axis(Axis(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_r2_perfect() {
        let y = array![[1.0], [2.0], [3.0]];
        assert!((r2_score(&y, &y).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_r2_multi_output_average() {
        let y_true = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        // First column perfect, second column predicts the mean (R² = 0)
        let y_pred = array![[1.0, 2.0], [2.0, 2.0], [3.0, 2.0]];
        let r2 = r2_score(&y_true, &y_pred).unwrap();
        assert!((r2 - 0.5).abs() < 1e-12, "got {}", r2);
    }

    #[test]
    fn test_r2_constant_target() {
        let y_true = array![[2.0], [2.0]];
        assert_eq!(r2_score(&y_true, &y_true).unwrap(), 1.0);
        let off = array![[2.0], [3.0]];
        assert_eq!(r2_score(&y_true, &off).unwrap(), 0.0);
    }

    #[test]
    fn test_r2_shape_mismatch() {
        let a = array![[1.0], [2.0]];
        let b = array![[1.0, 2.0], [2.0, 3.0]];
        assert!(r2_score(&a, &b).is_err());
    }

    #[test]
    fn test_accuracy() {
        let t = array![0usize, 1, 2, 1];
        let p = array![0usize, 1, 1, 1];
        assert!((accuracy_score(&t, &p).unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_labels_to_targets() {
        let t = labels_to_targets(&array![0usize, 3]);
        assert_eq!(t.dim(), (2, 1));
        assert_eq!(t[[1, 0]], 3.0);
    }
}
