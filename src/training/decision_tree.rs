//! Decision tree classifier
//!
//! CART with Gini or entropy impurity. Split search is parallel over
//! features but the reduction is ordered, so repeated fits on the same data
//! build the same tree.

use crate::error::{KolosalError, Result};
use crate::optimizer::ParamValue;
use crate::utils::metrics::accuracy_score;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::{Estimator, TaskType};

/// Decision tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node holding the index of the predicted class
    Leaf {
        class_idx: usize,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity
    Gini,
    /// Shannon entropy
    Entropy,
}

impl Criterion {
    fn impurity(&self, counts: &[usize], total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let n = total as f64;
        match self {
            Criterion::Gini => 1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>(),
            Criterion::Entropy => -counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Decision tree classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Impurity criterion
    pub criterion: Criterion,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
    classes: Vec<usize>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: Criterion::Gini,
            n_features: 0,
            feature_importances: None,
            classes: Vec::new(),
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Sorted distinct labels seen during fit
    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(KolosalError::shape(
                format!("y length = {}", n_samples),
                format!("y length = {}", y.len()),
            ));
        }
        if n_samples == 0 {
            return Err(KolosalError::DataError("cannot fit on an empty dataset".to_string()));
        }
        if self.min_samples_leaf == 0 {
            return Err(KolosalError::invalid_param("min_samples_leaf", 0, "must be at least 1"));
        }

        let mut classes: Vec<usize> = y.to_vec();
        classes.sort_unstable();
        classes.dedup();
        self.classes = classes;
        self.n_features = n_features;

        // Labels as positions into `classes`
        let encoded: Vec<usize> = y
            .iter()
            .map(|label| self.classes.binary_search(label).unwrap_or(0))
            .collect();

        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(x, &encoded, &indices, 0, &mut importances);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));
        self.root = Some(root);

        debug!(
            n_samples,
            n_features,
            n_classes = self.classes.len(),
            depth = self.get_depth(),
            "decision tree fitted"
        );
        Ok(self)
    }

    fn class_counts(&self, y: &[usize], indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.classes.len()];
        for &i in indices {
            counts[y[i]] += 1;
        }
        counts
    }

    /// Majority class; the lowest class index wins ties
    fn majority(counts: &[usize]) -> usize {
        let mut best = 0;
        for (idx, &count) in counts.iter().enumerate() {
            if count > counts[best] {
                best = idx;
            }
        }
        best
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let counts = self.class_counts(y, indices);
        let leaf = TreeNode::Leaf {
            class_idx: Self::majority(&counts),
            n_samples,
        };

        let is_pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        if n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_pure
        {
            return leaf;
        }

        let parent_impurity = self.criterion.impurity(&counts, n_samples);
        let best = match self.find_best_split(x, y, indices, parent_impurity) {
            Some(best) => best,
            None => return leaf,
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);

        importances[best.feature_idx] += n_samples as f64 * best.gain;

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, importances));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, importances));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity: parent_impurity,
        }
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        indices: &[usize],
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let n_classes = self.classes.len();
        let n = indices.len();

        // Each feature sweeps its sorted values once, moving samples left
        let per_feature: Vec<Option<SplitCandidate>> = (0..x.ncols())
            .into_par_iter()
            .map(|feature_idx| {
                let mut order: Vec<(f64, usize)> = indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
                order.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

                let mut left = vec![0usize; n_classes];
                let mut right = vec![0usize; n_classes];
                for &(_, c) in &order {
                    right[c] += 1;
                }

                let mut best: Option<SplitCandidate> = None;
                for pos in 0..n - 1 {
                    let (value, class) = order[pos];
                    left[class] += 1;
                    right[class] -= 1;

                    let next = order[pos + 1].0;
                    if next <= value {
                        continue;
                    }
                    let n_left = pos + 1;
                    let n_right = n - n_left;
                    if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                        continue;
                    }

                    let weighted = (n_left as f64 * self.criterion.impurity(&left, n_left)
                        + n_right as f64 * self.criterion.impurity(&right, n_right))
                        / n as f64;
                    let gain = parent_impurity - weighted;
                    // Strict comparison keeps the lowest threshold on ties
                    if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
                        best = Some(SplitCandidate {
                            feature_idx,
                            threshold: (value + next) / 2.0,
                            gain,
                        });
                    }
                }
                best
            })
            .collect();

        // Ordered reduction: the lowest feature index wins ties
        per_feature.into_iter().flatten().fold(None, |acc: Option<SplitCandidate>, cand| match acc {
            Some(a) if a.gain >= cand.gain => Some(a),
            _ => Some(cand),
        })
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        let root = self.root.as_ref().ok_or(KolosalError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(KolosalError::shape(
                format!("{} features", self.n_features),
                format!("{} features", x.ncols()),
            ));
        }

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let mut node = root;
                loop {
                    match node {
                        TreeNode::Leaf { class_idx, .. } => break self.classes[*class_idx],
                        TreeNode::Split {
                            feature_idx,
                            threshold,
                            left,
                            right,
                            ..
                        } => {
                            node = if row[*feature_idx] <= *threshold { left } else { right };
                        }
                    }
                }
            })
            .collect())
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        match &self.root {
            None => 0,
            Some(node) => Self::node_depth(node),
        }
    }

    fn node_depth(node: &TreeNode) -> usize {
        match node {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => 1 + Self::node_depth(left).max(Self::node_depth(right)),
        }
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        match &self.root {
            None => 0,
            Some(node) => Self::count_leaves(node),
        }
    }

    fn count_leaves(node: &TreeNode) -> usize {
        match node {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => Self::count_leaves(left) + Self::count_leaves(right),
        }
    }
}

impl Estimator for DecisionTree {
    type Target = Array1<usize>;
    type Output = Array1<usize>;

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<()> {
        DecisionTree::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        DecisionTree::predict(self, x)
    }

    fn score(&self, x: &Array2<f64>, y: &Array1<usize>) -> Result<f64> {
        accuracy_score(y, &DecisionTree::predict(self, x)?)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "max_depth" => self.max_depth = Some(value.as_usize(name)?),
            "min_samples_split" => self.min_samples_split = value.as_usize(name)?,
            "min_samples_leaf" => self.min_samples_leaf = value.as_usize(name)?,
            "criterion" => {
                self.criterion = match value {
                    ParamValue::Str(s) if s == "gini" => Criterion::Gini,
                    ParamValue::Str(s) if s == "entropy" => Criterion::Entropy,
                    other => return Err(KolosalError::invalid_param(name, other, "expected \"gini\" or \"entropy\"")),
                }
            }
            _ => return Err(KolosalError::invalid_param(name, value, "unknown parameter for DecisionTree")),
        }
        self.root = None;
        Ok(())
    }

    fn task(&self) -> TaskType {
        TaskType::Classification
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_separable() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![3usize, 3, 7, 7];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.classes(), &[3, 7]);
        assert_eq!(tree.get_n_leaves(), 2);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0usize, 1, 0, 1];

        let mut tree = DecisionTree::new().with_max_depth(2);
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 3);
    }

    #[test]
    fn test_tie_prefers_lowest_feature() {
        // Both columns separate the classes equally well
        let x = array![[0.0, 0.0], [0.0, 0.0], [1.0, 1.0], [1.0, 1.0]];
        let y = array![0usize, 0, 1, 1];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();
        match tree.root.as_ref().unwrap() {
            TreeNode::Split { feature_idx, threshold, .. } => {
                assert_eq!(*feature_idx, 0);
                assert!((threshold - 0.5).abs() < 1e-12);
            }
            other => panic!("expected a split, got {:?}", other),
        }
    }

    #[test]
    fn test_refit_is_deterministic() {
        let x = array![[0.3, 1.0], [0.1, 0.2], [0.9, 0.4], [0.5, 0.5], [0.7, 0.1], [0.2, 0.8]];
        let y = array![0usize, 0, 1, 1, 1, 0];

        let mut tree = DecisionTree::new().with_criterion(Criterion::Entropy);
        tree.fit(&x, &y).unwrap();
        let first = tree.root.clone();
        tree.fit(&x, &y).unwrap();
        assert_eq!(first, tree.root);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0usize, 0, 1, 1];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert!((importances[0] - 1.0).abs() < 1e-12);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_not_fitted_and_set_param() {
        let tree = DecisionTree::new();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(KolosalError::ModelNotFitted)));

        let mut tree = DecisionTree::new();
        Estimator::set_param(&mut tree, "criterion", &ParamValue::Str("entropy".into())).unwrap();
        assert_eq!(tree.criterion, Criterion::Entropy);
        assert!(Estimator::set_param(&mut tree, "n_bits", &ParamValue::Int(3)).is_err());
    }
}
