//! Gaussian-cluster classification problems

use super::{make_rng, shuffle_rows_and_features, standard_normal_matrix, uniform_matrix};
use crate::error::{KolosalError, Result};
use ndarray::{s, Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Parameters of [`make_classification`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    pub n_samples: usize,
    pub n_features: usize,
    pub n_informative: usize,
    /// Random linear combinations of the informative features
    pub n_redundant: usize,
    /// Copies of informative or redundant features
    pub n_repeated: usize,
    pub n_classes: usize,
    pub n_clusters_per_class: usize,
    /// Fraction of labels reassigned at random
    pub flip_y: f64,
    /// Half the distance between hypercube vertices
    pub class_sep: f64,
    pub shuffle: bool,
    pub random_state: Option<u64>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            n_samples: 100,
            n_features: 20,
            n_informative: 2,
            n_redundant: 2,
            n_repeated: 0,
            n_classes: 2,
            n_clusters_per_class: 2,
            flip_y: 0.01,
            class_sep: 1.0,
            shuffle: true,
            random_state: None,
        }
    }
}

impl ClassificationConfig {
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

    pub fn with_redundant(mut self, n_redundant: usize) -> Self {
        self.n_redundant = n_redundant;
        self
    }

    pub fn with_repeated(mut self, n_repeated: usize) -> Self {
        self.n_repeated = n_repeated;
        self
    }

    pub fn with_classes(mut self, n_classes: usize) -> Self {
        self.n_classes = n_classes;
        self
    }

    pub fn with_clusters_per_class(mut self, n_clusters: usize) -> Self {
        self.n_clusters_per_class = n_clusters;
        self
    }

    pub fn with_flip_y(mut self, flip_y: f64) -> Self {
        self.flip_y = flip_y;
        self
    }

    pub fn with_class_sep(mut self, class_sep: f64) -> Self {
        self.class_sep = class_sep;
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

    fn validate(&self) -> Result<()> {
        if self.n_samples == 0 {
            return Err(KolosalError::invalid_param("n_samples", 0, "must be positive"));
        }
        if self.n_classes < 2 {
            return Err(KolosalError::invalid_param("n_classes", self.n_classes, "need at least 2 classes"));
        }
        if self.n_informative == 0 {
            return Err(KolosalError::invalid_param("n_informative", 0, "must be positive"));
        }
        if self.n_clusters_per_class == 0 {
            return Err(KolosalError::invalid_param("n_clusters_per_class", 0, "must be positive"));
        }
        let used = self.n_informative + self.n_redundant + self.n_repeated;
        if used > self.n_features {
            return Err(KolosalError::invalid_param(
                "n_features",
                self.n_features,
                format!("must be >= n_informative + n_redundant + n_repeated ({})", used),
            ));
        }
        let n_clusters = self.n_classes * self.n_clusters_per_class;
        let vertices = if self.n_informative >= 63 { u64::MAX } else { 1u64 << self.n_informative };
        if n_clusters as u64 > vertices {
            return Err(KolosalError::invalid_param(
                "n_classes * n_clusters_per_class",
                n_clusters,
                format!("must be <= 2^n_informative ({})", vertices),
            ));
        }
        if !(0.0..=1.0).contains(&self.flip_y) {
            return Err(KolosalError::invalid_param("flip_y", self.flip_y, "must be in [0, 1]"));
        }
        Ok(())
    }
}

/// Distinct random vertices of the `{0, 1}^dim` hypercube
fn hypercube_vertices<R: Rng>(rng: &mut R, n_vertices: usize, dim: usize) -> Vec<Vec<f64>> {
    let mut seen: BTreeSet<Vec<bool>> = BTreeSet::new();
    let mut vertices = Vec::with_capacity(n_vertices);
    while vertices.len() < n_vertices {
        let bits: Vec<bool> = (0..dim).map(|_| rng.gen::<bool>()).collect();
        if seen.insert(bits.clone()) {
            vertices.push(bits.into_iter().map(|b| if b { 1.0 } else { 0.0 }).collect());
        }
    }
    vertices
}

/// Generate `(x, labels)` from Gaussian clusters placed on hypercube vertices.
///
/// Layout before shuffling: informative, redundant, repeated, then noise features.
pub fn make_classification(config: &ClassificationConfig) -> Result<(Array2<f64>, Array1<usize>)> {
    config.validate()?;

    let mut rng = make_rng(config.random_state);
    let n_samples = config.n_samples;
    let n_inf = config.n_informative;
    let n_clusters = config.n_classes * config.n_clusters_per_class;
    let n_useless = config.n_features - n_inf - config.n_redundant - config.n_repeated;

    // Equal cluster sizes, remainder spread over the first clusters
    let per_cluster: Vec<usize> = (0..n_clusters)
        .map(|k| n_samples / n_clusters + usize::from(k < n_samples % n_clusters))
        .collect();

    let centroids: Vec<Vec<f64>> = hypercube_vertices(&mut rng, n_clusters, n_inf)
        .into_iter()
        .map(|v| v.into_iter().map(|b| b * 2.0 * config.class_sep - config.class_sep).collect())
        .collect();

    let mut x = Array2::<f64>::zeros((n_samples, config.n_features));
    let mut y = vec![0usize; n_samples];

    let informative = standard_normal_matrix(&mut rng, n_samples, n_inf);
    x.slice_mut(s![.., ..n_inf]).assign(&informative);

    let mut stop = 0;
    for (k, centroid) in centroids.iter().enumerate() {
        let start = stop;
        stop += per_cluster[k];
        for label in &mut y[start..stop] {
            *label = k % config.n_classes;
        }

        // Random covariance for the cluster
        let a = uniform_matrix(&mut rng, n_inf, n_inf) * 2.0 - 1.0;
        let block = x.slice(s![start..stop, ..n_inf]).dot(&a);
        let centroid = Array1::from_vec(centroid.clone());
        x.slice_mut(s![start..stop, ..n_inf]).assign(&(block + &centroid));
    }

    if config.n_redundant > 0 {
        let b = uniform_matrix(&mut rng, n_inf, config.n_redundant) * 2.0 - 1.0;
        let redundant = x.slice(s![.., ..n_inf]).dot(&b);
        x.slice_mut(s![.., n_inf..n_inf + config.n_redundant]).assign(&redundant);
    }

    if config.n_repeated > 0 {
        let n = n_inf + config.n_redundant;
        for r in 0..config.n_repeated {
            let source = ((n - 1) as f64 * rng.gen::<f64>() + 0.5) as usize;
            let column = x.column(source).to_owned();
            x.column_mut(n + r).assign(&column);
        }
    }

    if n_useless > 0 {
        let noise = standard_normal_matrix(&mut rng, n_samples, n_useless);
        let start = config.n_features - n_useless;
        x.slice_mut(s![.., start..]).assign(&noise);
    }

    if config.flip_y > 0.0 {
        for label in y.iter_mut() {
            if rng.gen::<f64>() < config.flip_y {
                *label = rng.gen_range(0..config.n_classes);
            }
        }
    }

    debug!(
        n_samples,
        n_features = config.n_features,
        n_classes = config.n_classes,
        n_clusters,
        "Generated classification dataset"
    );

    if !config.shuffle {
        return Ok((x, Array1::from_vec(y)));
    }

    let (x, y, _) = shuffle_rows_and_features(&mut rng, &x, &y);
    Ok((x, Array1::from_vec(y)))
}
