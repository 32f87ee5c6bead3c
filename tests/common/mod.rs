//! Shared fixtures for the integration tests

#![allow(dead_code)]

use kolosal_fhe::datasets::{make_classification, make_regression, ClassificationConfig, RegressionConfig};
use kolosal_fhe::utils::init_tracing;
use ndarray::{Array1, Array2};

pub const N_SAMPLES: usize = 200;
pub const SEED: u64 = 42;

/// One generated dataset
pub enum Dataset {
    Regression(Array2<f64>, Array2<f64>),
    Classification(Array2<f64>, Array1<usize>),
}

/// A named dataset recipe
pub struct DatasetCase {
    pub name: &'static str,
    build: fn() -> Dataset,
}

impl DatasetCase {
    pub fn load(&self) -> Dataset {
        (self.build)()
    }
}

fn regression(config: RegressionConfig) -> Dataset {
    let (x, y) = make_regression(&config.with_random_state(SEED)).expect("regression dataset");
    Dataset::Regression(x, y)
}

fn classification(config: ClassificationConfig) -> Dataset {
    let (x, y) = make_classification(&config.with_random_state(SEED)).expect("classification dataset");
    Dataset::Classification(x, y)
}

pub const DATASET_CASES: &[DatasetCase] = &[
    DatasetCase {
        name: "regression_10_features",
        build: || regression(RegressionConfig::new(N_SAMPLES, 10)),
    },
    DatasetCase {
        name: "regression_10_features_noisy",
        build: || regression(RegressionConfig::new(N_SAMPLES, 10).with_noise(2.0)),
    },
    DatasetCase {
        name: "regression_14_informative",
        build: || regression(RegressionConfig::new(N_SAMPLES, 14).with_informative(14)),
    },
    DatasetCase {
        name: "regression_14_informative_2_targets",
        build: || regression(RegressionConfig::new(N_SAMPLES, 14).with_informative(14).with_targets(2)),
    },
    DatasetCase {
        name: "classification_10_features",
        build: || classification(ClassificationConfig::new(N_SAMPLES, 10).with_class_sep(2.0)),
    },
    DatasetCase {
        name: "classification_14_features",
        build: || classification(ClassificationConfig::new(N_SAMPLES, 14).with_class_sep(2.0)),
    },
    DatasetCase {
        name: "classification_4_classes",
        build: || {
            classification(
                ClassificationConfig::new(N_SAMPLES, 14)
                    .with_clusters_per_class(1)
                    .with_class_sep(2.0)
                    .with_classes(4),
            )
        },
    },
];

pub fn setup() {
    init_tracing("kolosal_fhe=info");
}
