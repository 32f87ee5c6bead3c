//! Integration test: quantized linear models on every dataset case

mod common;

use common::{setup, Dataset, DATASET_CASES, N_SAMPLES, SEED};
use kolosal_fhe::datasets::{make_classification, ClassificationConfig};
use kolosal_fhe::fhe::{CompilationConfig, ExecutionMode};
use kolosal_fhe::models::{LinearRegression, LogisticRegression};
use kolosal_fhe::optimizer::{GridSearchCV, ParamGrid, ParamValue};
use kolosal_fhe::pipeline::Pipeline;
use kolosal_fhe::preprocessing::{Pca, StandardScaler};
use kolosal_fhe::training::DecisionTree;
use kolosal_fhe::utils::{labels_to_targets, r2_score};
use ndarray::{s, Array2};

fn first_sample(x: &Array2<f64>) -> Array2<f64> {
    x.slice(s![0..1, ..]).to_owned()
}

#[test]
fn test_encrypted_prediction_shape_matches_clear() {
    setup();
    let config = CompilationConfig::for_testing();

    for case in DATASET_CASES {
        match case.load() {
            Dataset::Regression(x, y) => {
                let (mut model, reference) = LinearRegression::new(2).fit_benchmark(&x, &y).unwrap();
                let clear = model.predict(&first_sample(&x)).unwrap();
                assert_eq!(clear.dim(), reference.predict(&first_sample(&x)).unwrap().dim());

                model.compile(&x, &config).unwrap();
                let encrypted = model.predict_with(&first_sample(&x), ExecutionMode::Fhe).unwrap();
                assert_eq!(clear.dim(), encrypted.dim(), "case {}", case.name);
                assert_eq!(clear, encrypted, "case {}", case.name);
            }
            Dataset::Classification(x, y) => {
                let (mut model, reference) = LogisticRegression::new(2).fit_benchmark(&x, &y).unwrap();
                let clear = model.predict(&first_sample(&x)).unwrap();
                assert_eq!(clear.dim(), reference.predict(&first_sample(&x)).unwrap().dim());

                model.compile(&x, &config).unwrap();
                let encrypted = model.predict_with(&first_sample(&x), ExecutionMode::Fhe).unwrap();
                assert_eq!(clear.dim(), encrypted.dim(), "case {}", case.name);
                assert_eq!(clear, encrypted, "case {}", case.name);

                let proba = model.predict_proba_with(&first_sample(&x), ExecutionMode::Fhe).unwrap();
                assert_eq!(proba.dim(), (1, model.classes().len()), "case {}", case.name);
            }
        }
    }
}

#[test]
fn test_double_fit_is_deterministic() {
    setup();

    for case in DATASET_CASES {
        match case.load() {
            Dataset::Regression(x, y) => {
                let mut model = LinearRegression::new(8);
                model.fit(&x, &y).unwrap();
                let first = model.predict(&x).unwrap();
                model.fit(&x, &y).unwrap();
                assert_eq!(first, model.predict(&x).unwrap(), "case {}", case.name);
            }
            Dataset::Classification(x, y) => {
                let mut model = LogisticRegression::new(8);
                model.fit(&x, &y).unwrap();
                let first = model.predict(&x).unwrap();
                let first_proba = model.predict_proba(&x).unwrap();
                model.fit(&x, &y).unwrap();
                assert_eq!(first, model.predict(&x).unwrap(), "case {}", case.name);
                assert_eq!(first_proba, model.predict_proba(&x).unwrap(), "case {}", case.name);

                let mut tree = DecisionTree::new();
                tree.fit(&x, &y).unwrap();
                let first = tree.predict(&x).unwrap();
                tree.fit(&x, &y).unwrap();
                assert_eq!(first, tree.predict(&x).unwrap(), "case {}", case.name);
            }
        }
    }
}

#[test]
fn test_quantized_matches_reference_at_high_bit_widths() {
    setup();

    for n_bits in [16u8, 20] {
        for case in DATASET_CASES {
            match case.load() {
                Dataset::Regression(x, y) => {
                    let (model, reference) = LinearRegression::new(n_bits).fit_benchmark(&x, &y).unwrap();
                    let r2 = r2_score(&reference.predict(&x).unwrap(), &model.predict(&x).unwrap()).unwrap();
                    assert!(r2 > 0.99, "case {} at {} bits: r2 = {}", case.name, n_bits, r2);
                }
                Dataset::Classification(x, y) => {
                    let (model, reference) = LogisticRegression::new(n_bits).fit_benchmark(&x, &y).unwrap();

                    let r2 = r2_score(
                        &labels_to_targets(&reference.predict(&x).unwrap()),
                        &labels_to_targets(&model.predict(&x).unwrap()),
                    )
                    .unwrap();
                    assert!(r2 > 0.99, "case {} at {} bits: label r2 = {}", case.name, n_bits, r2);

                    let r2 = r2_score(&reference.predict_proba(&x).unwrap(), &model.predict_proba(&x).unwrap()).unwrap();
                    assert!(r2 > 0.99, "case {} at {} bits: proba r2 = {}", case.name, n_bits, r2);
                }
            }
        }
    }
}

#[test]
fn test_grid_search_over_pipeline() {
    setup();
    let grid = ParamGrid::new().add("alg__n_bits", vec![2i64, 3]);

    for case in DATASET_CASES {
        match case.load() {
            Dataset::Regression(x, y) => {
                let pipeline = Pipeline::new("alg", LinearRegression::default())
                    .with_step("pca", Pca::new(2))
                    .and_then(|p| p.with_step("scaler", StandardScaler::new()))
                    .unwrap();
                let mut search = GridSearchCV::new(pipeline, grid.clone(), 3);
                search.fit(&x, &y).unwrap();

                let n_bits = &search.best_params().unwrap()["alg__n_bits"];
                assert!(matches!(n_bits, ParamValue::Int(2) | ParamValue::Int(3)), "case {}", case.name);
                assert_eq!(search.cv_results().len(), 2);
                let best = search.best_estimator().unwrap();
                assert_eq!(best.predict(&x).unwrap().dim(), y.dim(), "case {}", case.name);
            }
            Dataset::Classification(x, y) => {
                let pipeline = Pipeline::new("alg", LogisticRegression::default())
                    .with_step("pca", Pca::new(2))
                    .and_then(|p| p.with_step("scaler", StandardScaler::new()))
                    .unwrap();
                let mut search = GridSearchCV::new(pipeline, grid.clone(), 3);
                search.fit(&x, &y).unwrap();

                let n_bits = &search.best_params().unwrap()["alg__n_bits"];
                assert!(matches!(n_bits, ParamValue::Int(2) | ParamValue::Int(3)), "case {}", case.name);
                assert_eq!(search.cv_results().len(), 2);
                let score = search.best_score().unwrap();
                assert!((0.0..=1.0).contains(&score), "case {}: accuracy {}", case.name, score);
                assert_eq!(search.predict(&x).unwrap().len(), x.nrows());
            }
        }
    }
}

#[test]
fn test_regression_pipeline_on_class_labels() {
    setup();
    let config = ClassificationConfig::new(N_SAMPLES, 10)
        .with_informative(2)
        .with_redundant(0)
        .with_classes(2)
        .with_random_state(SEED);
    let (x, labels) = make_classification(&config).unwrap();
    let y = labels_to_targets(&labels);

    let pipeline = Pipeline::new("alg", LinearRegression::default())
        .with_step("pca", Pca::new(2))
        .and_then(|p| p.with_step("scaler", StandardScaler::new()))
        .unwrap();
    let grid = ParamGrid::new().add("alg__n_bits", vec![2i64, 3]);
    let mut search = GridSearchCV::new(pipeline, grid, 3);
    search.fit(&x, &y).unwrap();

    assert_eq!(search.cv_results().len(), 2);
    assert!(search.best_score().unwrap().is_finite());
    let n_bits = &search.best_params().unwrap()["alg__n_bits"];
    assert!(matches!(n_bits, ParamValue::Int(2) | ParamValue::Int(3)));
    assert_eq!(search.predict(&x).unwrap().dim(), (N_SAMPLES, 1));
}
