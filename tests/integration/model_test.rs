use crate::utils::{Fixture, assert_exists, study_catalog, subject_batch};
use ukb_cohort::model::{ParamGrid, accuracy, load_model, save_model};
use ukb_cohort::{
    Classifier, Cohort, CohortConfig, CohortError, CohortStage, EstimatorKind, GridSearch,
    ModelSelector, ModelSpec, ModelTrainer, PipelineConfig, TrainingData,
};

/// Two informative features with a margin between the classes
fn separable(n: usize) -> TrainingData {
    let rows = (0..n)
        .map(|i| {
            let shift = if i % 2 == 0 { 0.0 } else { 40.0 };
            vec![(i % 10) as f64 + shift, ((i * 7) % 13) as f64, shift / 2.0 + (i % 3) as f64]
        })
        .collect();
    let labels = (0..n).map(|i| u8::from(i % 2 == 1)).collect();
    TrainingData::new(
        vec!["bmi".to_string(), "noise".to_string(), "exposure".to_string()],
        rows,
        labels,
    )
    .unwrap()
}

/// Test grid search, the summary file and the saved model
#[test]
fn test_grid_search_artifacts() {
    let fixture = Fixture::new();
    let (train, test) = separable(60).train_test_split(0.3, 42).unwrap();
    assert_eq!(test.len(), 18);

    let grid = ParamGrid::from([
        ("max_depth".to_string(), vec![2.0, 4.0]),
        ("min_samples_leaf".to_string(), vec![1.0, 3.0]),
    ]);
    let search = GridSearch::new(EstimatorKind::DecisionTree, grid)
        .with_folds(3)
        .with_n_jobs(2);
    let mut outcome = search.train(&train).unwrap();

    let test_accuracy = accuracy(test.labels(), &outcome.model.predict_all(test.rows()));
    assert_eq!(test_accuracy, 1.0);
    outcome.summary.test_accuracy = Some(test_accuracy);

    let dir = fixture.path("models");
    let summary_path = outcome.summary.write_json(&dir, "20240101_120000").unwrap();
    assert_exists(&summary_path);
    assert!(summary_path.ends_with("grid_search_summary_20240101_120000.json"));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary_path).unwrap()).unwrap();
    assert_eq!(json["estimator"], "Decision Tree");
    assert_eq!(json["folds"], 3);
    assert_eq!(json["candidates"].as_array().unwrap().len(), 4);
    assert_eq!(json["best_params"]["max_depth"], 2.0);
    assert_eq!(json["test_accuracy"], 1.0);

    let model_path = save_model(&outcome.model, &dir, "20240101_120000").unwrap();
    assert!(model_path.ends_with("model_20240101_120000.bin"));
    let loaded = load_model(&model_path).unwrap();

    assert_eq!(loaded.spec(), outcome.model.spec());
    assert_eq!(loaded.feature_names(), ["bmi", "noise", "exposure"]);
    assert_eq!(
        loaded.predict_all(test.rows()),
        outcome.model.predict_all(test.rows())
    );
}

/// Test that every estimator family survives a save and load
#[test]
fn test_model_round_trip() {
    let fixture = Fixture::new();
    let data = separable(40);

    for kind in EstimatorKind::ALL {
        let model = ModelSpec::with_defaults(kind).fit(&data, 9).unwrap();
        let path = save_model(&model, &fixture.path(&format!("{kind}")), "ts").unwrap();
        let loaded = load_model(&path).unwrap();

        for row in data.rows() {
            assert_eq!(loaded.predict_proba(row), model.predict_proba(row), "{kind}");
        }
    }
}

/// Test a search configured from the training section
#[test]
fn test_search_from_config() {
    let fixture = Fixture::new();
    let path = fixture.write(
        "config.json",
        r#"{ "training": { "estimator": "logistic_regression", "folds": 3, "n_jobs": 1 } }"#,
    );
    let config = PipelineConfig::from_json_file(&path).unwrap();

    let search = GridSearch::from_config(&config.training).unwrap();
    assert_eq!(search.kind(), EstimatorKind::LogisticRegression);

    let outcome = search.train(&separable(30)).unwrap();
    assert_eq!(outcome.summary.folds, 3);
    assert_eq!(
        outcome.summary.candidates.len(),
        EstimatorKind::LogisticRegression
            .default_grid()
            .values()
            .map(Vec::len)
            .product::<usize>()
    );
    assert!(outcome.summary.best_score > 0.9);
}

/// Test that invalid configuration files are rejected
#[test]
fn test_invalid_config() {
    let fixture = Fixture::new();
    let unknown = fixture.write("unknown.json", r#"{ "training": { "estimator": "catboost" } }"#);
    let config = PipelineConfig::from_json_file(&unknown).unwrap();
    assert!(matches!(
        GridSearch::from_config(&config.training),
        Err(CohortError::Config(_))
    ));

    let bad_split = fixture.write("split.json", r#"{ "training": { "test_size": 1.5 } }"#);
    assert!(matches!(
        PipelineConfig::from_json_file(&bad_split),
        Err(CohortError::Config(_))
    ));
}

/// Test training on a cohort split, from stages to model comparison
#[test]
fn test_cohort_to_model_selection() {
    let catalog = study_catalog();
    let eids: Vec<i64> = (0..80).collect();
    let positive = |i: i64| i % 4 == 0;
    let batch = subject_batch(
        eids.clone(),
        vec![
            ("31-0.0", eids.iter().map(|i| Some(if i % 9 == 5 { 1.0 } else { 2.0 })).collect()),
            (
                "21001-0.0",
                eids.iter()
                    .map(|i| Some(if positive(*i) { 35.0 } else { 22.0 } + (i % 3) as f64))
                    .collect(),
            ),
            (
                "2714-0.0",
                eids.iter().map(|i| (i % 5 != 0).then_some(12.0)).collect(),
            ),
            (
                "132123-0.0",
                eids.iter().map(|i| positive(*i).then_some(20.0)).collect(),
            ),
        ],
    );
    let config = CohortConfig {
        random_seed: Some(1),
        ..CohortConfig::default()
    };
    let mut cohort = Cohort::new(batch, config);
    cohort
        .run_stages(
            &catalog,
            &[
                CohortStage::ExcludeMale,
                CohortStage::DeriveLabel,
                CohortStage::BalanceClasses,
            ],
        )
        .unwrap();
    cohort.drop_columns(&["eid"]).unwrap();

    let (features, labels) = cohort.split_x_y(&catalog).unwrap();
    let data = TrainingData::from_features(&features, &labels).unwrap();
    assert_eq!(
        data.feature_names(),
        ["Body mass index (BMI)", "Age when periods started (menarche)"]
    );
    assert!(data.rows().iter().any(|row| row[1].is_nan()));

    let (train, test) = data.train_test_split(0.25, 42).unwrap();
    let mut selector = ModelSelector::default().with_seed(42);
    selector.train_models(&train, &test).unwrap();

    assert_eq!(selector.results().len(), EstimatorKind::ALL.len());
    let best = selector.best_model().unwrap();
    assert_eq!(
        accuracy(test.labels(), &best.predict_all(test.rows())),
        1.0
    );
    assert!(selector.best_model_name().is_some());
}
