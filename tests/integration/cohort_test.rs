use std::path::PathBuf;

use crate::utils::{
    Fixture, column_names, column_values, diagnosis_column, indicator_values, study_catalog,
    subject_batch,
};
use ukb_cohort::algorithm::cohort::{indicator_stats, null_percentages};
use ukb_cohort::filter::eid_values;
use ukb_cohort::{Cohort, CohortConfig, CohortError, CohortStage, TrainingConfig};

const HESIN: &str = "\
eid\tins_index\tarr_index\tlevel\tdiag_icd10
1001\t0\t0\t1\tN800
1001\t1\t0\t2\tK58
1003\t0\t0\t1\tN801
9999\t0\t0\t1\tZ00
";

/// Four subjects as written by the dataset assembler; 1003 is a male positive
fn write_dataset(fixture: &Fixture) -> PathBuf {
    let header = format!(
        ",eid,31-0.0,34-0.0,2714-0.0,3581-0.0,21001-0.0,132122-0.0,132123-0.0,{},40006-0.0,41272-0.0,132280-0.0",
        diagnosis_column("O26")
    );
    let rows = [
        "0,1001,2,1960,13,51,24.5,2010-01-01,20,2005-03-02,C509,R182,",
        "1,1002,2,1955,12,-1,30.1,,,,,,2001-01-01",
        "2,1003,1,1950,,,26.0,2012-04-04,20,,,,",
        "3,1004,2,1965,14,49,22.2,,,,D10,H01,",
    ];
    fixture.write("dataset_all.csv", &format!("{header}\n{}\n", rows.join("\n")))
}

fn config(fixture: &Fixture, seed: u64) -> CohortConfig {
    CohortConfig {
        diagnosis_log: fixture.write("hesin_diag.txt", HESIN),
        random_seed: Some(seed),
        ..CohortConfig::default()
    }
}

/// Test the full cohort on four subjects with one male positive
#[test]
fn test_end_to_end_cohort() {
    let fixture = Fixture::new();
    let catalog = study_catalog();
    let mut cohort = Cohort::from_csv(&write_dataset(&fixture), config(&fixture, 7)).unwrap();
    assert_eq!(cohort.batch().num_rows(), 4);

    cohort
        .run_stages(&catalog, &[CohortStage::ExcludeMale])
        .unwrap();
    assert_eq!(cohort.batch().num_rows(), 3);
    assert_eq!(
        eid_values(cohort.batch(), "eid").unwrap(),
        vec![1001, 1002, 1004]
    );

    cohort
        .run_stages(&catalog, &CohortStage::STANDARD[1..])
        .unwrap();
    assert_eq!(cohort.completed_stages(), CohortStage::STANDARD);

    let batch = cohort.batch();
    assert_eq!(batch.num_rows(), 2);
    assert_eq!(indicator_values(batch, "has_endo"), [1, 0]);

    let names = column_names(batch);
    for dropped in ["eid", "31-0.0", "132122-0.0", "132123-0.0", "40006-0.0"] {
        assert!(!names.contains(&dropped.to_string()), "{dropped} kept");
    }

    // Positives come first; both candidate negatives have no hospital diagnoses
    assert_eq!(indicator_values(batch, "diag_count"), [2, 0]);
    assert_eq!(column_values(batch, "estrogen_exposure")[0], Some(38.0));
    assert_eq!(indicator_values(batch, "had_pregnancy_complications")[0], 1);
    assert_eq!(indicator_values(batch, "had_breast_cancer")[0], 1);
    assert_eq!(indicator_values(batch, "had_cesarean_section")[0], 1);
}

/// Test that the same seed draws the same negatives
#[test]
fn test_seeded_cohort_is_reproducible() {
    let fixture = Fixture::new();
    let catalog = study_catalog();
    let path = write_dataset(&fixture);

    let mut first = Cohort::from_csv(&path, config(&fixture, 11)).unwrap();
    let mut second = Cohort::from_csv(&path, config(&fixture, 11)).unwrap();
    first.create_cohort(&catalog).unwrap();
    second.create_cohort(&catalog).unwrap();

    assert_eq!(first.batch(), second.batch());
}

/// Test balanced sampling keeps every positive and matches the negatives
#[test]
fn test_balanced_invariant() {
    let catalog = study_catalog();
    let eids: Vec<i64> = (0..60).collect();
    let sex: Vec<Option<f64>> = eids
        .iter()
        .map(|i| Some(if i % 7 == 3 { 1.0 } else { 2.0 }))
        .collect();
    let diagnosis: Vec<Option<f64>> = eids
        .iter()
        .map(|i| (i % 5 == 0).then_some(20.0))
        .collect();
    let female_positives: Vec<i64> = eids
        .iter()
        .copied()
        .filter(|i| i % 5 == 0 && i % 7 != 3)
        .collect();

    for seed in 0..5 {
        let batch = subject_batch(
            eids.clone(),
            vec![
                ("31-0.0", sex.clone()),
                ("132122-0.0", diagnosis.clone()),
                ("132123-0.0", diagnosis.clone()),
            ],
        );
        let config = CohortConfig {
            random_seed: Some(seed),
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

        let labels = indicator_values(cohort.batch(), "has_endo");
        let positives = labels.iter().filter(|l| **l == 1).count();
        assert_eq!(positives, female_positives.len());
        assert_eq!(labels.len(), 2 * positives);

        let kept = eid_values(cohort.batch(), "eid").unwrap();
        assert_eq!(&kept[..positives], female_positives.as_slice());
        assert!(kept.iter().all(|eid| eid % 7 != 3));
    }
}

/// Test that balancing fails without enough negatives
#[test]
fn test_balance_preconditions() {
    let catalog = study_catalog();
    let stages = [CohortStage::DeriveLabel, CohortStage::BalanceClasses];

    let mostly_positive = subject_batch(
        vec![1, 2, 3],
        vec![("132123-0.0", vec![Some(20.0), Some(20.0), None])],
    );
    let mut cohort = Cohort::new(mostly_positive, CohortConfig::default());
    assert!(matches!(
        cohort.run_stages(&catalog, &stages),
        Err(CohortError::Precondition(_))
    ));

    let no_positives = subject_batch(vec![1, 2], vec![("132123-0.0", vec![None, None])]);
    let mut cohort = Cohort::new(no_positives, CohortConfig::default());
    assert!(matches!(
        cohort.run_stages(&catalog, &stages),
        Err(CohortError::Precondition(_))
    ));
}

/// Test estrogen exposure for complete, missing, unknown and reversed ages
#[test]
fn test_estrogen_exposure_cases() {
    let batch = subject_batch(
        vec![1, 2, 3, 4, 5],
        vec![
            ("2714-0.0", vec![Some(13.0), None, Some(-1.0), Some(12.0), Some(50.0)]),
            ("3581-0.0", vec![Some(51.0), Some(50.0), Some(50.0), Some(3.0), Some(45.0)]),
        ],
    );
    let mut cohort = Cohort::new(batch, CohortConfig::default());
    cohort
        .run_stages(&study_catalog(), &[CohortStage::EstrogenExposure])
        .unwrap();

    assert_eq!(
        column_values(cohort.batch(), "estrogen_exposure"),
        vec![Some(38.0), None, None, None, None]
    );
}

/// Test diagnosis counts, defaulting to zero for unlisted subjects
#[test]
fn test_diagnosis_count_defaults_to_zero() {
    let fixture = Fixture::new();
    let batch = subject_batch(vec![1001, 1004, 1003], vec![("21001-0.0", vec![None; 3])]);
    let mut cohort = Cohort::new(batch, config(&fixture, 0));

    cohort
        .run_stages(&study_catalog(), &[CohortStage::DiagnosisCount])
        .unwrap();

    assert_eq!(indicator_values(cohort.batch(), "diag_count"), [2, 0, 1]);
    assert!(cohort.batch().column_by_name("eid").is_none());
}

/// Test that a missing diagnosis log fails the stage
#[test]
fn test_missing_diagnosis_log() {
    let fixture = Fixture::new();
    let config = CohortConfig {
        diagnosis_log: fixture.path("absent.txt"),
        ..CohortConfig::default()
    };
    let batch = subject_batch(vec![1], vec![("21001-0.0", vec![Some(20.0)])]);
    let mut cohort = Cohort::new(batch, config);

    assert!(matches!(
        cohort.run_stages(&study_catalog(), &[CohortStage::DiagnosisCount]),
        Err(CohortError::FileAccess { .. })
    ));
    assert!(cohort.completed_stages().is_empty());
}

/// Test that stages run once and in order
#[test]
fn test_stage_ordering() {
    let catalog = study_catalog();
    let batch = subject_batch(
        vec![1, 2],
        vec![
            ("31-0.0", vec![Some(2.0), Some(2.0)]),
            ("132123-0.0", vec![Some(20.0), None]),
        ],
    );
    let mut cohort = Cohort::new(batch, CohortConfig::default());

    cohort
        .run_stages(&catalog, &[CohortStage::DeriveLabel])
        .unwrap();
    for stages in [
        [CohortStage::ExcludeMale].as_slice(),
        [CohortStage::DeriveLabel].as_slice(),
        [CohortStage::EstrogenExposure, CohortStage::EncodeCategorical].as_slice(),
    ] {
        assert!(matches!(
            cohort.run_stages(&catalog, stages),
            Err(CohortError::Precondition(_))
        ));
    }
    assert_eq!(cohort.completed_stages(), [CohortStage::DeriveLabel]);
}

/// Test feature removal and the split into features and labels
#[test]
fn test_split_after_exclusions() {
    let fixture = Fixture::new();
    let catalog = study_catalog();
    let mut cohort = Cohort::from_csv(&write_dataset(&fixture), config(&fixture, 3)).unwrap();
    cohort.create_cohort(&catalog).unwrap();

    cohort
        .drop_features(&catalog, &TrainingConfig::default().excluded_features)
        .unwrap();
    let (features, labels) = cohort.split_x_y(&catalog).unwrap();

    assert_eq!(labels, vec![1, 0]);
    assert_eq!(features.num_rows(), 2);
    let names = features.names();
    assert!(names.contains(&"Body mass index (BMI)".to_string()));
    assert!(names.contains(&"Age when periods started (menarche)".to_string()));
    assert!(names.contains(&"estrogen_exposure".to_string()));
    assert!(names.contains(&"diag_count".to_string()));
    assert!(!names.contains(&"Year of birth".to_string()));
    assert!(!names.contains(&"Age at menopause (last menstrual period)".to_string()));
    assert!(!names.contains(&"has_endo".to_string()));
    assert_eq!(features.num_features(), names.len());
}

/// Test summary statistics of a finished cohort
#[test]
fn test_cohort_statistics() {
    let fixture = Fixture::new();
    let catalog = study_catalog();
    let mut cohort = Cohort::from_csv(&write_dataset(&fixture), config(&fixture, 5)).unwrap();
    cohort.create_cohort(&catalog).unwrap();

    let stats = indicator_stats(cohort.batch(), &["has_endo"]).unwrap();
    assert_eq!(stats[0].zeros, 1);
    assert_eq!(stats[0].ones, 1);
    assert_eq!(stats[0].one_percent, 50.0);

    let missing = null_percentages(cohort.batch(), &catalog).unwrap();
    assert_eq!(missing.len(), cohort.batch().num_columns());
    assert!(missing.windows(2).all(|w| w[0].percent >= w[1].percent));
    assert!(missing.iter().any(|m| m.feature == "Body mass index (BMI)"));
}

/// Test that columns left empty in the CSV count as missing in every stage
#[test]
fn test_empty_csv_columns_are_missing() {
    let fixture = Fixture::new();
    let catalog = study_catalog();
    let header = format!(
        ",eid,132123-0.0,{},{}",
        diagnosis_column("E02"),
        diagnosis_column("E03")
    );
    let path = fixture.write(
        "dataset_all.csv",
        &format!("{header}\n0,1,,,\n1,2,,,2011-05-05\n2,3,,,\n"),
    );
    let config = CohortConfig {
        diagnosis_log: fixture.write("hesin_diag.txt", "eid\tdiag_icd10\n1\t\n2\t\n"),
        ..CohortConfig::default()
    };
    let mut cohort = Cohort::from_csv(&path, config).unwrap();

    let missing = null_percentages(cohort.batch(), &catalog).unwrap();
    let e02 = missing
        .iter()
        .find(|m| m.feature == "Date E02 first reported")
        .unwrap();
    assert_eq!(e02.percent, 100.0);

    cohort
        .run_stages(
            &catalog,
            &[
                CohortStage::DeriveLabel,
                CohortStage::EncodeCategorical,
                CohortStage::DiagnosisCount,
            ],
        )
        .unwrap();

    let batch = cohort.batch();
    assert_eq!(indicator_values(batch, "has_endo"), [0, 0, 0]);
    assert_eq!(indicator_values(batch, "has_endocrine_disorder"), [0, 1, 0]);
    assert_eq!(indicator_values(batch, "has_lupus"), [0, 0, 0]);
    assert_eq!(indicator_values(batch, "diag_count"), [0, 0, 0]);
}
