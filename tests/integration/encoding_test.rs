use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::record_batch::RecordBatch;

use crate::utils::{DIAGNOSIS_CODES, column_names, diagnosis_column, indicator_values, study_catalog};
use ukb_cohort::{CategoricalEncoder, CohortError, EncodingRule};

const ONLY_SECOND_ROW: [&str; 4] = ["G44", "D59", "K58", "N72"];

/// Three subjects: every diagnosis, a few diagnoses, none
fn study_batch() -> RecordBatch {
    let mut columns: Vec<(String, ArrayRef)> = vec![(
        "21001-0.0".to_string(),
        Arc::new(Float64Array::from(vec![22.0, 25.5, 31.0])) as ArrayRef,
    )];

    for code in DIAGNOSIS_CODES {
        let second = ONLY_SECOND_ROW.contains(&code).then_some(2010.0);
        columns.push((
            diagnosis_column(code),
            Arc::new(Float64Array::from(vec![Some(2001.0), second, None])) as ArrayRef,
        ));
    }

    columns.push((
        "41272-0.0".to_string(),
        Arc::new(StringArray::from(vec![Some("R171"), Some("R25"), None])) as ArrayRef,
    ));
    columns.push((
        "132280-0.0".to_string(),
        Arc::new(Float64Array::from(vec![None, None, Some(2003.0)])) as ArrayRef,
    ));
    columns.push((
        "40006-0.0".to_string(),
        Arc::new(StringArray::from(vec![Some("C56"), Some("C439"), Some("C50")])) as ArrayRef,
    ));

    RecordBatch::try_from_iter(columns).unwrap()
}

/// Test every indicator of the standard encoder
#[test]
fn test_every_group_is_binary() {
    let encoder = CategoricalEncoder::standard();
    let encoded = encoder.apply(&study_batch(), &study_catalog()).unwrap();

    let outputs = encoder.output_columns();
    assert_eq!(outputs.len(), 23);
    assert_eq!(encoded.num_columns(), outputs.len() + 1);

    for output in &outputs {
        let values = indicator_values(&encoded, output);
        assert!(values.iter().all(|v| *v == 0 || *v == 1), "{output} is not 0/1");
    }

    let grouped: [(&str, [i64; 3]); 17] = [
        ("had_pregnancy_complications", [1, 0, 0]),
        ("has_headache_syndromes", [1, 1, 0]),
        ("has_endocrine_disorder", [1, 0, 0]),
        ("has_anemia", [1, 1, 0]),
        ("has_gyno_conditions", [1, 0, 0]),
        ("has_gastro_conditions", [1, 0, 0]),
        ("has_ibs", [1, 1, 0]),
        ("has_cervicitis", [1, 1, 0]),
        ("has_pcos", [1, 0, 0]),
        ("had_abortion", [1, 0, 0]),
        ("has_infertility", [1, 0, 0]),
        ("has_lupus", [1, 0, 0]),
        ("has_menstrual_pain", [1, 0, 0]),
        ("has_back_pain", [1, 0, 0]),
        ("had_uti", [1, 0, 0]),
        ("had_appendicitis", [1, 0, 0]),
        ("has_excessive_menstruation", [1, 0, 0]),
    ];
    for (output, expected) in grouped {
        assert_eq!(indicator_values(&encoded, output), expected, "{output}");
    }
}

/// Test the procedure and delivery based cesarean indicator
#[test]
fn test_cesarean_section() {
    let encoded = CategoricalEncoder::standard()
        .apply(&study_batch(), &study_catalog())
        .unwrap();

    assert_eq!(indicator_values(&encoded, "had_cesarean_section"), [1, 0, 1]);
}

/// Test the cancer family split on ICD10 prefixes
#[test]
fn test_cancer_family() {
    let encoded = CategoricalEncoder::standard()
        .apply(&study_batch(), &study_catalog())
        .unwrap();

    assert_eq!(indicator_values(&encoded, "had_ovarian_cancer"), [1, 0, 0]);
    assert_eq!(indicator_values(&encoded, "had_melanoma"), [0, 1, 0]);
    assert_eq!(indicator_values(&encoded, "had_breast_cancer"), [0, 0, 1]);
    assert_eq!(indicator_values(&encoded, "had_uterine_cancer"), [0, 0, 0]);
    assert_eq!(indicator_values(&encoded, "had_cervical_cancer"), [0, 0, 0]);
}

/// Test that source columns are consumed by the encoder
#[test]
fn test_source_columns_are_dropped() {
    let encoded = CategoricalEncoder::standard()
        .apply(&study_batch(), &study_catalog())
        .unwrap();
    let names = column_names(&encoded);

    assert!(names.contains(&"21001-0.0".to_string()));
    for code in DIAGNOSIS_CODES {
        assert!(!names.contains(&diagnosis_column(code)), "{code} kept");
    }
    for column in ["41272-0.0", "132280-0.0", "40006-0.0"] {
        assert!(!names.contains(&column.to_string()), "{column} kept");
    }
}

/// Test that columns missing from the table encode as absent
#[test]
fn test_missing_inputs_encode_as_absent() {
    let batch = RecordBatch::try_from_iter(vec![(
        diagnosis_column("N94"),
        Arc::new(Float64Array::from(vec![Some(1.0), None])) as ArrayRef,
    )])
    .unwrap();

    let encoded = CategoricalEncoder::standard()
        .apply(&batch, &study_catalog())
        .unwrap();

    assert_eq!(indicator_values(&encoded, "has_menstrual_pain"), [1, 0]);
    assert_eq!(indicator_values(&encoded, "had_cesarean_section"), [0, 0]);
    assert_eq!(indicator_values(&encoded, "had_melanoma"), [0, 0]);
    assert_eq!(encoded.num_columns(), 23);
}

/// Test a custom rule set and an unresolvable input
#[test]
fn test_custom_rules() {
    let encoder = CategoricalEncoder::with_rules(vec![EncodingRule::any_present(
        &["K58", "K59"],
        "has_bowel_symptoms",
    )]);
    let encoded = encoder.apply(&study_batch(), &study_catalog()).unwrap();
    assert_eq!(indicator_values(&encoded, "has_bowel_symptoms"), [1, 1, 0]);
    assert!(encoded.column_by_name(&diagnosis_column("K50")).is_some());

    let broken = CategoricalEncoder::with_rules(vec![EncodingRule::single("Z99", "has_z99")]);
    assert!(matches!(
        broken.apply(&study_batch(), &study_catalog()),
        Err(CohortError::NotFound(_))
    ));
}
