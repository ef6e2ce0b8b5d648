//! Encoding rules and the standard study rule set

use arrow::record_batch::RecordBatch;

use crate::catalog::FeatureCatalog;
use crate::error::Result;
use crate::utils::arrow::{drop_columns, with_column};

use super::{any_present, encode_presence_from_nulls, encode_presence_from_prefix, indicator_array, prefix_match};

/// One step of categorical encoding
///
/// Inputs are catalog queries (ICD-10 codes or feature name fragments),
/// resolved to column codes when the rule is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodingRule {
    /// 1 where any input column is non-null; inputs are dropped
    AnyPresent { inputs: Vec<String>, output: String },
    /// 1 where the procedure starts with a listed prefix or the delivery
    /// diagnosis is present; both inputs are dropped
    Cesarean {
        procedure: String,
        procedure_prefixes: Vec<String>,
        delivery: String,
        output: String,
    },
    /// Several prefix indicators from one coded column, dropped afterwards
    PrefixFamily {
        input: String,
        outputs: Vec<(String, Vec<String>)>,
    },
}

impl EncodingRule {
    /// Presence rule over several diagnosis codes
    pub fn any_present(inputs: &[&str], output: &str) -> Self {
        Self::AnyPresent {
            inputs: inputs.iter().map(|s| (*s).to_string()).collect(),
            output: output.to_string(),
        }
    }

    /// Presence rule over a single diagnosis code
    pub fn single(input: &str, output: &str) -> Self {
        Self::any_present(&[input], output)
    }

    /// Indicator columns produced by this rule
    #[must_use]
    pub fn outputs(&self) -> Vec<&str> {
        match self {
            Self::AnyPresent { output, .. } | Self::Cesarean { output, .. } => vec![output.as_str()],
            Self::PrefixFamily { outputs, .. } => {
                outputs.iter().map(|(name, _)| name.as_str()).collect()
            }
        }
    }

    /// Apply the rule to `batch`
    ///
    /// # Errors
    /// Fails if an input query is not in the catalog
    pub fn apply(&self, batch: &RecordBatch, catalog: &FeatureCatalog) -> Result<RecordBatch> {
        match self {
            Self::AnyPresent { inputs, output } => {
                let columns = inputs
                    .iter()
                    .map(|input| catalog.resolve_code(input))
                    .collect::<Result<Vec<_>>>()?;
                encode_presence_from_nulls(batch, &columns, output)
            }
            Self::Cesarean {
                procedure,
                procedure_prefixes,
                delivery,
                output,
            } => {
                let procedure = catalog.resolve_code(procedure)?;
                let delivery = catalog.resolve_code(delivery)?;

                let by_procedure = prefix_match(batch, &procedure, procedure_prefixes)?;
                let by_delivery = any_present(batch, &[&delivery]);
                let flags: Vec<bool> = by_procedure
                    .iter()
                    .zip(&by_delivery)
                    .map(|(p, d)| *p || *d)
                    .collect();

                let batch = with_column(batch, output, indicator_array(&flags))?;
                drop_columns(&batch, &[procedure, delivery])
            }
            Self::PrefixFamily { input, outputs } => {
                let column = catalog.resolve_code(input)?;
                let mut batch = batch.clone();
                for (output, prefixes) in outputs {
                    batch = encode_presence_from_prefix(&batch, &column, prefixes, output)?;
                }
                drop_columns(&batch, &[column])
            }
        }
    }
}

fn prefixes(codes: &[&str]) -> Vec<String> {
    codes.iter().map(|s| (*s).to_string()).collect()
}

/// Rules of the endometriosis study, in application order
#[must_use]
pub fn standard_rules() -> Vec<EncodingRule> {
    let mut rules = vec![
        EncodingRule::any_present(
            &["O26", "O44", "O60", "O00", "O70"],
            "had_pregnancy_complications",
        ),
        EncodingRule::any_present(&["G43", "G44"], "has_headache_syndromes"),
        EncodingRule::any_present(&["E02", "E03", "E34"], "has_endocrine_disorder"),
        EncodingRule::any_present(&["D50", "D51", "D52", "D59"], "has_anemia"),
        EncodingRule::Cesarean {
            procedure: "Operative procedures".to_string(),
            procedure_prefixes: prefixes(&["R17", "R18"]),
            delivery: "O82".to_string(),
            output: "had_cesarean_section".to_string(),
        },
        EncodingRule::PrefixFamily {
            input: "cancer".to_string(),
            outputs: vec![
                ("had_ovarian_cancer".to_string(), prefixes(&["C56"])),
                ("had_uterine_cancer".to_string(), prefixes(&["C55"])),
                ("had_breast_cancer".to_string(), prefixes(&["C50"])),
                ("had_cervical_cancer".to_string(), prefixes(&["C53"])),
                ("had_melanoma".to_string(), prefixes(&["C44", "C43"])),
            ],
        },
        EncodingRule::any_present(&["N81", "N84", "N83", "N70", "N73"], "has_gyno_conditions"),
        EncodingRule::any_present(&["K52", "K59", "K50", "K51"], "has_gastro_conditions"),
    ];

    rules.extend(
        [
            ("O03", "had_abortion"),
            ("K58", "has_ibs"),
            ("N97", "has_infertility"),
            ("M32", "has_lupus"),
            ("N94", "has_menstrual_pain"),
            ("M54", "has_back_pain"),
            ("N39", "had_uti"),
            ("K35", "had_appendicitis"),
            ("N92", "has_excessive_menstruation"),
            ("E28", "has_pcos"),
            ("N72", "has_cervicitis"),
        ]
        .into_iter()
        .map(|(code, output)| EncodingRule::single(code, output)),
    );

    rules
}
