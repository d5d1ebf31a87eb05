//! Feature Encoder / Alignment
//!
//! Turns a [`FeatureRecord`] into a numeric vector laid out exactly like a
//! frozen [`FeatureSchema`]. Categorical groups are one-hot encoded with the
//! first (lexicographically smallest) training category as the all-zero
//! reference. Schema columns the record does not produce are zero, record
//! columns the schema does not know are dropped.

use crate::errors::{CoreError, Result};
use crate::records::MergedRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Numeric columns, in schema order.
pub const NUMERIC_COLUMNS: [&str; 10] = [
    "year",
    "month",
    "day",
    "age_0_5",
    "age_5_17",
    "age_18_plus",
    "bio_age_5_17",
    "bio_age_18_plus",
    "total_enrolment",
    "total_biometric",
];

/// Categorical group holding the weekday name.
pub const DAY_OF_WEEK: &str = "day_of_week";

/// Categorical group holding the district name.
pub const DISTRICT: &str = "district";

/// Categorical groups, in schema order.
pub const CATEGORICAL_GROUPS: [&str; 2] = [DAY_OF_WEEK, DISTRICT];

/// Name of the one-hot column for `value` in `group`.
pub fn one_hot_column(group: &str, value: &str) -> String {
    format!("{group}_{value}")
}

/// The five raw age-bracket counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AgeCounts {
    pub age_0_5: f64,
    pub age_5_17: f64,
    pub age_18_plus: f64,
    pub bio_age_5_17: f64,
    pub bio_age_18_plus: f64,
}

impl AgeCounts {
    pub fn total_enrolment(&self) -> f64 {
        self.age_0_5 + self.age_5_17 + self.age_18_plus
    }

    pub fn total_biometric(&self) -> f64 {
        self.bio_age_5_17 + self.bio_age_18_plus
    }
}

/// Encoder input: date parts, counts and the two categorical values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub counts: AgeCounts,
    pub day_of_week: String,
    pub district: String,
}

impl FeatureRecord {
    pub fn new(
        year: i32,
        month: u32,
        day: u32,
        day_of_week: impl Into<String>,
        district: impl Into<String>,
        counts: AgeCounts,
    ) -> Self {
        Self {
            year,
            month,
            day,
            counts,
            day_of_week: day_of_week.into(),
            district: district.into(),
        }
    }

    /// Training-side record built from a merged row.
    pub fn from_merged(row: &MergedRecord) -> Self {
        Self {
            year: row.year(),
            month: row.month(),
            day: row.day(),
            counts: AgeCounts {
                age_0_5: row.age_0_5,
                age_5_17: row.age_5_17,
                age_18_plus: row.age_18_plus,
                bio_age_5_17: row.bio_age_5_17,
                bio_age_18_plus: row.bio_age_18_plus,
            },
            day_of_week: row.day_of_week().to_string(),
            district: row.district.clone(),
        }
    }

    pub fn total_enrolment(&self) -> f64 {
        self.counts.total_enrolment()
    }

    pub fn total_biometric(&self) -> f64 {
        self.counts.total_biometric()
    }

    /// Values of [`NUMERIC_COLUMNS`], in order.
    pub fn numeric_values(&self) -> [f64; 10] {
        let c = &self.counts;
        [
            f64::from(self.year),
            f64::from(self.month),
            f64::from(self.day),
            c.age_0_5,
            c.age_5_17,
            c.age_18_plus,
            c.bio_age_5_17,
            c.bio_age_18_plus,
            c.total_enrolment(),
            c.total_biometric(),
        ]
    }

    /// Categorical value for a group name.
    pub fn category(&self, group: &str) -> Option<&str> {
        match group {
            DAY_OF_WEEK => Some(&self.day_of_week),
            DISTRICT => Some(&self.district),
            _ => None,
        }
    }
}

/// Frozen, ordered column list a classifier was trained on.
///
/// Serialized as `{"columns": [...], "reference_categories": {...}}`. A bare
/// JSON array of column names is also accepted on load; reference categories
/// are then unknown and only explicit one-hot columns count as seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SchemaRepr")]
pub struct FeatureSchema {
    columns: Vec<String>,
    /// Group name → category encoded as all zeros.
    #[serde(default)]
    reference_categories: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SchemaRepr {
    Full {
        columns: Vec<String>,
        #[serde(default)]
        reference_categories: BTreeMap<String, String>,
    },
    Bare(Vec<String>),
}

impl TryFrom<SchemaRepr> for FeatureSchema {
    type Error = CoreError;

    fn try_from(repr: SchemaRepr) -> Result<Self> {
        let (columns, reference_categories) = match repr {
            SchemaRepr::Full {
                columns,
                reference_categories,
            } => (columns, reference_categories),
            SchemaRepr::Bare(columns) => (columns, BTreeMap::new()),
        };
        Self::new(columns, reference_categories)
    }
}

impl FeatureSchema {
    /// Build a schema from explicit parts, rejecting empty or duplicated columns.
    pub fn new(
        columns: Vec<String>,
        reference_categories: BTreeMap<String, String>,
    ) -> Result<Self> {
        if columns.is_empty() {
            return Err(CoreError::InvalidSchema("schema has no columns".into()));
        }
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(CoreError::InvalidSchema(format!(
                    "duplicate column {column:?}"
                )));
            }
        }
        Ok(Self {
            columns,
            reference_categories,
        })
    }

    /// Numeric columns followed by drop-first one-hot columns of each group.
    pub fn from_training_rows(rows: &[FeatureRecord]) -> Self {
        let mut columns: Vec<String> = NUMERIC_COLUMNS.iter().map(|c| c.to_string()).collect();
        let mut reference_categories = BTreeMap::new();

        for group in CATEGORICAL_GROUPS {
            let categories: BTreeSet<&str> =
                rows.iter().filter_map(|r| r.category(group)).collect();
            let mut categories = categories.into_iter();

            if let Some(reference) = categories.next() {
                reference_categories.insert(group.to_string(), reference.to_string());
            }
            columns.extend(categories.map(|value| one_hot_column(group, value)));
        }

        Self {
            columns,
            reference_categories,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn reference_category(&self, group: &str) -> Option<&str> {
        self.reference_categories.get(group).map(String::as_str)
    }

    /// Whether `value` of `group` was present in the training data.
    pub fn knows_category(&self, group: &str, value: &str) -> bool {
        if self.reference_category(group) == Some(value) {
            return true;
        }
        let column = one_hot_column(group, value);
        self.columns.iter().any(|c| *c == column)
    }

    /// Category values of a group that have their own column.
    pub fn categories(&self, group: &str) -> Vec<&str> {
        let prefix = format!("{group}_");
        let mut values: Vec<&str> = self
            .reference_category(group)
            .into_iter()
            .chain(self.columns.iter().filter_map(|c| c.strip_prefix(&prefix)))
            .collect();
        values.sort_unstable();
        values.dedup();
        values
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// A vector aligned to a schema, plus whether each categorical value was known.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFeatures {
    pub values: Vec<f64>,
    pub district_in_training: bool,
    pub day_of_week_in_training: bool,
}

/// Encode one record against a frozen schema.
pub fn encode(record: &FeatureRecord, schema: &FeatureSchema) -> EncodedFeatures {
    let mut fresh: HashMap<String, f64> = NUMERIC_COLUMNS
        .iter()
        .zip(record.numeric_values())
        .map(|(name, value)| (name.to_string(), value))
        .collect();

    for group in CATEGORICAL_GROUPS {
        if let Some(value) = record.category(group) {
            if schema.reference_category(group) != Some(value) {
                fresh.insert(one_hot_column(group, value), 1.0);
            }
        }
    }

    let values = schema
        .columns
        .iter()
        .map(|column| fresh.get(column).copied().unwrap_or(0.0))
        .collect();

    EncodedFeatures {
        values,
        district_in_training: schema.knows_category(DISTRICT, &record.district),
        day_of_week_in_training: schema.knows_category(DAY_OF_WEEK, &record.day_of_week),
    }
}

/// Encode a training matrix, one row per record.
pub fn encode_batch(records: &[FeatureRecord], schema: &FeatureSchema) -> Vec<Vec<f64>> {
    records.iter().map(|r| encode(r, schema).values).collect()
}
