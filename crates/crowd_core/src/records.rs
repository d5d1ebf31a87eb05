//! Row types shared by the loader, merger, encoder and service.
//!
//! Raw records are read-only inputs. A [`MergedRecord`] is recomputed on every
//! load and never persisted.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// Join key
// ---------------------------------------------------------------------------

/// The tuple both source tables are aligned on.
///
/// Field order defines the sort order of a merged table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompositeKey {
    pub date: NaiveDate,
    pub state: String,
    pub district: String,
    pub pincode: String,
}

// ---------------------------------------------------------------------------
// Raw rows
// ---------------------------------------------------------------------------

/// One row of the biometric-update table (6 positional columns).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawUpdateRecord {
    pub date: NaiveDate,
    pub state: String,
    pub district: String,
    pub pincode: String,
    pub bio_age_5_17: f64,
    pub bio_age_18_plus: f64,
}

impl RawUpdateRecord {
    pub fn key(&self) -> CompositeKey {
        CompositeKey {
            date: self.date,
            state: self.state.clone(),
            district: self.district.clone(),
            pincode: self.pincode.clone(),
        }
    }
}

/// One row of the enrollment table (7 positional columns).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEnrollmentRecord {
    pub date: NaiveDate,
    pub state: String,
    pub district: String,
    pub pincode: String,
    pub age_0_5: f64,
    pub age_5_17: f64,
    pub age_18_plus: f64,
}

impl RawEnrollmentRecord {
    pub fn key(&self) -> CompositeKey {
        CompositeKey {
            date: self.date,
            state: self.state.clone(),
            district: self.district.clone(),
            pincode: self.pincode.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Merged rows
// ---------------------------------------------------------------------------

/// Outer-join result of one update row and one enrollment row.
///
/// Counts missing on either side are `0.0`, never absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub date: NaiveDate,
    pub state: String,
    pub district: String,
    pub pincode: String,
    pub bio_age_5_17: f64,
    pub bio_age_18_plus: f64,
    pub age_0_5: f64,
    pub age_5_17: f64,
    pub age_18_plus: f64,
    pub total_enrolment: f64,
    pub total_biometric: f64,
}

impl MergedRecord {
    /// Build a row from the optional halves of a join, zero-filling the
    /// missing side and deriving both totals.
    pub fn from_parts(
        key: &CompositeKey,
        update: Option<&RawUpdateRecord>,
        enrollment: Option<&RawEnrollmentRecord>,
    ) -> Self {
        let (bio_age_5_17, bio_age_18_plus) = update
            .map(|u| (u.bio_age_5_17, u.bio_age_18_plus))
            .unwrap_or((0.0, 0.0));
        let (age_0_5, age_5_17, age_18_plus) = enrollment
            .map(|e| (e.age_0_5, e.age_5_17, e.age_18_plus))
            .unwrap_or((0.0, 0.0, 0.0));

        Self {
            date: key.date,
            state: key.state.clone(),
            district: key.district.clone(),
            pincode: key.pincode.clone(),
            bio_age_5_17,
            bio_age_18_plus,
            age_0_5,
            age_5_17,
            age_18_plus,
            total_enrolment: age_0_5 + age_5_17 + age_18_plus,
            total_biometric: bio_age_5_17 + bio_age_18_plus,
        }
    }

    pub fn key(&self) -> CompositeKey {
        CompositeKey {
            date: self.date,
            state: self.state.clone(),
            district: self.district.clone(),
            pincode: self.pincode.clone(),
        }
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }

    pub fn day(&self) -> u32 {
        self.date.day()
    }

    /// English weekday name, e.g. `"Wednesday"`.
    pub fn day_of_week(&self) -> &'static str {
        weekday_name(self.date.weekday())
    }
}

/// Full English name of a weekday.
pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Weekday names in calendar order, Monday first.
pub const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// A merged table, sorted by composite key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedTable {
    records: Vec<MergedRecord>,
}

impl MergedTable {
    pub fn new(records: Vec<MergedRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[MergedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows for one district, or every row when `district` is `None`.
    pub fn select(&self, district: Option<&str>) -> Vec<&MergedRecord> {
        match district {
            Some(name) => self.records.iter().filter(|r| r.district == name).collect(),
            None => self.records.iter().collect(),
        }
    }

    /// Sorted unique district names.
    pub fn districts(&self) -> Vec<String> {
        unique_districts(self.records.iter())
    }

    /// Earliest and latest date present, `None` for an empty table.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        date_range(self.records.iter())
    }
}

/// Sorted unique district names over any row selection.
pub fn unique_districts<'a, I>(rows: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a MergedRecord>,
{
    rows.into_iter()
        .map(|r| r.district.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Earliest and latest date over any row selection.
pub fn date_range<'a, I>(rows: I) -> Option<(NaiveDate, NaiveDate)>
where
    I: IntoIterator<Item = &'a MergedRecord>,
{
    rows.into_iter().fold(None, |acc, r| match acc {
        None => Some((r.date, r.date)),
        Some((lo, hi)) => Some((lo.min(r.date), hi.max(r.date))),
    })
}

// ---------------------------------------------------------------------------
// Crowd level
// ---------------------------------------------------------------------------

/// Ordinal crowd class derived from `total_biometric` tertiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CrowdLevel {
    Low,
    Medium,
    High,
}

impl CrowdLevel {
    /// All levels in ordinal order; index == class id.
    pub const ALL: [CrowdLevel; 3] = [CrowdLevel::Low, CrowdLevel::Medium, CrowdLevel::High];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CrowdLevel::Low => "Low",
            CrowdLevel::Medium => "Medium",
            CrowdLevel::High => "High",
        }
    }
}

impl fmt::Display for CrowdLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(day: u32, district: &str) -> CompositeKey {
        CompositeKey {
            date: NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
            state: "Andhra Pradesh".to_string(),
            district: district.to_string(),
            pincode: "522001".to_string(),
        }
    }

    #[test]
    fn test_from_parts_zero_fills_missing_side() {
        let k = key(1, "Guntur");
        let update = RawUpdateRecord {
            date: k.date,
            state: k.state.clone(),
            district: k.district.clone(),
            pincode: k.pincode.clone(),
            bio_age_5_17: 8.0,
            bio_age_18_plus: 15.0,
        };

        let row = MergedRecord::from_parts(&k, Some(&update), None);
        assert_eq!(row.total_biometric, 23.0);
        assert_eq!(row.total_enrolment, 0.0);
        assert_eq!(row.age_0_5, 0.0);
    }

    #[test]
    fn test_day_of_week_name() {
        // 2025-01-15 was a Wednesday.
        let k = CompositeKey {
            date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            ..key(1, "Guntur")
        };
        let row = MergedRecord::from_parts(&k, None, None);
        assert_eq!(row.day_of_week(), "Wednesday");
        assert_eq!((row.year(), row.month(), row.day()), (2025, 1, 15));
    }

    #[test]
    fn test_table_helpers() {
        let table = MergedTable::new(vec![
            MergedRecord::from_parts(&key(3, "Krishna"), None, None),
            MergedRecord::from_parts(&key(1, "Guntur"), None, None),
            MergedRecord::from_parts(&key(2, "Guntur"), None, None),
        ]);

        assert_eq!(table.districts(), vec!["Guntur", "Krishna"]);
        assert_eq!(table.select(Some("Guntur")).len(), 2);
        assert_eq!(table.select(None).len(), 3);

        let (lo, hi) = table.date_range().unwrap();
        assert_eq!(lo.day(), 1);
        assert_eq!(hi.day(), 3);
        assert!(MergedTable::default().date_range().is_none());
    }

    #[test]
    fn test_crowd_level_index_round_trip() {
        for level in CrowdLevel::ALL {
            assert_eq!(CrowdLevel::from_index(level.index()), Some(level));
        }
        assert_eq!(CrowdLevel::from_index(3), None);
        assert_eq!(CrowdLevel::High.to_string(), "High");
    }
}
