//! District name standardisation.
//!
//! Source extracts spell the same district several ways and occasionally
//! carry rows from outside the region of interest. The normaliser rewrites
//! aliases to one canonical spelling, drops excluded districts and removes
//! exact duplicate rows. The default normaliser is the identity.

use crate::records::{RawEnrollmentRecord, RawUpdateRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

/// Alias table and exclusion list applied before merging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictNormalizer {
    /// Variant spelling → canonical name.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    /// Districts whose rows are removed.
    #[serde(default)]
    pub excluded: BTreeSet<String>,
}

impl DistrictNormalizer {
    /// Look up a built-in preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "none" | "identity" => Some(Self::default()),
            "andhra_pradesh" | "ap" => Some(Self::andhra_pradesh()),
            _ => None,
        }
    }

    /// Spelling fixes for Andhra Pradesh extracts, excluding districts that
    /// moved to Telangana.
    pub fn andhra_pradesh() -> Self {
        let aliases = [
            ("Anantapur", "Ananthapuramu"),
            ("Ananthapur", "Ananthapuramu"),
            ("K.V.Rangareddy", "Rangareddy"),
            ("K.v. Rangareddy", "Rangareddy"),
            ("Rangareddi", "Rangareddy"),
            ("Mahabub Nagar", "Mahabubnagar"),
            ("Mahbubnagar", "Mahabubnagar"),
            ("Karim Nagar", "Karimnagar"),
            ("Y. S. R", "YSR"),
            ("Cuddapah", "YSR Kadapa"),
            ("N. T. R", "NTR"),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();

        let excluded = [
            "Adilabad",
            "Hyderabad",
            "Khammam",
            "Medak",
            "Nalgonda",
            "Nizamabad",
            "Warangal",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self { aliases, excluded }
    }

    pub fn is_identity(&self) -> bool {
        self.aliases.is_empty() && self.excluded.is_empty()
    }

    /// Canonical spelling of one district name, `None` if excluded.
    pub fn canonical<'a>(&'a self, district: &'a str) -> Option<&'a str> {
        let name = self
            .aliases
            .get(district)
            .map(String::as_str)
            .unwrap_or(district);
        if self.excluded.contains(name) || self.excluded.contains(district) {
            None
        } else {
            Some(name)
        }
    }

    pub fn apply_updates(&self, rows: Vec<RawUpdateRecord>) -> Vec<RawUpdateRecord> {
        self.apply(rows, |r| {
            format!(
                "{}|{}|{}|{}|{}|{}",
                r.date, r.state, r.district, r.pincode,
                r.bio_age_5_17.to_bits(),
                r.bio_age_18_plus.to_bits()
            )
        })
    }

    pub fn apply_enrollments(&self, rows: Vec<RawEnrollmentRecord>) -> Vec<RawEnrollmentRecord> {
        self.apply(rows, |r| {
            format!(
                "{}|{}|{}|{}|{}|{}|{}",
                r.date, r.state, r.district, r.pincode,
                r.age_0_5.to_bits(),
                r.age_5_17.to_bits(),
                r.age_18_plus.to_bits()
            )
        })
    }

    fn apply<R, F>(&self, rows: Vec<R>, row_key: F) -> Vec<R>
    where
        R: DistrictRow,
        F: Fn(&R) -> String,
    {
        if self.is_identity() {
            return rows;
        }

        let before = rows.len();
        let mut seen = HashSet::with_capacity(rows.len());
        let mut out = Vec::with_capacity(rows.len());

        for mut row in rows {
            let Some(name) = self.canonical(row.district()).map(str::to_string) else {
                continue;
            };
            row.set_district(name);
            if seen.insert(row_key(&row)) {
                out.push(row);
            }
        }

        debug!("District normalisation kept {}/{} rows", out.len(), before);
        out
    }
}

trait DistrictRow {
    fn district(&self) -> &str;
    fn set_district(&mut self, name: String);
}

impl DistrictRow for RawUpdateRecord {
    fn district(&self) -> &str {
        &self.district
    }

    fn set_district(&mut self, name: String) {
        self.district = name;
    }
}

impl DistrictRow for RawEnrollmentRecord {
    fn district(&self) -> &str {
        &self.district
    }

    fn set_district(&mut self, name: String) {
        self.district = name;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn update(district: &str, bio: f64) -> RawUpdateRecord {
        RawUpdateRecord {
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            state: "Andhra Pradesh".to_string(),
            district: district.to_string(),
            pincode: "500001".to_string(),
            bio_age_5_17: bio,
            bio_age_18_plus: 1.0,
        }
    }

    #[test]
    fn test_identity_keeps_everything() {
        let rows = vec![update("Hyderabad", 1.0), update("Hyderabad", 1.0)];
        let out = DistrictNormalizer::default().apply_updates(rows.clone());
        assert_eq!(out, rows);
    }

    #[test]
    fn test_aliases_are_rewritten() {
        let normalizer = DistrictNormalizer::andhra_pradesh();
        let out = normalizer.apply_updates(vec![update("Anantapur", 1.0), update("Cuddapah", 2.0)]);
        assert_eq!(out[0].district, "Ananthapuramu");
        assert_eq!(out[1].district, "YSR Kadapa");
    }

    #[test]
    fn test_excluded_rows_are_dropped() {
        let normalizer = DistrictNormalizer::andhra_pradesh();
        let out = normalizer.apply_updates(vec![update("Hyderabad", 1.0), update("Guntur", 1.0)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].district, "Guntur");
    }

    #[test]
    fn test_duplicates_after_aliasing_collapse() {
        let normalizer = DistrictNormalizer::andhra_pradesh();
        let out = normalizer.apply_updates(vec![
            update("Anantapur", 3.0),
            update("Ananthapur", 3.0),
            update("Ananthapuramu", 4.0),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_preset_lookup() {
        assert!(DistrictNormalizer::preset("none").unwrap().is_identity());
        assert!(!DistrictNormalizer::preset("AP").unwrap().is_identity());
        assert!(DistrictNormalizer::preset("mars").is_none());
    }
}
