//! Merger/Normalizer
//!
//! Outer-joins the update and enrollment tables on
//! `(date, state, district, pincode)`, zero-fills whichever side is absent and
//! derives `total_enrolment` / `total_biometric`.
//!
//! Keys repeated on both sides follow relational join semantics: `m` update
//! rows and `n` enrollment rows sharing a key produce `m * n` merged rows.
//! Output is sorted by composite key; rows sharing a key keep input order.

use crate::districts::DistrictNormalizer;
use crate::errors::LoaderError;
use crate::loader::load_tables;
use crate::records::{CompositeKey, MergedRecord, MergedTable, RawEnrollmentRecord, RawUpdateRecord};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, instrument};

type JoinGroups<'a> = BTreeMap<CompositeKey, (Vec<&'a RawUpdateRecord>, Vec<&'a RawEnrollmentRecord>)>;

/// Outer-join both tables and derive totals.
pub fn merge_tables(
    updates: &[RawUpdateRecord],
    enrollments: &[RawEnrollmentRecord],
) -> MergedTable {
    let mut groups: JoinGroups<'_> = BTreeMap::new();

    for row in updates {
        groups.entry(row.key()).or_default().0.push(row);
    }
    for row in enrollments {
        groups.entry(row.key()).or_default().1.push(row);
    }

    let mut merged = Vec::with_capacity(updates.len().max(enrollments.len()));
    for (key, (left, right)) in &groups {
        match (left.is_empty(), right.is_empty()) {
            (false, false) => {
                for &u in left {
                    for &e in right {
                        merged.push(MergedRecord::from_parts(key, Some(u), Some(e)));
                    }
                }
            }
            (false, true) => {
                merged.extend(left.iter().map(|&u| MergedRecord::from_parts(key, Some(u), None)));
            }
            (true, false) => {
                merged.extend(right.iter().map(|&e| MergedRecord::from_parts(key, None, Some(e))));
            }
            (true, true) => {}
        }
    }

    MergedTable::new(merged)
}

/// Load both sources, normalise district names and merge.
#[instrument(skip_all, fields(updates = %update_path.as_ref().display(), enrollments = %enrollment_path.as_ref().display()))]
pub fn load_merged<P, Q>(
    update_path: P,
    enrollment_path: Q,
    normalizer: &DistrictNormalizer,
) -> Result<MergedTable, LoaderError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let (updates, enrollments) = load_tables(&update_path, &enrollment_path)?;
    let updates = normalizer.apply_updates(updates);
    let enrollments = normalizer.apply_enrollments(enrollments);

    let table = merge_tables(&updates, &enrollments);
    info!(
        "Merged {} update rows and {} enrollment rows into {} records ({} districts)",
        updates.len(),
        enrollments.len(),
        table.len(),
        table.districts().len()
    );
    Ok(table)
}
