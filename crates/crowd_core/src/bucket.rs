//! Crowd-Level Bucketer
//!
//! Equal-population quantile binning over `total_biometric`. Cut-points are
//! computed by linear interpolation between order statistics and duplicate
//! cut-points are collapsed, so a skewed column can produce fewer bins than
//! requested. Bins are right-closed `(e_i, e_{i+1}]`; the first bin also
//! includes its lower edge.
//!
//! Boundaries always come from the values passed in. Callers that filter rows
//! first (a single district, a date window) get boundaries relative to that
//! subset.

use crate::records::CrowdLevel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of crowd levels.
pub const CROWD_LEVELS: usize = 3;

/// Result of quantile binning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buckets {
    /// Strictly increasing cut-points; `edges.len() - 1` bins.
    pub edges: Vec<f64>,
    /// Bin index per input value, in input order.
    pub assignments: Vec<usize>,
}

/// Crowd levels for a population of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrowdBuckets {
    pub edges: Vec<f64>,
    pub levels: Vec<CrowdLevel>,
}

impl CrowdBuckets {
    /// Row count per level. Levels with no rows are absent.
    pub fn distribution(&self) -> BTreeMap<CrowdLevel, usize> {
        let mut counts = BTreeMap::new();
        for level in &self.levels {
            *counts.entry(*level).or_insert(0) += 1;
        }
        counts
    }

    /// Levels that can occur given the collapsed edges.
    pub fn available_levels(&self) -> &'static [CrowdLevel] {
        const LEVELS: &[CrowdLevel] = &CrowdLevel::ALL;
        let bins = self.edges.len().saturating_sub(1).clamp(1, CROWD_LEVELS);
        &LEVELS[..bins]
    }
}

/// `q + 1` quantile cut-points with duplicates collapsed.
///
/// Returns an empty vector for empty input or `q == 0`.
pub fn quantile_edges(values: &[f64], q: usize) -> Vec<f64> {
    if values.is_empty() || q == 0 {
        return Vec::new();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut edges: Vec<f64> = Vec::with_capacity(q + 1);
    for k in 0..=q {
        let edge = interpolate(&sorted, k, q);
        if edges.last().map_or(true, |last| edge > *last) {
            edges.push(edge);
        }
    }
    edges
}

/// Linear interpolation between order statistics at probability `k / q`.
fn interpolate(sorted: &[f64], k: usize, q: usize) -> f64 {
    let pos = (k * (sorted.len() - 1)) as f64 / q as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Bin index of `value` against `edges`, clamped into range.
pub fn bin_index(edges: &[f64], value: f64) -> usize {
    if edges.len() < 2 {
        return 0;
    }
    let interior = &edges[1..edges.len() - 1];
    interior.iter().filter(|edge| **edge < value).count()
}

/// Quantile binning of `values` into at most `q` bins.
pub fn quantile_buckets(values: &[f64], q: usize) -> Buckets {
    let edges = quantile_edges(values, q);
    let assignments = values.iter().map(|v| bin_index(&edges, *v)).collect();
    Buckets { edges, assignments }
}

/// Tertile binning mapped onto [`CrowdLevel`].
pub fn assign_crowd_levels(values: &[f64]) -> CrowdBuckets {
    let Buckets { edges, assignments } = quantile_buckets(values, CROWD_LEVELS);
    let levels = assignments
        .into_iter()
        .map(|idx| CrowdLevel::from_index(idx).unwrap_or(CrowdLevel::High))
        .collect();
    CrowdBuckets { edges, levels }
}
