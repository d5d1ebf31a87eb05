//! Training matrix construction and stratified splitting
//!
//! Turns a merged table into fixed-point feature rows and crowd-level
//! labels, then splits them per class with a seeded shuffle.

use crowdcast_core::gbdt::{to_fixed, SCALE};
use crowdcast_core::{
    assign_crowd_levels, encode_batch, CrowdBuckets, CrowdLevel, FeatureRecord, FeatureSchema,
    MergedTable,
};

use crate::deterministic::LcgRng;
use crate::errors::TrainerError;

/// Training dataset with fixed-point features and class labels
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    pub features: Vec<Vec<i64>>,
    pub labels: Vec<CrowdLevel>,
    pub feature_count: usize,
}

/// Everything derived from a merged table before training
#[derive(Clone, Debug)]
pub struct PreparedData {
    pub dataset: Dataset,
    pub schema: FeatureSchema,
    pub buckets: CrowdBuckets,
}

impl Dataset {
    pub fn new(features: Vec<Vec<i64>>, labels: Vec<CrowdLevel>) -> Result<Self, TrainerError> {
        if features.len() != labels.len() {
            return Err(TrainerError::Dataset(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        let feature_count = features.first().map(Vec::len).unwrap_or(0);
        if let Some(i) = features.iter().position(|row| row.len() != feature_count) {
            return Err(TrainerError::Dataset(format!(
                "row {i} has {} features, expected {feature_count}",
                features[i].len()
            )));
        }
        Ok(Self {
            features,
            labels,
            feature_count,
        })
    }

    /// Label every row by `total_biometric` tertile and encode it against a
    /// schema built from the same rows.
    pub fn from_table(table: &MergedTable) -> Result<PreparedData, TrainerError> {
        if table.is_empty() {
            return Err(TrainerError::Dataset("merged table is empty".into()));
        }

        let totals: Vec<f64> = table.records().iter().map(|r| r.total_biometric).collect();
        let buckets = assign_crowd_levels(&totals);

        let records: Vec<FeatureRecord> =
            table.records().iter().map(FeatureRecord::from_merged).collect();
        let schema = FeatureSchema::from_training_rows(&records);

        let features = encode_batch(&records, &schema)
            .into_iter()
            .map(|row| row.into_iter().map(|v| to_fixed(v, SCALE)).collect())
            .collect();

        let dataset = Self::new(features, buckets.levels.clone())?;
        Ok(PreparedData {
            dataset,
            schema,
            buckets,
        })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Row count per class, indexed by `CrowdLevel::index`
    pub fn class_counts(&self) -> [usize; 3] {
        let mut counts = [0; 3];
        for label in &self.labels {
            counts[label.index()] += 1;
        }
        counts
    }

    /// Rows at the given indices, in that order
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            feature_count: self.feature_count,
        }
    }

    /// Stratified train/test split.
    ///
    /// Each class is shuffled with its own seeded stream and contributes
    /// `round(n_class * test_fraction)` rows to the test side. Both sides keep
    /// the original row order.
    pub fn stratified_split(
        &self,
        test_fraction: f64,
        seed: u64,
    ) -> Result<(Self, Self), TrainerError> {
        if !(0.0..1.0).contains(&test_fraction) {
            return Err(TrainerError::Config(format!(
                "test fraction must be in [0, 1), got {test_fraction}"
            )));
        }

        let mut train = Vec::with_capacity(self.len());
        let mut test = Vec::new();

        for level in CrowdLevel::ALL {
            let mut members: Vec<usize> = (0..self.len())
                .filter(|&i| self.labels[i] == level)
                .collect();
            LcgRng::new(seed.wrapping_add(level.index() as u64)).shuffle(&mut members);

            let n_test = (members.len() as f64 * test_fraction).round() as usize;
            let n_test = n_test.min(members.len().saturating_sub(1));
            test.extend_from_slice(&members[..n_test]);
            train.extend_from_slice(&members[n_test..]);
        }

        train.sort_unstable();
        test.sort_unstable();
        Ok((self.subset(&train), self.subset(&test)))
    }

    /// Per-feature (min, max) for logging
    pub fn feature_stats(&self) -> Vec<(i64, i64)> {
        let mut stats = vec![(i64::MAX, i64::MIN); self.feature_count];
        for row in &self.features {
            for (i, &val) in row.iter().enumerate() {
                stats[i].0 = stats[i].0.min(val);
                stats[i].1 = stats[i].1.max(val);
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy(n_per_class: usize) -> Dataset {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for level in CrowdLevel::ALL {
            for i in 0..n_per_class {
                features.push(vec![(level.index() * 100 + i) as i64]);
                labels.push(level);
            }
        }
        Dataset::new(features, labels).unwrap()
    }

    #[test]
    fn test_split_is_stratified() -> anyhow::Result<()> {
        let data = toy(10);
        let (train, test) = data.stratified_split(0.2, 42)?;

        assert_eq!(train.len() + test.len(), data.len());
        assert_eq!(test.class_counts(), [2, 2, 2]);
        assert_eq!(train.class_counts(), [8, 8, 8]);
        Ok(())
    }

    #[test]
    fn test_split_is_seeded() -> anyhow::Result<()> {
        let data = toy(25);
        let (_, a) = data.stratified_split(0.2, 42)?;
        let (_, b) = data.stratified_split(0.2, 42)?;
        let (_, c) = data.stratified_split(0.2, 7)?;
        assert_eq!(a, b);
        assert_ne!(a.features, c.features);
        Ok(())
    }

    #[test]
    fn test_singleton_class_stays_in_training() -> anyhow::Result<()> {
        let data = Dataset::new(vec![vec![1], vec![2]], vec![CrowdLevel::Low, CrowdLevel::High])?;
        let (train, test) = data.stratified_split(0.5, 1)?;
        assert_eq!(train.len(), 2);
        assert!(test.is_empty());
        Ok(())
    }

    #[test]
    fn test_bad_fraction_rejected() {
        assert!(toy(3).stratified_split(1.0, 1).is_err());
        assert!(toy(3).stratified_split(-0.1, 1).is_err());
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = Dataset::new(vec![vec![1, 2], vec![3]], vec![CrowdLevel::Low; 2]);
        assert!(err.is_err());
    }

    #[test]
    fn test_feature_stats() {
        let stats = toy(3).feature_stats();
        assert_eq!(stats, vec![(0, 202)]);
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;
        use proptest::prelude::prop;

        proptest! {
            #[test]
            fn split_partitions_every_row(
                labels in prop::collection::vec(0usize..3, 1..60),
                fraction in 0.0f64..0.9,
                seed in any::<u64>(),
            ) {
                let labels: Vec<CrowdLevel> =
                    labels.into_iter().filter_map(CrowdLevel::from_index).collect();
                let features = (0..labels.len()).map(|i| vec![i as i64]).collect();
                let data = Dataset::new(features, labels).unwrap();

                let (train, test) = data.stratified_split(fraction, seed).unwrap();
                let mut ids: Vec<i64> = train
                    .features
                    .iter()
                    .chain(&test.features)
                    .map(|row| row[0])
                    .collect();
                ids.sort_unstable();
                prop_assert_eq!(ids, (0..data.len() as i64).collect::<Vec<_>>());

                let all = data.class_counts();
                let kept = train.class_counts();
                for k in 0..3 {
                    if all[k] > 0 {
                        prop_assert!(kept[k] >= 1);
                    }
                }
            }
        }
    }
}
