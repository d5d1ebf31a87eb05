//! Held-out evaluation and feature importance

use crowdcast_core::CrowdLevel;
use serde::{Deserialize, Serialize};

/// Precision / recall / F1 for one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub samples: usize,
    pub accuracy: f64,
    /// `confusion_matrix[actual][predicted]`
    pub confusion_matrix: [[usize; 3]; 3],
    pub per_class: Vec<ClassMetrics>,
    pub macro_f1: f64,
    pub weighted_f1: f64,
}

impl EvaluationReport {
    pub fn from_predictions(actual: &[CrowdLevel], predicted: &[CrowdLevel]) -> Self {
        let mut confusion_matrix = [[0usize; 3]; 3];
        for (a, p) in actual.iter().zip(predicted) {
            confusion_matrix[a.index()][p.index()] += 1;
        }

        let samples = actual.len().min(predicted.len());
        let correct: usize = (0..3).map(|k| confusion_matrix[k][k]).sum();

        let per_class: Vec<ClassMetrics> = CrowdLevel::ALL
            .iter()
            .map(|level| {
                let k = level.index();
                let tp = confusion_matrix[k][k] as f64;
                let predicted_k: usize = (0..3).map(|a| confusion_matrix[a][k]).sum();
                let support: usize = confusion_matrix[k].iter().sum();

                let precision = ratio(tp, predicted_k as f64);
                let recall = ratio(tp, support as f64);
                ClassMetrics {
                    label: level.to_string(),
                    precision,
                    recall,
                    f1: ratio(2.0 * precision * recall, precision + recall),
                    support,
                }
            })
            .collect();

        let macro_f1 = per_class.iter().map(|m| m.f1).sum::<f64>() / per_class.len() as f64;
        let weighted_f1 = ratio(
            per_class.iter().map(|m| m.f1 * m.support as f64).sum(),
            samples as f64,
        );

        Self {
            samples,
            accuracy: ratio(correct as f64, samples as f64),
            confusion_matrix,
            per_class,
            macro_f1,
            weighted_f1,
        }
    }
}

/// `num / den`, or 0 when the denominator is 0
fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Total split gain attributed to one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    /// Share of all split gain, in `[0, 1]`
    pub importance: f64,
}

/// Normalised gain importance, highest first; ties keep schema order.
pub fn rank_importance(names: &[String], gains: &[f64]) -> Vec<FeatureImportance> {
    let total: f64 = gains.iter().sum();
    let mut ranked: Vec<FeatureImportance> = names
        .iter()
        .zip(gains)
        .map(|(name, gain)| FeatureImportance {
            feature: name.clone(),
            importance: ratio(*gain, total),
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crowdcast_core::CrowdLevel::{High, Low, Medium};

    #[test]
    fn test_perfect_predictions() {
        let labels = [Low, Medium, High, High];
        let report = EvaluationReport::from_predictions(&labels, &labels);
        assert_eq!(report.accuracy, 1.0);
        assert_eq!(report.macro_f1, 1.0);
        assert_eq!(report.confusion_matrix[2][2], 2);
    }

    #[test]
    fn test_confusion_and_metrics() {
        let actual = [Low, Low, Medium, High];
        let predicted = [Low, Medium, Medium, Low];
        let report = EvaluationReport::from_predictions(&actual, &predicted);

        assert_eq!(report.accuracy, 0.5);
        assert_eq!(report.confusion_matrix[0], [1, 1, 0]);
        assert_eq!(report.confusion_matrix[2], [1, 0, 0]);

        let low = &report.per_class[0];
        assert_eq!(low.support, 2);
        assert_eq!(low.precision, 0.5);
        assert_eq!(low.recall, 0.5);

        let high = &report.per_class[2];
        assert_eq!(high.precision, 0.0);
        assert_eq!(high.f1, 0.0);
    }

    #[test]
    fn test_empty_evaluation() {
        let report = EvaluationReport::from_predictions(&[], &[]);
        assert_eq!(report.samples, 0);
        assert_eq!(report.accuracy, 0.0);
    }

    #[test]
    fn test_rank_importance() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let ranked = rank_importance(&names, &[1.0, 3.0, 0.0]);
        assert_eq!(ranked[0].feature, "b");
        assert_eq!(ranked[0].importance, 0.75);
        assert_eq!(ranked[2].feature, "c");

        let zero = rank_importance(&names, &[0.0; 3]);
        assert!(zero.iter().all(|f| f.importance == 0.0));
        assert_eq!(zero[0].feature, "a");
    }
}
