//! Trained model artifacts: classifier, feature schema and model hash.

use crate::classifier::{CrowdPredictor, Prediction};
use crate::errors::{CoreError, Result};
use crate::features::{encode, FeatureRecord, FeatureSchema};
use crate::gbdt::GbdtClassifier;
use crate::serde_canon::hash_bytes_hex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// File names written by the trainer.
pub const MODEL_FILE: &str = "model.json";
pub const HASH_FILE: &str = "model.hash";
pub const SCHEMA_FILE: &str = "feature_schema.json";
pub const REPORT_FILE: &str = "training_report.json";

/// Companion hash path for a model file, e.g. `model.json` -> `model.hash`.
pub fn hash_path_for(model_path: &Path) -> PathBuf {
    model_path.with_extension("hash")
}

/// A classifier with the schema it was trained on.
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub classifier: GbdtClassifier,
    pub schema: FeatureSchema,
    /// Blake3 hex of the model file as stored on disk.
    pub model_hash: String,
}

/// Prediction together with the encoder's seen-category flags.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedPrediction {
    pub prediction: Prediction,
    pub district_in_training: bool,
    pub day_of_week_in_training: bool,
}

impl ModelArtifacts {
    /// Pair a classifier with a schema after checking they agree.
    pub fn new(classifier: GbdtClassifier, schema: FeatureSchema) -> Result<Self> {
        if classifier.feature_count != schema.len() {
            return Err(CoreError::SchemaMismatch {
                model: classifier.feature_count,
                schema: schema.len(),
            });
        }
        let model_hash = classifier.hash_hex()?;
        Ok(Self {
            classifier,
            schema,
            model_hash,
        })
    }

    /// Load a model file and its schema.
    ///
    /// When a `.hash` file sits next to the model its content must match the
    /// blake3 hash of the model bytes.
    #[instrument(skip_all, fields(model = %model_path.as_ref().display()))]
    pub fn load<P, Q>(model_path: P, schema_path: Q) -> Result<Self>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let model_path = model_path.as_ref();
        let bytes = fs::read(model_path)?;
        let computed = hash_bytes_hex(&bytes);

        let hash_path = hash_path_for(model_path);
        match fs::read_to_string(&hash_path) {
            Ok(stored) => {
                let expected = stored.trim().to_ascii_lowercase();
                if expected != computed {
                    return Err(CoreError::HashMismatch { expected, computed });
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!("No hash file at {}, skipping verification", hash_path.display());
            }
            Err(err) => return Err(err.into()),
        }

        let classifier: GbdtClassifier = serde_json::from_slice(&bytes)?;
        classifier.validate()?;
        let schema = FeatureSchema::load_json(schema_path)?;

        if classifier.feature_count != schema.len() {
            return Err(CoreError::SchemaMismatch {
                model: classifier.feature_count,
                schema: schema.len(),
            });
        }

        info!(
            "Loaded model {} ({} trees, {} features)",
            &computed[..12],
            classifier.num_trees(),
            schema.len()
        );

        Ok(Self {
            classifier,
            schema,
            model_hash: computed,
        })
    }

    /// Write model, hash and schema into `dir` using the standard file names.
    pub fn save_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let model_path = dir.join(MODEL_FILE);
        let json = self.classifier.to_canonical_json()?;
        fs::write(&model_path, &json)?;
        fs::write(hash_path_for(&model_path), hash_bytes_hex(json.as_bytes()))?;
        self.schema.save_json(dir.join(SCHEMA_FILE))?;

        Ok(model_path)
    }

    /// Encode a record against the schema and classify it.
    pub fn predict_record(&self, record: &FeatureRecord) -> Result<AlignedPrediction> {
        let encoded = encode(record, &self.schema);
        let prediction = self.classifier.predict(&encoded.values)?;
        Ok(AlignedPrediction {
            prediction,
            district_in_training: encoded.district_in_training,
            day_of_week_in_training: encoded.day_of_week_in_training,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::AgeCounts;
    use crate::gbdt::{Node, Tree, SCALE};
    use tempfile::TempDir;

    fn record(district: &str) -> FeatureRecord {
        FeatureRecord::new(2026, 1, 15, "Wednesday", district, AgeCounts::default())
    }

    fn artifacts() -> ModelArtifacts {
        let schema = FeatureSchema::from_training_rows(&[record("Guntur"), record("Krishna")]);
        let leaf_only = |v| vec![Tree::new(vec![Node::leaf(0, v)], SCALE)];
        let classifier = GbdtClassifier::new(
            schema.len(),
            vec![0, 0, 0],
            vec![leaf_only(0), leaf_only(SCALE), leaf_only(0)],
        );
        ModelArtifacts::new(classifier, schema).unwrap()
    }

    #[test]
    fn test_round_trip_through_directory() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let original = artifacts();
        let model_path = original.save_to_dir(dir.path())?;

        let loaded = ModelArtifacts::load(&model_path, dir.path().join(SCHEMA_FILE))?;
        assert_eq!(loaded.classifier, original.classifier);
        assert_eq!(loaded.schema, original.schema);
        assert_eq!(loaded.model_hash, original.model_hash);
        Ok(())
    }

    #[test]
    fn test_tampered_model_fails_hash_check() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let model_path = artifacts().save_to_dir(dir.path())?;
        fs::write(hash_path_for(&model_path), "00")?;

        let err = ModelArtifacts::load(&model_path, dir.path().join(SCHEMA_FILE)).unwrap_err();
        assert!(matches!(err, CoreError::HashMismatch { .. }));
        Ok(())
    }

    #[test]
    fn test_missing_hash_file_is_tolerated() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let model_path = artifacts().save_to_dir(dir.path())?;
        fs::remove_file(hash_path_for(&model_path))?;

        assert!(ModelArtifacts::load(&model_path, dir.path().join(SCHEMA_FILE)).is_ok());
        Ok(())
    }

    #[test]
    fn test_schema_length_must_match() {
        let a = artifacts();
        let short = FeatureSchema::from_training_rows(&[record("Guntur")]);
        assert!(matches!(
            ModelArtifacts::new(a.classifier, short),
            Err(CoreError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_predict_record_flags_unseen_district() -> anyhow::Result<()> {
        let a = artifacts();

        let seen = a.predict_record(&record("Krishna"))?;
        assert!(seen.district_in_training);
        assert_eq!(seen.prediction.level, crate::records::CrowdLevel::Medium);

        let unseen = a.predict_record(&record("Atlantis"))?;
        assert!(!unseen.district_in_training);
        let total: f64 = unseen.prediction.probabilities.as_array().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        Ok(())
    }
}
