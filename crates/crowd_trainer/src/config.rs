//! Trainer configuration
//!
//! Read from an optional TOML file; command-line flags override file values.

use crowdcast_core::DistrictNormalizer;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::TrainerError;
use crate::trainer::TrainingParams;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub updates_csv: PathBuf,
    pub enrollments_csv: PathBuf,
    /// Directory receiving model, hash, schema and report
    pub output_dir: PathBuf,
    pub test_fraction: f64,
    pub seed: u64,
    /// Built-in district normaliser name (`none`, `andhra_pradesh`)
    pub district_preset: String,
    /// Extra aliases / exclusions merged over the preset
    pub districts: DistrictNormalizer,
    pub params: TrainingParams,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            updates_csv: PathBuf::from("data/biometric_updates.csv"),
            enrollments_csv: PathBuf::from("data/enrollments.csv"),
            output_dir: PathBuf::from("models/crowd"),
            test_fraction: 0.2,
            seed: 42,
            district_preset: "none".to_string(),
            districts: DistrictNormalizer::default(),
            params: TrainingParams::default(),
        }
    }
}

impl TrainerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TrainerError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            TrainerError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| TrainerError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Preset normaliser with the configured aliases and exclusions on top.
    pub fn normalizer(&self) -> Result<DistrictNormalizer, TrainerError> {
        let mut normalizer = DistrictNormalizer::preset(&self.district_preset).ok_or_else(|| {
            TrainerError::Config(format!("unknown district preset {:?}", self.district_preset))
        })?;
        normalizer
            .aliases
            .extend(self.districts.aliases.iter().map(|(k, v)| (k.clone(), v.clone())));
        normalizer
            .excluded
            .extend(self.districts.excluded.iter().cloned());
        Ok(normalizer)
    }

    pub fn validate(&self) -> Result<(), TrainerError> {
        if !(0.0..1.0).contains(&self.test_fraction) {
            return Err(TrainerError::Config(format!(
                "test_fraction must be in [0, 1), got {}",
                self.test_fraction
            )));
        }
        self.normalizer()?;
        self.params.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = TrainerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.params.rounds, 300);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() -> anyhow::Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(
            file,
            r#"
output_dir = "out"
district_preset = "andhra_pradesh"

[params]
rounds = 10

[districts.aliases]
"Guntur Dist" = "Guntur"
"#
        )?;

        let config = TrainerConfig::from_file(file.path())?;
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.params.rounds, 10);
        assert_eq!(config.params.max_depth, 8);
        assert_eq!(config.test_fraction, 0.2);

        let normalizer = config.normalizer()?;
        assert_eq!(normalizer.canonical("Guntur Dist"), Some("Guntur"));
        assert_eq!(normalizer.canonical("Hyderabad"), None);
        Ok(())
    }

    #[test]
    fn test_unknown_preset_rejected() {
        let config = TrainerConfig {
            district_preset: "mars".into(),
            ..TrainerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
