//! Service configuration
//!
//! Resolution order: TOML file (`--config` or `CROWDCAST_CONFIG`), then
//! `CROWDCAST_*` environment overrides, then built-in defaults for anything
//! still unset.

use crowdcast_core::DistrictNormalizer;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::ConfigError;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "CROWDCAST_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub model_path: PathBuf,
    pub schema_path: PathBuf,
    pub updates_csv: PathBuf,
    pub enrollments_csv: PathBuf,
    /// Year used when a prediction omits one; current year when unset
    pub default_year: Option<i32>,
    pub district_preset: String,
    /// Extra aliases / exclusions merged over the preset
    pub districts: DistrictNormalizer,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/crowd/model.json"),
            schema_path: PathBuf::from("models/crowd/feature_schema.json"),
            updates_csv: PathBuf::from("data/biometric_updates.csv"),
            enrollments_csv: PathBuf::from("data/enrollments.csv"),
            default_year: None,
            district_preset: "none".to_string(),
            districts: DistrictNormalizer::default(),
        }
    }
}

impl ServiceConfig {
    /// Load from `path`, or `CROWDCAST_CONFIG`, or defaults; then apply the
    /// process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(from_env) {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        config.normalizer()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Apply `CROWDCAST_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let paths: [(&str, &mut PathBuf); 4] = [
            ("CROWDCAST_MODEL_PATH", &mut self.model_path),
            ("CROWDCAST_SCHEMA_PATH", &mut self.schema_path),
            ("CROWDCAST_UPDATES_CSV", &mut self.updates_csv),
            ("CROWDCAST_ENROLLMENTS_CSV", &mut self.enrollments_csv),
        ];
        for (key, slot) in paths {
            if let Some(value) = lookup(key) {
                debug!("{key} override: {value}");
                *slot = PathBuf::from(value);
            }
        }

        if let Some(value) = lookup("CROWDCAST_DEFAULT_YEAR") {
            let year = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                variable: "CROWDCAST_DEFAULT_YEAR".into(),
                value: value.clone(),
            })?;
            self.default_year = Some(year);
        }
        if let Some(value) = lookup("CROWDCAST_DISTRICT_PRESET") {
            self.district_preset = value;
        }
        Ok(())
    }

    pub fn normalizer(&self) -> Result<DistrictNormalizer, ConfigError> {
        let mut normalizer = DistrictNormalizer::preset(&self.district_preset)
            .ok_or_else(|| ConfigError::UnknownPreset(self.district_preset.clone()))?;
        normalizer
            .aliases
            .extend(self.districts.aliases.iter().map(|(k, v)| (k.clone(), v.clone())));
        normalizer
            .excluded
            .extend(self.districts.excluded.iter().cloned());
        Ok(normalizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_file_then_overrides() -> anyhow::Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(
            file,
            r#"
model_path = "a/model.json"
default_year = 2025
district_preset = "andhra_pradesh"
"#
        )?;

        let mut config = ServiceConfig::from_file(file.path())?;
        assert_eq!(config.default_year, Some(2025));
        assert_eq!(config.schema_path, ServiceConfig::default().schema_path);

        let env: HashMap<&str, &str> = [
            ("CROWDCAST_MODEL_PATH", "b/model.json"),
            ("CROWDCAST_DEFAULT_YEAR", "2027"),
        ]
        .into_iter()
        .collect();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()))?;

        assert_eq!(config.model_path, PathBuf::from("b/model.json"));
        assert_eq!(config.default_year, Some(2027));
        assert!(!config.normalizer()?.is_identity());
        Ok(())
    }

    #[test]
    fn test_bad_year_override_rejected() {
        let mut config = ServiceConfig::default();
        let result = config.apply_overrides(|k| {
            (k == "CROWDCAST_DEFAULT_YEAR").then(|| "next year".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
    }

    #[test]
    fn test_unknown_preset() {
        let config = ServiceConfig {
            district_preset: "nowhere".into(),
            ..ServiceConfig::default()
        };
        assert!(matches!(
            config.normalizer(),
            Err(ConfigError::UnknownPreset(_))
        ));
    }
}
