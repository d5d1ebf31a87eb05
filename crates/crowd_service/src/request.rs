//! Prediction payload parsing
//!
//! Payloads arrive as loosely typed JSON: numbers may be sent as numbers or
//! numeric strings. Everything is validated here so the encoder only sees
//! well-formed records.

use crowdcast_core::{AgeCounts, FeatureRecord};
use serde_json::{Map, Value};

use crate::errors::RequestError;

/// Fields a payload must carry, in reporting order
pub const REQUIRED_FIELDS: [&str; 4] = ["month", "day", "day_of_week", "district"];

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub year: Option<i32>,
    pub month: u32,
    pub day: u32,
    pub day_of_week: String,
    pub district: String,
    pub counts: AgeCounts,
}

impl PredictionRequest {
    pub fn from_value(value: &Value) -> Result<Self, RequestError> {
        let obj = value.as_object().ok_or(RequestError::NotAnObject)?;

        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|f| obj.get(**f).map_or(true, Value::is_null))
            .map(|f| f.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(RequestError::MissingFields(missing));
        }

        let month = integer(obj, "month")?;
        if !(1..=12).contains(&month) {
            return Err(RequestError::invalid("month", format!("{month} is not in 1..=12")));
        }
        let day = integer(obj, "day")?;
        if !(1..=31).contains(&day) {
            return Err(RequestError::invalid("day", format!("{day} is not in 1..=31")));
        }

        let year = match obj.get("year") {
            None | Some(Value::Null) => None,
            Some(_) => {
                let y = integer(obj, "year")?;
                Some(i32::try_from(y).map_err(|_| RequestError::invalid("year", "out of range"))?)
            }
        };

        let day_of_week = text(obj, "day_of_week")?;
        let district = text(obj, "district")?;
        let counts = AgeCounts {
            age_0_5: count(obj, "age_0_5")?,
            age_5_17: count(obj, "age_5_17")?,
            age_18_plus: count(obj, "age_18_plus")?,
            bio_age_5_17: count(obj, "bio_age_5_17")?,
            bio_age_18_plus: count(obj, "bio_age_18_plus")?,
        };
        // Finite parts can still overflow their sum
        if !counts.total_enrolment().is_finite() {
            return Err(RequestError::invalid(
                "age_0_5/age_5_17/age_18_plus",
                "total enrolment overflows",
            ));
        }
        if !counts.total_biometric().is_finite() {
            return Err(RequestError::invalid(
                "bio_age_5_17/bio_age_18_plus",
                "total biometric overflows",
            ));
        }

        Ok(Self {
            year,
            month: month as u32,
            day: day as u32,
            day_of_week,
            district,
            counts,
        })
    }

    pub fn to_record(&self, default_year: i32) -> FeatureRecord {
        FeatureRecord::new(
            self.year.unwrap_or(default_year),
            self.month,
            self.day,
            &self.day_of_week,
            &self.district,
            self.counts,
        )
    }
}

fn number(obj: &Map<String, Value>, field: &str) -> Result<Option<f64>, RequestError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| RequestError::invalid(field, "not representable")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| RequestError::invalid(field, format!("{s:?} is not a number"))),
        Some(other) => Err(RequestError::invalid(
            field,
            format!("expected a number, got {other}"),
        )),
    }
}

fn integer(obj: &Map<String, Value>, field: &str) -> Result<i64, RequestError> {
    let v = number(obj, field)?.ok_or_else(|| RequestError::MissingFields(vec![field.into()]))?;
    if !v.is_finite() || v.fract() != 0.0 {
        return Err(RequestError::invalid(field, format!("{v} is not an integer")));
    }
    Ok(v as i64)
}

/// Optional non-negative count, 0 when absent
fn count(obj: &Map<String, Value>, field: &str) -> Result<f64, RequestError> {
    let v = number(obj, field)?.unwrap_or(0.0);
    if !v.is_finite() || v < 0.0 {
        return Err(RequestError::invalid(field, format!("{v} must be a finite count >= 0")));
    }
    Ok(v)
}

fn text(obj: &Map<String, Value>, field: &str) -> Result<String, RequestError> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(RequestError::invalid(field, "must not be empty")),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(RequestError::invalid(field, "expected a string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_full_payload() {
        let req = PredictionRequest::from_value(&json!({
            "month": 1, "day": "15", "day_of_week": "Wednesday", "district": "Guntur",
            "age_0_5": 5, "age_5_17": "10", "age_18_plus": 20.0,
            "bio_age_5_17": 8, "bio_age_18_plus": 15
        }))
        .unwrap();

        assert_eq!(req.year, None);
        assert_eq!(req.day, 15);
        assert_eq!(req.counts.total_enrolment(), 35.0);
        assert_eq!(req.counts.total_biometric(), 23.0);
        assert_eq!(req.to_record(2026).year, 2026);
    }

    #[test]
    fn test_reports_every_missing_field() {
        let err = PredictionRequest::from_value(&json!({"day": 3, "district": null})).unwrap_err();
        assert_eq!(
            err,
            RequestError::MissingFields(vec![
                "month".into(),
                "day_of_week".into(),
                "district".into()
            ])
        );
    }

    #[test]
    fn test_rejects_malformed_values() {
        let base = json!({"month": 2, "day": 1, "day_of_week": "Monday", "district": "Krishna"});

        let mut bad = base.clone();
        bad["month"] = json!(13);
        assert!(matches!(
            PredictionRequest::from_value(&bad),
            Err(RequestError::InvalidField { ref field, .. }) if field == "month"
        ));

        let mut bad = base.clone();
        bad["day"] = json!(1.5);
        assert!(PredictionRequest::from_value(&bad).is_err());

        let mut bad = base.clone();
        bad["age_0_5"] = json!(-1);
        assert!(PredictionRequest::from_value(&bad).is_err());

        let mut bad = base.clone();
        bad["district"] = json!("  ");
        assert!(PredictionRequest::from_value(&bad).is_err());

        let mut bad = base;
        bad["bio_age_5_17"] = json!("many");
        assert!(PredictionRequest::from_value(&bad).is_err());
    }

    #[test]
    fn test_rejects_overflowing_totals() {
        let err = PredictionRequest::from_value(&json!({
            "month": 1, "day": 15, "day_of_week": "Monday", "district": "Guntur",
            "age_0_5": 1e308, "age_5_17": 1e308
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            RequestError::InvalidField { ref field, .. } if field.contains("age_0_5")
        ));

        let err = PredictionRequest::from_value(&json!({
            "month": 1, "day": 15, "day_of_week": "Monday", "district": "Guntur",
            "bio_age_5_17": 1.5e308, "bio_age_18_plus": "1.5e308"
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            RequestError::InvalidField { ref field, .. } if field.contains("bio_age_5_17")
        ));
    }

    #[test]
    fn test_non_object_rejected() {
        assert_eq!(
            PredictionRequest::from_value(&json!([1, 2])),
            Err(RequestError::NotAnObject)
        );
    }
}
