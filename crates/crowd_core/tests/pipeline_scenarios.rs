//! End-to-end scenarios over CSV fixtures: load, merge, bucket, encode, predict.

use anyhow::Result;
use crowdcast_core::gbdt::{Node, Tree, SCALE};
use crowdcast_core::{
    assign_crowd_levels, load_merged, AgeCounts, CrowdLevel, DistrictNormalizer, FeatureRecord,
    FeatureSchema, GbdtClassifier, ModelArtifacts,
};
use std::io::Write;
use tempfile::NamedTempFile;

fn csv(lines: &[&str]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    for line in lines {
        writeln!(file, "{line}")?;
    }
    file.flush()?;
    Ok(file)
}

#[test]
fn test_guntur_row_totals() -> Result<()> {
    let updates = csv(&[
        "date,state,district,pincode,bio_age_5_17,bio_age_17_",
        "15-01-2025,Andhra Pradesh,Guntur,522001,8,15",
    ])?;
    let enrollments = csv(&[
        "date,state,district,pincode,age_0_5,age_5_17,age_18_greater",
        "15-01-2025,Andhra Pradesh,Guntur,522001,5,10,20",
    ])?;

    let table = load_merged(updates.path(), enrollments.path(), &DistrictNormalizer::default())?;
    assert_eq!(table.len(), 1);

    let row = &table.records()[0];
    assert_eq!(row.total_enrolment, 35.0);
    assert_eq!(row.total_biometric, 23.0);
    assert_eq!(row.day_of_week(), "Wednesday");
    Ok(())
}

#[test]
fn test_header_only_tables_merge_to_nothing() -> Result<()> {
    let updates = csv(&["date,state,district,pincode,a,b"])?;
    let enrollments = csv(&["date,state,district,pincode,a,b,c"])?;

    let table = load_merged(updates.path(), enrollments.path(), &DistrictNormalizer::default())?;
    assert!(table.is_empty());

    let totals: Vec<f64> = table.records().iter().map(|r| r.total_biometric).collect();
    assert!(assign_crowd_levels(&totals).distribution().is_empty());
    Ok(())
}

#[test]
fn test_preset_normalises_before_join() -> Result<()> {
    let updates = csv(&[
        "date,state,district,pincode,a,b",
        "01-03-2025,Andhra Pradesh,Anantapur,515001,1,1",
        "01-03-2025,Andhra Pradesh,Hyderabad,500001,9,9",
    ])?;
    let enrollments = csv(&[
        "date,state,district,pincode,a,b,c",
        "01-03-2025,Andhra Pradesh,Ananthapur,515001,2,2,2",
    ])?;

    let table = load_merged(
        updates.path(),
        enrollments.path(),
        &DistrictNormalizer::andhra_pradesh(),
    )?;
    assert_eq!(table.len(), 1);
    assert_eq!(table.districts(), vec!["Ananthapuramu"]);
    assert_eq!(table.records()[0].total_enrolment, 6.0);
    Ok(())
}

#[test]
fn test_unseen_district_still_predicts() -> Result<()> {
    let training: Vec<FeatureRecord> = ["Guntur", "Krishna", "Prakasam"]
        .iter()
        .map(|d| FeatureRecord::new(2025, 1, 15, "Wednesday", *d, AgeCounts::default()))
        .collect();
    let schema = FeatureSchema::from_training_rows(&training);
    let biometric_idx = schema.index_of("total_biometric").unwrap() as i32;

    let tree = |low: i64, high: i64| {
        vec![Tree::new(
            vec![
                Node::internal(0, biometric_idx, 20 * SCALE, 1, 2),
                Node::leaf(1, low),
                Node::leaf(2, high),
            ],
            SCALE,
        )]
    };
    let classifier = GbdtClassifier::new(
        schema.len(),
        vec![0, 0, 0],
        vec![tree(SCALE, -SCALE), tree(0, 0), tree(-SCALE, SCALE)],
    );
    let artifacts = ModelArtifacts::new(classifier, schema)?;

    let query = FeatureRecord::new(
        2026,
        1,
        15,
        "Wednesday",
        "Atlantis",
        AgeCounts {
            age_0_5: 5.0,
            age_5_17: 10.0,
            age_18_plus: 20.0,
            bio_age_5_17: 8.0,
            bio_age_18_plus: 15.0,
        },
    );
    let result = artifacts.predict_record(&query)?;

    assert!(!result.district_in_training);
    assert_eq!(result.prediction.level, CrowdLevel::High);
    let sum: f64 = result.prediction.probabilities.as_array().iter().sum();
    assert!((sum - 1.0).abs() < 1e-9);
    Ok(())
}
