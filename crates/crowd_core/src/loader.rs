//! Table Loader
//!
//! Reads the two raw sources. Columns are positional: the first is always
//! the date, followed by state, district and pincode, then a fixed run of
//! numeric counts. Header names are ignored.

use crate::dates::parse_date;
use crate::errors::LoaderError;
use crate::records::{RawEnrollmentRecord, RawUpdateRecord};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::path::Path;
use tracing::{debug, instrument};

/// Positional column count of the biometric-update table.
pub const UPDATE_COLUMNS: usize = 6;

/// Positional column count of the enrollment table.
pub const ENROLLMENT_COLUMNS: usize = 7;

const UPDATE_COUNT_NAMES: [&str; 2] = ["bio_age_5_17", "bio_age_18_plus"];
const ENROLLMENT_COUNT_NAMES: [&str; 3] = ["age_0_5", "age_5_17", "age_18_plus"];

/// Shared prefix of both row layouts.
struct KeyCells {
    date: chrono::NaiveDate,
    state: String,
    district: String,
    pincode: String,
}

/// Read the biometric-update table.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_updates<P: AsRef<Path>>(path: P) -> Result<Vec<RawUpdateRecord>, LoaderError> {
    let path = path.as_ref();
    let rows = read_rows(path, UPDATE_COLUMNS)?;

    let mut records = Vec::with_capacity(rows.len());
    for (line, row) in rows {
        let key = key_cells(path, line, &row)?;
        let counts = count_cells(path, line, &row, &UPDATE_COUNT_NAMES)?;
        records.push(RawUpdateRecord {
            date: key.date,
            state: key.state,
            district: key.district,
            pincode: key.pincode,
            bio_age_5_17: counts[0],
            bio_age_18_plus: counts[1],
        });
    }

    debug!("Loaded {} update rows", records.len());
    Ok(records)
}

/// Read the enrollment table.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_enrollments<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<RawEnrollmentRecord>, LoaderError> {
    let path = path.as_ref();
    let rows = read_rows(path, ENROLLMENT_COLUMNS)?;

    let mut records = Vec::with_capacity(rows.len());
    for (line, row) in rows {
        let key = key_cells(path, line, &row)?;
        let counts = count_cells(path, line, &row, &ENROLLMENT_COUNT_NAMES)?;
        records.push(RawEnrollmentRecord {
            date: key.date,
            state: key.state,
            district: key.district,
            pincode: key.pincode,
            age_0_5: counts[0],
            age_5_17: counts[1],
            age_18_plus: counts[2],
        });
    }

    debug!("Loaded {} enrollment rows", records.len());
    Ok(records)
}

/// Read both tables.
pub fn load_tables<P, Q>(
    update_path: P,
    enrollment_path: Q,
) -> Result<(Vec<RawUpdateRecord>, Vec<RawEnrollmentRecord>), LoaderError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    Ok((load_updates(update_path)?, load_enrollments(enrollment_path)?))
}

/// Read every data row, checking the positional column count.
fn read_rows(path: &Path, expected: usize) -> Result<Vec<(u64, StringRecord)>, LoaderError> {
    let file = std::fs::File::open(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(file);

    let mut rows = Vec::new();
    for result in reader.records() {
        let row = result.map_err(|source| LoaderError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        if row.iter().all(str::is_empty) {
            continue;
        }
        if row.len() != expected {
            return Err(LoaderError::ColumnCount {
                path: path.to_path_buf(),
                line,
                expected,
                found: row.len(),
            });
        }
        rows.push((line, row));
    }

    Ok(rows)
}

fn key_cells(path: &Path, line: u64, row: &StringRecord) -> Result<KeyCells, LoaderError> {
    let date = parse_date(&row[0]).map_err(|source| LoaderError::InvalidDate {
        path: path.to_path_buf(),
        line,
        source,
    })?;

    Ok(KeyCells {
        date,
        state: row[1].to_string(),
        district: row[2].to_string(),
        pincode: row[3].to_string(),
    })
}

/// Parse the trailing numeric cells. Empty cells count as zero.
fn count_cells<const N: usize>(
    path: &Path,
    line: u64,
    row: &StringRecord,
    names: &[&'static str; N],
) -> Result<[f64; N], LoaderError> {
    let mut counts = [0.0; N];
    for (i, name) in names.iter().enumerate() {
        let cell = &row[4 + i];
        counts[i] = parse_count(cell).ok_or_else(|| LoaderError::InvalidNumber {
            path: path.to_path_buf(),
            line,
            column: *name,
            value: cell.to_string(),
        })?;
    }
    Ok(counts)
}

fn parse_count(cell: &str) -> Option<f64> {
    if cell.is_empty() {
        return Some(0.0);
    }
    cell.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_updates_positional() {
        let file = write_csv(&[
            "date,state,district,pincode,bio_age_5_17,bio_age_17_",
            "01-03-2025,Andhra Pradesh,Guntur,522001,8,15",
            "2025-03-02,Andhra Pradesh,Krishna,521001,,4",
        ]);

        let rows = load_updates(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].district, "Guntur");
        assert_eq!(rows[0].bio_age_18_plus, 15.0);
        assert_eq!(rows[1].bio_age_5_17, 0.0);
        assert_eq!(rows[1].date.to_string(), "2025-03-02");
    }

    #[test]
    fn test_load_enrollments_quoted_fields() {
        let file = write_csv(&[
            "a,b,c,d,e,f,g",
            "15-01-2025,\"Andhra Pradesh\",\"Y. S. R\",516001,5,10,20",
        ]);

        let rows = load_enrollments(file.path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].district, "Y. S. R");
        assert_eq!(rows[0].age_0_5 + rows[0].age_5_17 + rows[0].age_18_plus, 35.0);
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let file = write_csv(&["date,state,district,pincode,x,y"]);
        assert!(load_updates(file.path()).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_column_count_is_reported() {
        let file = write_csv(&[
            "date,state,district,pincode,x,y",
            "01-03-2025,AP,Guntur,522001,8",
        ]);

        match load_updates(file.path()) {
            Err(LoaderError::ColumnCount { expected, found, line, .. }) => {
                assert_eq!(expected, 6);
                assert_eq!(found, 5);
                assert_eq!(line, 2);
            }
            other => panic!("expected column count error, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_count_is_rejected() {
        let file = write_csv(&[
            "date,state,district,pincode,x,y",
            "01-03-2025,AP,Guntur,522001,-1,2",
        ]);

        match load_updates(file.path()) {
            Err(LoaderError::InvalidNumber { column, .. }) => assert_eq!(column, "bio_age_5_17"),
            other => panic!("expected invalid number, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_date_is_reported() {
        let file = write_csv(&[
            "date,state,district,pincode,x,y",
            "someday,AP,Guntur,522001,1,2",
        ]);
        assert!(matches!(
            load_updates(file.path()),
            Err(LoaderError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_updates("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, LoaderError::Io { .. }));
        assert!(err.to_string().contains("not/here.csv"));
    }
}
