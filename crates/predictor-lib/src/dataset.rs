//! CSV loading for the training dataset
//!
//! The file must carry a header row with the columns of [`CSV_COLUMNS`] in
//! that exact order. Quoted fields are accepted; every numeric field must
//! parse to a finite value.

use crate::error::DataLoadError;
use crate::models::{HousingRecord, CSV_COLUMNS};
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Load every record from a training CSV file
pub fn load_records(path: &Path) -> Result<Vec<HousingRecord>, DataLoadError> {
    if !path.exists() {
        return Err(DataLoadError::NotFound(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|source| DataLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = read_records(file)?;
    debug!(path = %path.display(), rows = records.len(), "Loaded training records");
    Ok(records)
}

/// Parse records from any CSV reader
pub fn read_records<R: Read>(reader: R) -> Result<Vec<HousingRecord>, DataLoadError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .quoting(true)
        .flexible(false)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| DataLoadError::InvalidRow {
            row: 0,
            message: format!("unreadable header: {}", e),
        })?
        .clone();

    let found: Vec<String> = headers.iter().map(|h| h.to_ascii_lowercase()).collect();
    if found != CSV_COLUMNS {
        return Err(DataLoadError::SchemaMismatch {
            expected: CSV_COLUMNS.iter().map(|c| c.to_string()).collect(),
            found: headers.iter().map(str::to_string).collect(),
        });
    }

    let mut records = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row_number = idx + 1;
        let raw = row.map_err(|e| DataLoadError::InvalidRow {
            row: row_number,
            message: e.to_string(),
        })?;
        let record: HousingRecord =
            raw.deserialize(None).map_err(|e| DataLoadError::InvalidRow {
                row: row_number,
                message: e.to_string(),
            })?;
        if record.ocean_proximity.is_empty() {
            return Err(DataLoadError::InvalidRow {
                row: row_number,
                message: "ocean_proximity is empty".to_string(),
            });
        }
        if let Some(field) = record.first_non_finite() {
            return Err(DataLoadError::NonFinite {
                row: row_number,
                field,
            });
        }
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const HEADER: &str = "ocean_proximity,longitude,latitude,housing_median_age,total_rooms,total_bedrooms,population,households,median_income,median_house_value";

    #[test]
    fn test_reads_quoted_rows() {
        let csv = format!(
            "{}\n\"NEAR_BAY\",-122.23,37.88,41,880,129,322,126,8.3252,452600\n<1H_OCEAN,-118.0,34.0,20,1500,300,900,280,4.1,250000\n",
            HEADER
        );
        let records = read_records(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].ocean_proximity, "NEAR_BAY");
        assert_eq!(records[0].median_house_value, 452_600.0);
        assert_eq!(records[1].ocean_proximity, "<1H_OCEAN");
    }

    #[test]
    fn test_header_only_yields_no_records() {
        let records = read_records(format!("{}\n", HEADER).as_bytes()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_wrong_header_order() {
        let csv = "longitude,ocean_proximity,latitude,housing_median_age,total_rooms,total_bedrooms,population,households,median_income,median_house_value\n";
        let err = read_records(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DataLoadError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_wrong_column_count() {
        let csv = format!("{}\nINLAND,-121.0,38.0,10,1000,200,500,180,3.5\n", HEADER);
        let err = read_records(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DataLoadError::InvalidRow { row: 1, .. }));
    }

    #[test]
    fn test_missing_numeric_value() {
        let csv = format!("{}\nINLAND,-121.0,38.0,10,1000,,500,180,3.5,90000\n", HEADER);
        let err = read_records(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DataLoadError::InvalidRow { row: 1, .. }));
    }

    #[test]
    fn test_non_finite_value() {
        let csv = format!("{}\nINLAND,-121.0,38.0,10,1000,200,NaN,180,3.5,90000\n", HEADER);
        let err = read_records(csv.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::NonFinite { row: 1, field: "population" }
        ));
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_records(&temp_dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, DataLoadError::NotFound(_)));
    }

    #[test]
    fn test_load_from_disk() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("housing.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        writeln!(file, "ISLAND,-118.3,33.3,52,2359,591,1100,431,2.8333,414700").unwrap();
        drop(file);

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ocean_proximity, "ISLAND");
    }
}
