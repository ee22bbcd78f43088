use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::ImportError;
use crate::import::{ImportFormat, PhaseRecord};
use crate::models::PhaseInterval;

/// CSV importer with flexible column mapping
pub struct CsvImporter {
    column_mapping: HashMap<String, String>,
}

impl CsvImporter {
    pub fn new() -> Self {
        let mut column_mapping = HashMap::new();

        // Common column name variations
        Self::add_mapping(
            &mut column_mapping,
            "cycle_id",
            &["cycle_id", "cycleid", "cycle", "cycle_uuid"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "phase",
            &["phase", "phase_type", "phase_name", "type"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "start_date",
            &["start_date", "startdate", "start", "from", "begin"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "end_date",
            &["end_date", "enddate", "end", "to", "until"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "is_prediction",
            &["is_prediction", "isprediction", "prediction", "predicted"],
        );
        Self::add_mapping(&mut column_mapping, "confidence", &["confidence"]);

        Self { column_mapping }
    }

    fn add_mapping(mapping: &mut HashMap<String, String>, standard: &str, variations: &[&str]) {
        for variation in variations {
            mapping.insert(variation.to_lowercase(), standard.to_string());
        }
    }

    fn normalize_column_name(&self, name: &str) -> String {
        let normalized = name.trim().to_lowercase().replace([' ', '-'], "_");

        self.column_mapping
            .get(&normalized)
            .cloned()
            .unwrap_or(normalized)
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => None,
        }
    }

    /// Build a record from one CSV row using the resolved column positions
    fn record_from_row(
        columns: &HashMap<String, usize>,
        row: &StringRecord,
    ) -> Result<PhaseRecord, ImportError> {
        let cell = |name: &str| -> Option<String> {
            columns
                .get(name)
                .and_then(|idx| row.get(*idx))
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        let required = |name: &str| {
            cell(name).ok_or_else(|| ImportError::MissingField {
                field: name.to_string(),
            })
        };

        let confidence = match cell("confidence") {
            Some(value) => Some(value.parse::<u8>().map_err(|_| ImportError::InvalidValue {
                field: "confidence".to_string(),
                value: value.clone(),
            })?),
            None => None,
        };

        Ok(PhaseRecord {
            cycle_id: required("cycle_id")?,
            phase: required("phase")?,
            start_date: required("start_date")?,
            end_date: cell("end_date"),
            is_prediction: cell("is_prediction").and_then(|v| Self::parse_bool(&v)),
            confidence,
        })
    }
}

impl Default for CsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for CsvImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false)
    }

    fn import_file(&self, file_path: &Path) -> Result<Vec<PhaseInterval>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_path(file_path)
            .with_context(|| format!("Failed to open CSV file: {}", file_path.display()))?;

        let headers = reader.headers()?.clone();
        let columns: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (self.normalize_column_name(name), idx))
            .collect();

        for required in ["cycle_id", "phase", "start_date"] {
            if !columns.contains_key(required) {
                return Err(ImportError::MissingField {
                    field: required.to_string(),
                })
                .with_context(|| format!("CSV header of {}", file_path.display()));
            }
        }

        let mut intervals = Vec::new();
        for (row_idx, row) in reader.records().enumerate() {
            // Header is line 1
            let line = row_idx + 2;
            let row = row.map_err(|e| ImportError::ParseError {
                path: file_path.to_path_buf(),
                reason: format!("line {}: {}", line, e),
            })?;

            if row.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }

            let interval = Self::record_from_row(&columns, &row)
                .and_then(PhaseRecord::into_interval)
                .map_err(|e| ImportError::ParseError {
                    path: file_path.to_path_buf(),
                    reason: format!("line {}: {}", line, e),
                })?;
            intervals.push(interval);
        }

        debug!(
            file = %file_path.display(),
            count = intervals.len(),
            "Parsed CSV phase records"
        );

        Ok(intervals)
    }

    fn get_format_name(&self) -> &'static str {
        "CSV"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PhaseKind;
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::Builder;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_can_import() {
        let importer = CsvImporter::new();
        assert!(importer.can_import(Path::new("history.csv")));
        assert!(importer.can_import(Path::new("HISTORY.CSV")));
        assert!(!importer.can_import(Path::new("history.json")));
    }

    #[test]
    fn test_import_with_header_aliases() {
        let file = write_csv(
            "Cycle,Phase Type,Start,End,Predicted,Confidence\n\
             jan,Menstrual,2024-01-01,2024-01-05,no,\n\
             jan,follicular,2024-01-06,2024-01-14,,\n\
             feb,menstrual,2024-01-29,,yes,70\n",
        );

        let intervals = CsvImporter::new().import_file(file.path()).unwrap();

        assert_eq!(intervals.len(), 3);
        assert_eq!(intervals[0].phase, PhaseKind::Menstrual);
        assert_eq!(intervals[1].phase, PhaseKind::Follicular);
        assert_eq!(intervals[1].end_date, NaiveDate::from_ymd_opt(2024, 1, 14).unwrap());

        // Missing end date collapses to the start date
        assert_eq!(intervals[2].start_date, intervals[2].end_date);
        assert!(intervals[2].is_prediction);
        assert_eq!(intervals[2].confidence, 70);
    }

    #[test]
    fn test_missing_required_column() {
        let file = write_csv("cycle_id,start_date\njan,2024-01-01\n");
        let result = CsvImporter::new().import_file(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_phase_reports_line() {
        let file = write_csv("cycle_id,phase,start_date\njan,menstrual,2024-01-01\njan,spring,2024-01-06\n");
        let err = CsvImporter::new().import_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_bad_confidence_is_invalid_value() {
        let columns: HashMap<String, usize> = ["cycle_id", "phase", "start_date", "confidence"]
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.to_string(), idx))
            .collect();
        let row = StringRecord::from(vec!["jan", "luteal", "2024-01-17", "150"]);

        match CsvImporter::record_from_row(&columns, &row) {
            Err(ImportError::InvalidValue { field, value }) => {
                assert_eq!(field, "confidence");
                assert_eq!(value, "150");
            }
            other => panic!("expected invalid confidence, got {:?}", other),
        }

        let file = write_csv("cycle_id,phase,start_date,confidence\njan,luteal,2024-01-17,high\n");
        let err = CsvImporter::new().import_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid value 'high' for confidence"));
    }

    #[test]
    fn test_blank_rows_skipped() {
        let file = write_csv("cycle_id,phase,start_date\n,,\njan,luteal,2024-01-17\n");
        let intervals = CsvImporter::new().import_file(file.path()).unwrap();
        assert_eq!(intervals.len(), 1);
    }
}
