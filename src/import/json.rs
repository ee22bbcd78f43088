use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::error::ImportError;
use crate::import::{ImportFormat, PhaseRecord};
use crate::models::PhaseInterval;

/// Accepted document shapes: a bare array or an object wrapping one
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonDocument {
    Records(Vec<PhaseRecord>),
    Wrapped {
        #[serde(alias = "phases", alias = "cycles")]
        intervals: Vec<PhaseRecord>,
    },
}

/// JSON importer for phase records exported by the backend
pub struct JsonImporter;

impl JsonImporter {
    pub fn new() -> Self {
        JsonImporter
    }

    /// Parse phase intervals from JSON text
    pub fn parse_str(content: &str) -> Result<Vec<PhaseInterval>, ImportError> {
        let document: JsonDocument =
            serde_json::from_str(content).map_err(|e| ImportError::ParseError {
                path: "<inline>".into(),
                reason: e.to_string(),
            })?;

        let records = match document {
            JsonDocument::Records(records) => records,
            JsonDocument::Wrapped { intervals } => intervals,
        };

        records
            .into_iter()
            .map(PhaseRecord::into_interval)
            .collect()
    }
}

impl Default for JsonImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for JsonImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
    }

    fn import_file(&self, file_path: &Path) -> Result<Vec<PhaseInterval>> {
        let content = std::fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read JSON file: {}", file_path.display()))?;

        let intervals = Self::parse_str(&content).map_err(|e| match e {
            ImportError::ParseError { reason, .. } => ImportError::ParseError {
                path: file_path.to_path_buf(),
                reason,
            },
            other => other,
        })?;

        debug!(
            file = %file_path.display(),
            count = intervals.len(),
            "Parsed JSON phase records"
        );

        Ok(intervals)
    }

    fn get_format_name(&self) -> &'static str {
        "JSON"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PhaseKind;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_array_with_camel_case() {
        let json = r#"[
            {"cycleId": "c1", "phase": "menstrual", "startDate": "2024-01-01", "endDate": "2024-01-05"},
            {"cycle_id": "c1", "phase": "ovulation", "start_date": "2024-01-15T09:30:00Z"}
        ]"#;

        let intervals = JsonImporter::parse_str(json).unwrap();
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].duration_days(), 5);
        assert_eq!(intervals[1].phase, PhaseKind::Ovulation);
        assert_eq!(
            intervals[1].end_date,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
    }

    #[test]
    fn test_parse_wrapped_document() {
        let json = r#"{"phases": [
            {"cycleId": "c2", "phase": "luteal", "startDate": "2024-02-10", "endDate": "2024-02-20",
             "isPrediction": true, "confidence": 65}
        ]}"#;

        let intervals = JsonImporter::parse_str(json).unwrap();
        assert_eq!(intervals.len(), 1);
        assert!(intervals[0].is_prediction);
        assert_eq!(intervals[0].confidence, 65);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            JsonImporter::parse_str("{not json"),
            Err(ImportError::ParseError { .. })
        ));

        let unknown = r#"[{"cycleId": "c1", "phase": "winter", "startDate": "2024-01-01"}]"#;
        assert!(matches!(
            JsonImporter::parse_str(unknown),
            Err(ImportError::UnknownPhase(_))
        ));
    }

    #[test]
    fn test_import_file_sets_path() {
        let file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        std::fs::write(file.path(), "[]").unwrap();

        let importer = JsonImporter::new();
        assert!(importer.can_import(file.path()));
        assert!(importer.import_file(file.path()).unwrap().is_empty());
    }
}
