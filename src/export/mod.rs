use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::history::{CycleHistoryIndex, CycleStats};
use crate::models::{CycleHistorySnapshot, PhaseInterval};

pub mod csv;
pub mod json;
pub mod text;

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Csv,
    Json,
    Text,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Result<Self, ExportError> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "text" | "txt" => Ok(ExportFormat::Text),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }

    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| Self::from_str(ext).ok())
    }
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<::csv::Error> for ExportError {
    fn from(err: ::csv::Error) -> Self {
        ExportError::SerializationError(err.to_string())
    }
}

/// Snapshot, statistics and forecast bundled for one reference date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub generated_at: DateTime<Utc>,
    pub snapshot: CycleHistorySnapshot,
    pub stats: CycleStats,
    pub forecast: Vec<PhaseInterval>,
}

impl CycleReport {
    pub fn new(
        index: &CycleHistoryIndex,
        snapshot: CycleHistorySnapshot,
        forecast: Vec<PhaseInterval>,
    ) -> Self {
        CycleReport {
            generated_at: Utc::now(),
            snapshot,
            stats: index.stats(),
            forecast,
        }
    }
}

/// Write intervals to a file in the requested format
pub fn export_intervals<P: AsRef<Path>>(
    intervals: &[PhaseInterval],
    format: ExportFormat,
    output_path: P,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Csv => csv::export_intervals(intervals, output_path),
        ExportFormat::Json => json::export_json(&intervals, output_path),
        ExportFormat::Text => {
            std::fs::write(output_path, text::render_forecast(intervals))?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PhaseDurations;
    use crate::prediction::CyclePredictor;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    #[test]
    fn test_format_parsing() {
        assert_eq!(ExportFormat::from_str("CSV").unwrap(), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_str("txt").unwrap(), ExportFormat::Text);
        assert!(ExportFormat::from_str("pdf").is_err());
        assert_eq!(
            ExportFormat::from_path(Path::new("out/forecast.json")),
            Some(ExportFormat::Json)
        );
        assert_eq!(ExportFormat::from_path(Path::new("forecast")), None);
    }

    #[test]
    fn test_export_each_format() {
        let intervals = CyclePredictor::new()
            .forecast(
                NaiveDate::from_ymd_opt(2024, 1, 29).unwrap(),
                28,
                &PhaseDurations::default(),
                1,
                80,
            )
            .unwrap();
        let dir = tempdir().unwrap();

        for (format, name) in [
            (ExportFormat::Csv, "forecast.csv"),
            (ExportFormat::Json, "forecast.json"),
            (ExportFormat::Text, "forecast.txt"),
        ] {
            let path = dir.path().join(name);
            export_intervals(&intervals, format, &path).unwrap();
            let content = std::fs::read_to_string(&path).unwrap();
            assert!(content.contains("2024-01-29"), "{} export missing anchor", name);
        }
    }
}
