use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::ImportError;
use crate::models::{DateRange, PhaseInterval, PhaseKind};

pub mod csv;
pub mod json;

/// Supplier of recorded phase intervals for a date window
pub trait PhaseSource {
    /// Load intervals overlapping the window
    fn load(&self, window: &DateRange) -> Result<Vec<PhaseInterval>>;
}

/// Phase record as delivered by external suppliers.
///
/// Accepts both snake_case and camelCase field names. A missing end date
/// means a single-day phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    #[serde(alias = "cycleId")]
    pub cycle_id: String,

    pub phase: String,

    #[serde(alias = "startDate")]
    pub start_date: String,

    #[serde(default, alias = "endDate")]
    pub end_date: Option<String>,

    #[serde(default, alias = "isPrediction")]
    pub is_prediction: Option<bool>,

    #[serde(default)]
    pub confidence: Option<u8>,
}

impl PhaseRecord {
    /// Convert into a typed interval
    pub fn into_interval(self) -> Result<PhaseInterval, ImportError> {
        let phase: PhaseKind = self.phase.parse()?;
        let start_date = parse_calendar_day(&self.start_date)?;
        let end_date = match self.end_date.as_deref().map(str::trim) {
            Some(end) if !end.is_empty() => parse_calendar_day(end)?,
            _ => start_date,
        };

        Ok(PhaseInterval {
            cycle_id: self.cycle_id,
            phase,
            start_date,
            end_date,
            is_prediction: self.is_prediction.unwrap_or(false),
            confidence: self.confidence.unwrap_or(0),
        })
    }
}

/// Normalize date or timestamp text to a calendar day, dropping any time of day
pub fn parse_calendar_day(text: &str) -> Result<NaiveDate, ImportError> {
    let text = text.trim();

    let date_formats = ["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"];
    for format in &date_formats {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Ok(date);
        }
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Ok(timestamp.date_naive());
    }

    let datetime_formats = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];
    for format in &datetime_formats {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(datetime.date());
        }
    }

    Err(ImportError::InvalidDate(text.to_string()))
}

/// Trait for importing phase records from different file formats
pub trait ImportFormat {
    /// Check if this importer can handle the given file
    fn can_import(&self, file_path: &Path) -> bool;

    /// Import phase intervals from the file
    fn import_file(&self, file_path: &Path) -> Result<Vec<PhaseInterval>>;

    /// Get the format name for this importer
    fn get_format_name(&self) -> &'static str;
}

/// Manager for coordinating different import formats
pub struct ImportManager {
    importers: Vec<Box<dyn ImportFormat>>,
}

impl ImportManager {
    /// Create a new import manager with all available importers
    pub fn new() -> Self {
        let importers: Vec<Box<dyn ImportFormat>> = vec![
            Box::new(csv::CsvImporter::new()),
            Box::new(json::JsonImporter::new()),
        ];

        Self { importers }
    }

    /// Import a single file, auto-detecting the format
    pub fn import_file(&self, file_path: &Path) -> Result<Vec<PhaseInterval>> {
        for importer in &self.importers {
            if importer.can_import(file_path) {
                info!(
                    file = %file_path.display(),
                    format = importer.get_format_name(),
                    "Importing phase records"
                );
                return importer.import_file(file_path);
            }
        }

        let extension = file_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        Err(ImportError::UnsupportedFormat { format: extension })
            .with_context(|| format!("No importer found for file: {}", file_path.display()))
    }

    /// Import all files from a directory.
    ///
    /// A file that fails to import does not stop the others; it is listed
    /// in [`DirectoryImport::failed`].
    pub fn import_directory(&self, dir_path: &Path) -> Result<DirectoryImport> {
        let mut result = DirectoryImport::default();

        let files = self.collect_importable_files(dir_path)?;

        if files.is_empty() {
            info!(dir = %dir_path.display(), "No importable files found");
            return Ok(result);
        }

        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})")?
                .progress_chars("#>-"),
        );

        for file_path in files {
            let name = file_path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string();
            pb.set_message(format!("Processing {}", name));

            match self.import_file(&file_path) {
                Ok(mut intervals) => {
                    info!(file = %name, count = intervals.len(), "Imported phase records");
                    result.intervals.append(&mut intervals);
                }
                Err(e) => {
                    warn!(file = %name, error = %e, "Failed to import file");
                    result.failed.push(file_path);
                }
            }

            pb.inc(1);
        }

        pb.finish_with_message("Import complete");
        Ok(result)
    }

    /// Collect all files that can be imported from a directory
    fn collect_importable_files(&self, dir_path: &Path) -> Result<Vec<PathBuf>> {
        if !dir_path.is_dir() {
            anyhow::bail!("Path is not a directory: {}", dir_path.display());
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir_path)? {
            let path = entry?.path();
            if path.is_file() && self.can_import_file(&path) {
                files.push(path);
            }
        }

        // Directory order is platform dependent
        files.sort();
        Ok(files)
    }

    /// Check if this manager can import a given file
    pub fn can_import_file(&self, file_path: &Path) -> bool {
        self.importers
            .iter()
            .any(|importer| importer.can_import(file_path))
    }
}

impl Default for ImportManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of importing a directory
#[derive(Debug, Default)]
pub struct DirectoryImport {
    /// Intervals from every file that imported cleanly
    pub intervals: Vec<PhaseInterval>,

    /// Files that could not be imported
    pub failed: Vec<PathBuf>,
}

/// File or directory backed phase source.
///
/// Loads are all-or-nothing: a directory with an unreadable file is an
/// error rather than partial history.
pub struct FileSource {
    path: PathBuf,
    manager: ImportManager,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSource {
            path: path.into(),
            manager: ImportManager::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PhaseSource for FileSource {
    fn load(&self, window: &DateRange) -> Result<Vec<PhaseInterval>> {
        let intervals = if self.path.is_dir() {
            let imported = self.manager.import_directory(&self.path)?;
            if !imported.failed.is_empty() {
                let names: Vec<String> = imported
                    .failed
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect();
                anyhow::bail!(
                    "{} of the history files in {} could not be imported: {}",
                    names.len(),
                    self.path.display(),
                    names.join(", ")
                );
            }
            imported.intervals
        } else {
            self.manager.import_file(&self.path)?
        };

        // Cycles touching the window are kept whole so their anchor survives
        let cycles_in_window: HashSet<String> = intervals
            .iter()
            .filter(|interval| window.overlaps(interval))
            .map(|interval| interval.cycle_id.clone())
            .collect();

        Ok(intervals
            .into_iter()
            .filter(|interval| cycles_in_window.contains(&interval.cycle_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, Builder};

    fn record(end_date: Option<&str>) -> PhaseRecord {
        PhaseRecord {
            cycle_id: "c1".to_string(),
            phase: "Period".to_string(),
            start_date: "2024-01-01".to_string(),
            end_date: end_date.map(str::to_string),
            is_prediction: None,
            confidence: None,
        }
    }

    #[test]
    fn test_missing_end_date_is_single_day() {
        let interval = record(None).into_interval().unwrap();
        assert_eq!(interval.phase, PhaseKind::Menstrual);
        assert_eq!(interval.start_date, interval.end_date);
        assert!(!interval.is_prediction);

        let blank = record(Some("  ")).into_interval().unwrap();
        assert_eq!(blank.end_date, blank.start_date);
    }

    #[test]
    fn test_record_with_end_date() {
        let interval = record(Some("2024-01-05")).into_interval().unwrap();
        assert_eq!(interval.duration_days(), 5);
    }

    #[test]
    fn test_parse_calendar_day_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(parse_calendar_day("2024-03-09").unwrap(), expected);
        assert_eq!(parse_calendar_day("2024/03/09").unwrap(), expected);
        assert_eq!(parse_calendar_day("09.03.2024").unwrap(), expected);
        assert_eq!(parse_calendar_day("2024-03-09T22:15:00Z").unwrap(), expected);
        assert_eq!(parse_calendar_day("2024-03-09 08:00:00").unwrap(), expected);
        assert!(matches!(
            parse_calendar_day("next tuesday"),
            Err(ImportError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        let manager = ImportManager::new();
        let result = manager.import_file(Path::new("history.xml"));
        assert!(result.is_err());
        assert!(!manager.can_import_file(Path::new("history.xml")));
    }

    #[test]
    fn test_file_source_filters_window() {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "cycle_id,phase,start_date,end_date").unwrap();
        writeln!(file, "a,menstrual,2024-01-01,2024-01-05").unwrap();
        writeln!(file, "b,menstrual,2024-02-01,2024-02-05").unwrap();
        file.flush().unwrap();

        let source = FileSource::new(file.path());
        let window = DateRange::new(NaiveDate::from_ymd_opt(2024, 1, 20), None);
        let intervals = source.load(&window).unwrap();

        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].cycle_id, "b");
    }

    #[test]
    fn test_import_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.csv"),
            "cycle_id,phase,start_date,end_date\na,menstrual,2024-01-01,2024-01-05\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b.json"),
            r#"[{"cycleId": "b", "phase": "luteal", "startDate": "2024-01-17", "endDate": "2024-01-28"}]"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let imported = ImportManager::new().import_directory(dir.path()).unwrap();
        assert_eq!(imported.intervals.len(), 2);
        assert!(imported.failed.is_empty());

        let source = FileSource::new(dir.path());
        assert_eq!(source.load(&DateRange::unbounded()).unwrap().len(), 2);
    }

    #[test]
    fn test_file_source_keeps_cycles_whole() {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "cycle_id,phase,start_date,end_date").unwrap();
        writeln!(file, "jan,menstrual,2024-01-01,2024-01-05").unwrap();
        writeln!(file, "jan,follicular,2024-01-06,2024-01-14").unwrap();
        writeln!(file, "jan,ovulation,2024-01-15,2024-01-16").unwrap();
        writeln!(file, "jan,luteal,2024-01-17,2024-01-28").unwrap();
        writeln!(file, "old,menstrual,2023-12-04,2023-12-08").unwrap();
        file.flush().unwrap();

        let window = DateRange::new(NaiveDate::from_ymd_opt(2024, 1, 10), None);
        let intervals = FileSource::new(file.path()).load(&window).unwrap();

        // Menstrual lies before the window but belongs to a cycle inside it
        assert_eq!(intervals.len(), 4);
        assert!(intervals.iter().all(|i| i.cycle_id == "jan"));
        assert!(intervals.iter().any(|i| i.phase == PhaseKind::Menstrual));
    }

    #[test]
    fn test_directory_with_broken_file() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.csv"),
            "cycle_id,phase,start_date,end_date\na,menstrual,2024-01-01,2024-01-05\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("b.json"), "{not json").unwrap();

        let imported = ImportManager::new().import_directory(dir.path()).unwrap();
        assert_eq!(imported.intervals.len(), 1);
        assert_eq!(imported.failed, vec![dir.path().join("b.json")]);

        let err = FileSource::new(dir.path())
            .load(&DateRange::unbounded())
            .unwrap_err();
        assert!(err.to_string().contains("b.json"));
    }
}
