use serde::Serialize;
use std::path::Path;

use super::ExportError;
use crate::models::PhaseInterval;

/// One CSV row per interval
#[derive(Debug, Serialize)]
struct IntervalRow<'a> {
    cycle_id: &'a str,
    phase: &'static str,
    start_date: String,
    end_date: String,
    days: i64,
    is_prediction: bool,
    confidence: u8,
}

impl<'a> From<&'a PhaseInterval> for IntervalRow<'a> {
    fn from(interval: &'a PhaseInterval) -> Self {
        IntervalRow {
            cycle_id: &interval.cycle_id,
            phase: interval.phase.as_str(),
            start_date: interval.start_date.format("%Y-%m-%d").to_string(),
            end_date: interval.end_date.format("%Y-%m-%d").to_string(),
            days: interval.duration_days(),
            is_prediction: interval.is_prediction,
            confidence: interval.confidence,
        }
    }
}

/// Export intervals to CSV, in the order given
pub fn export_intervals<P: AsRef<Path>>(
    intervals: &[PhaseInterval],
    output_path: P,
) -> Result<(), ExportError> {
    let mut writer = ::csv::Writer::from_path(output_path)?;

    for interval in intervals {
        writer.serialize(IntervalRow::from(interval))?;
    }

    writer.flush()?;
    Ok(())
}
