use super::{CycleReport, ExportError};
use crate::history::CycleStats;
use crate::models::{CycleHistorySnapshot, PhaseInterval};
use std::io::{self, Write};
use std::path::Path;

/// Export cycle report to human-readable text format
pub fn export_cycle_report<P: AsRef<Path>>(
    report: &CycleReport,
    output_path: P,
) -> Result<(), ExportError> {
    let mut file = std::fs::File::create(output_path)?;

    writeln!(file, "==================================================")?;
    writeln!(file, "CYCLE REPORT")?;
    writeln!(file, "==================================================")?;
    writeln!(
        file,
        "Generated: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(file)?;

    write_snapshot(&mut file, &report.snapshot)?;
    writeln!(file)?;
    write_stats(&mut file, &report.stats)?;
    writeln!(file)?;
    write_forecast(&mut file, &report.forecast)?;

    Ok(())
}

/// Render the current cycle state as plain text
pub fn render_snapshot(snapshot: &CycleHistorySnapshot) -> String {
    render(|out| write_snapshot(out, snapshot))
}

/// Render forecast intervals as a plain text table
pub fn render_forecast(intervals: &[PhaseInterval]) -> String {
    render(|out| write_forecast(out, intervals))
}

/// Render history statistics as plain text
pub fn render_stats(stats: &CycleStats) -> String {
    render(|out| write_stats(out, stats))
}

fn render<F>(write: F) -> String
where
    F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
{
    let mut buffer = Vec::new();
    // Writes into a Vec<u8> cannot fail
    let _ = write(&mut buffer);
    String::from_utf8_lossy(&buffer).into_owned()
}

fn write_snapshot<W: Write>(out: &mut W, snapshot: &CycleHistorySnapshot) -> io::Result<()> {
    writeln!(out, "CURRENT CYCLE")?;
    writeln!(out, "--------------------------------------------------")?;
    writeln!(out, "Date:           {}", snapshot.reference_date.format("%Y-%m-%d"))?;
    writeln!(out, "Phase:          {}", snapshot.current_phase)?;
    writeln!(out, "Cycle day:      {}", snapshot.current_day)?;
    writeln!(out, "Cycle length:   {} days", snapshot.cycle_length)?;

    match (snapshot.next_anchor, snapshot.days_until_next_anchor()) {
        (Some(anchor), Some(days)) => writeln!(
            out,
            "Next period:    {} (in {} days)",
            anchor.format("%Y-%m-%d"),
            days
        )?,
        _ => writeln!(out, "Next period:    unknown")?,
    }

    if !snapshot.matched {
        writeln!(out, "Note: no recorded phase covers this date, defaults shown")?;
    }

    Ok(())
}

fn write_stats<W: Write>(out: &mut W, stats: &CycleStats) -> io::Result<()> {
    writeln!(out, "HISTORY")?;
    writeln!(out, "--------------------------------------------------")?;
    writeln!(out, "Cycles:               {}", stats.total_cycles)?;
    writeln!(out, "Recorded cycles:      {}", stats.observed_cycles)?;

    let avg = stats
        .avg_cycle_length
        .map(|d| format!("{:.1} days", d))
        .unwrap_or_else(|| "-".to_string());
    writeln!(out, "Average length:       {}", avg)?;

    if let (Some(shortest), Some(longest)) = (stats.shortest_cycle, stats.longest_cycle) {
        writeln!(out, "Range:                {} - {} days", shortest, longest)?;
    }
    if let Some(std_dev) = stats.cycle_length_std_dev {
        writeln!(out, "Std deviation:        {:.2} days", std_dev)?;
    }
    if let Some(menstrual) = stats.avg_menstrual_length {
        writeln!(out, "Average period:       {:.1} days", menstrual)?;
    }
    if let Some(anchor) = stats.last_anchor {
        writeln!(out, "Last period start:    {}", anchor.format("%Y-%m-%d"))?;
    }

    Ok(())
}

fn write_forecast<W: Write>(out: &mut W, intervals: &[PhaseInterval]) -> io::Result<()> {
    writeln!(out, "FORECAST")?;
    writeln!(out, "--------------------------------------------------")?;

    if intervals.is_empty() {
        writeln!(out, "No intervals")?;
        return Ok(());
    }

    writeln!(
        out,
        "{:<28} {:<11} {:<11} {:<11} {:>5} {:>5}",
        "Cycle", "Phase", "Start", "End", "Days", "Conf"
    )?;
    writeln!(out, "{:-<76}", "")?;

    for interval in intervals {
        writeln!(
            out,
            "{:<28} {:<11} {:<11} {:<11} {:>5} {:>4}%",
            interval.cycle_id,
            interval.phase.to_string(),
            interval.start_date.format("%Y-%m-%d").to_string(),
            interval.end_date.format("%Y-%m-%d").to_string(),
            interval.duration_days(),
            interval.confidence
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::CycleHistoryIndex;
    use crate::models::PhaseKind;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn history() -> CycleHistoryIndex {
        CycleHistoryIndex::build(vec![
            PhaseInterval::observed("jan", PhaseKind::Menstrual, date(2024, 1, 1), date(2024, 1, 5)),
            PhaseInterval::observed("jan", PhaseKind::Follicular, date(2024, 1, 6), date(2024, 1, 14)),
            PhaseInterval::observed("feb", PhaseKind::Menstrual, date(2024, 1, 29), date(2024, 2, 2)),
        ])
        .unwrap()
    }

    #[test]
    fn test_render_snapshot() {
        let snapshot = history().resolve(date(2024, 1, 10));
        let text = render_snapshot(&snapshot);

        assert!(text.contains("Phase:          Follicular"));
        assert!(text.contains("Cycle day:      10"));
        assert!(text.contains("Next period:    2024-01-29 (in 19 days)"));
        assert!(!text.contains("defaults shown"));
    }

    #[test]
    fn test_render_unmatched_snapshot() {
        let snapshot = history().resolve(date(2023, 6, 1));
        let text = render_snapshot(&snapshot);
        assert!(text.contains("defaults shown"));
    }

    #[test]
    fn test_render_empty_forecast() {
        assert!(render_forecast(&[]).contains("No intervals"));
    }

    #[test]
    fn test_export_cycle_report() {
        let index = history();
        let snapshot = index.resolve(date(2024, 1, 10));
        let report = CycleReport::new(&index, snapshot, Vec::new());

        let temp_file = tempfile::NamedTempFile::new().unwrap();
        export_cycle_report(&report, temp_file.path()).unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("CYCLE REPORT"));
        assert!(content.contains("Recorded cycles:      2"));
        assert!(content.contains("Average length:       28.0 days"));
    }
}
