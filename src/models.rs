use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ImportError;

/// Menstrual cycle phases in their fixed cyclic order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    Menstrual,
    Follicular,
    Ovulation,
    Luteal,
}

impl PhaseKind {
    /// All phases, starting from the cycle anchor
    pub const ALL: [PhaseKind; 4] = [
        PhaseKind::Menstrual,
        PhaseKind::Follicular,
        PhaseKind::Ovulation,
        PhaseKind::Luteal,
    ];

    /// Zero-based position within a cycle
    pub fn ordinal(&self) -> usize {
        match self {
            PhaseKind::Menstrual => 0,
            PhaseKind::Follicular => 1,
            PhaseKind::Ovulation => 2,
            PhaseKind::Luteal => 3,
        }
    }

    /// Following phase, wrapping from Luteal back to Menstrual
    pub fn next(&self) -> PhaseKind {
        Self::ALL[(self.ordinal() + 1) % Self::ALL.len()]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Menstrual => "menstrual",
            PhaseKind::Follicular => "follicular",
            PhaseKind::Ovulation => "ovulation",
            PhaseKind::Luteal => "luteal",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PhaseKind::Menstrual => "Menstrual",
            PhaseKind::Follicular => "Follicular",
            PhaseKind::Ovulation => "Ovulation",
            PhaseKind::Luteal => "Luteal",
        };
        write!(f, "{}", label)
    }
}

impl FromStr for PhaseKind {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "menstrual" | "menstruation" | "period" => Ok(PhaseKind::Menstrual),
            "follicular" => Ok(PhaseKind::Follicular),
            "ovulation" | "ovulatory" => Ok(PhaseKind::Ovulation),
            "luteal" => Ok(PhaseKind::Luteal),
            _ => Err(ImportError::UnknownPhase(s.to_string())),
        }
    }
}

/// One observed or predicted occurrence of a phase within a cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseInterval {
    /// Groups the phases of one biological cycle
    pub cycle_id: String,

    pub phase: PhaseKind,

    /// First day of the phase (inclusive)
    pub start_date: NaiveDate,

    /// Last day of the phase (inclusive)
    pub end_date: NaiveDate,

    /// True for forecast intervals, false for recorded history
    pub is_prediction: bool,

    /// Percentage in 0..=100, only meaningful for predictions
    pub confidence: u8,
}

impl PhaseInterval {
    /// Create a recorded (non-predicted) interval
    pub fn observed(
        cycle_id: impl Into<String>,
        phase: PhaseKind,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        PhaseInterval {
            cycle_id: cycle_id.into(),
            phase,
            start_date,
            end_date,
            is_prediction: false,
            confidence: 0,
        }
    }

    /// Check if a date falls within this interval, both ends inclusive
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Number of calendar days covered
    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    /// Day following the last day of this interval
    pub fn next_day(&self) -> NaiveDate {
        self.end_date + Duration::days(1)
    }
}

/// Day counts per phase for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDurations {
    pub menstrual: u32,
    pub follicular: u32,
    pub ovulation: u32,
    pub luteal: u32,
}

impl PhaseDurations {
    pub fn new(menstrual: u32, follicular: u32, ovulation: u32, luteal: u32) -> Self {
        PhaseDurations {
            menstrual,
            follicular,
            ovulation,
            luteal,
        }
    }

    /// Total days across all phases
    pub fn total(&self) -> u32 {
        self.menstrual + self.follicular + self.ovulation + self.luteal
    }

    pub fn get(&self, phase: PhaseKind) -> u32 {
        match phase {
            PhaseKind::Menstrual => self.menstrual,
            PhaseKind::Follicular => self.follicular,
            PhaseKind::Ovulation => self.ovulation,
            PhaseKind::Luteal => self.luteal,
        }
    }
}

impl Default for PhaseDurations {
    /// Canonical 28-day decomposition
    fn default() -> Self {
        PhaseDurations::new(5, 9, 2, 12)
    }
}

impl FromStr for PhaseDurations {
    type Err = String;

    /// Parse `menstrual,follicular,ovulation,luteal`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("Invalid phase durations '{}': {}", s, e))?;

        match parts.as_slice() {
            [m, f, o, l] => Ok(PhaseDurations::new(*m, *f, *o, *l)),
            _ => Err(format!(
                "Expected four comma-separated durations, got {}",
                parts.len()
            )),
        }
    }
}

/// Inclusive calendar window; open ends are unbounded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        DateRange { start, end }
    }

    /// Window without bounds
    pub fn unbounded() -> Self {
        DateRange::default()
    }

    /// Check if a date falls within this range
    pub fn contains(&self, date: &NaiveDate) -> bool {
        let after_start = self.start.map_or(true, |start| date >= &start);
        let before_end = self.end.map_or(true, |end| date <= &end);
        after_start && before_end
    }

    /// Check if an interval shares at least one day with this range
    pub fn overlaps(&self, interval: &PhaseInterval) -> bool {
        let after_start = self.start.map_or(true, |start| interval.end_date >= start);
        let before_end = self.end.map_or(true, |end| interval.start_date <= end);
        after_start && before_end
    }
}

/// Cycle state derived from a history index for one reference date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleHistorySnapshot {
    /// Date the snapshot was resolved for
    pub reference_date: NaiveDate,

    /// False when no interval contained the reference date and defaults were used
    pub matched: bool,

    /// 1-based day within the current cycle
    pub current_day: u32,

    pub current_phase: PhaseKind,

    /// Average anchor-to-anchor span in days
    pub cycle_length: u32,

    /// Earliest menstrual start strictly after the reference date
    pub next_anchor: Option<NaiveDate>,
}

impl CycleHistorySnapshot {
    /// Days from the reference date to the next anchor
    pub fn days_until_next_anchor(&self) -> Option<i64> {
        self.next_anchor
            .map(|anchor| (anchor - self.reference_date).num_days())
    }
}
