use chrono::NaiveDate;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use tracing::{debug, trace};

use crate::error::ValidationError;
use crate::models::{CycleHistorySnapshot, PhaseDurations, PhaseInterval, PhaseKind};

/// Cycle length used when fewer than two anchors are known
pub const DEFAULT_CYCLE_LENGTH: u32 = 28;

/// Confidence suggested when there is not enough history to measure regularity
pub const BASELINE_CONFIDENCE: u8 = 50;

/// Summary statistics over the recorded cycles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleStats {
    /// Number of distinct cycles (observed and predicted)
    pub total_cycles: usize,

    /// Cycles with at least one recorded (non-predicted) phase
    pub observed_cycles: usize,

    /// Mean anchor-to-anchor span in days
    pub avg_cycle_length: Option<Decimal>,

    pub shortest_cycle: Option<i64>,

    pub longest_cycle: Option<i64>,

    /// Mean length of recorded menstrual phases in days
    pub avg_menstrual_length: Option<Decimal>,

    /// Sample standard deviation of cycle lengths
    pub cycle_length_std_dev: Option<f64>,

    /// Most recent recorded anchor
    pub last_anchor: Option<NaiveDate>,
}

/// Validated, queryable view over a collection of phase intervals
#[derive(Debug, Clone, PartialEq)]
pub struct CycleHistoryIndex {
    /// Sorted by start date, then phase order, then cycle id
    intervals: Vec<PhaseInterval>,

    /// Anchor (day 1) of each cycle
    anchors: BTreeMap<String, NaiveDate>,

    /// Anchors of cycles with recorded data, ascending
    observed_anchors: Vec<NaiveDate>,
}

impl CycleHistoryIndex {
    /// Validate and index a collection of intervals supplied in any order
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn build<I>(intervals: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = PhaseInterval>,
    {
        let mut intervals: Vec<PhaseInterval> = intervals.into_iter().collect();

        for interval in &intervals {
            if interval.end_date < interval.start_date {
                return Err(ValidationError::EndBeforeStart {
                    cycle_id: interval.cycle_id.clone(),
                    phase: interval.phase,
                    start: interval.start_date,
                    end: interval.end_date,
                });
            }
            if interval.confidence > 100 {
                return Err(ValidationError::InvalidConfidence(interval.confidence as u32));
            }
        }

        intervals.sort_by(|a, b| {
            a.start_date
                .cmp(&b.start_date)
                .then(a.phase.cmp(&b.phase))
                .then_with(|| a.cycle_id.cmp(&b.cycle_id))
        });

        let mut groups: BTreeMap<&str, Vec<&PhaseInterval>> = BTreeMap::new();
        for interval in &intervals {
            groups
                .entry(interval.cycle_id.as_str())
                .or_default()
                .push(interval);
        }

        let mut anchors = BTreeMap::new();
        let mut observed_anchors = Vec::new();

        for (cycle_id, members) in &groups {
            Self::validate_cycle(cycle_id, members)?;

            // Members are in start order, so the first one is the earliest phase
            let anchor = members
                .iter()
                .find(|i| i.phase == PhaseKind::Menstrual)
                .unwrap_or(&members[0])
                .start_date;

            trace!(cycle_id, %anchor, phases = members.len(), "Indexed cycle");

            if members.iter().any(|i| !i.is_prediction) {
                observed_anchors.push(anchor);
            }
            anchors.insert(cycle_id.to_string(), anchor);
        }

        observed_anchors.sort();

        debug!(
            intervals = intervals.len(),
            cycles = anchors.len(),
            observed_cycles = observed_anchors.len(),
            "Built cycle history index"
        );

        Ok(CycleHistoryIndex {
            intervals,
            anchors,
            observed_anchors,
        })
    }

    /// Check that the phases of one cycle do not overlap and follow the cyclic order
    fn validate_cycle(cycle_id: &str, members: &[&PhaseInterval]) -> Result<(), ValidationError> {
        for pair in members.windows(2) {
            let (previous, current) = (pair[0], pair[1]);

            if current.start_date <= previous.end_date {
                return Err(ValidationError::OverlappingIntervals {
                    cycle_id: cycle_id.to_string(),
                    first: previous.phase,
                    second: current.phase,
                    on: current.start_date,
                });
            }

            if current.phase <= previous.phase {
                return Err(ValidationError::PhaseOutOfOrder {
                    cycle_id: cycle_id.to_string(),
                    phase: current.phase,
                    previous: previous.phase,
                    start: current.start_date,
                });
            }
        }

        Ok(())
    }

    /// Resolve the current phase and cycle day for a reference date.
    ///
    /// When no interval contains the date the snapshot falls back to
    /// Menstrual / day 1 with `matched = false`. Recorded intervals win over
    /// predicted ones covering the same day.
    pub fn resolve(&self, reference_date: NaiveDate) -> CycleHistorySnapshot {
        let hit = self
            .intervals
            .iter()
            .filter(|interval| interval.contains(reference_date))
            .min_by_key(|interval| (interval.is_prediction, interval.start_date));

        let (matched, current_phase, current_day) = match hit {
            Some(interval) => {
                let anchor = self
                    .anchors
                    .get(&interval.cycle_id)
                    .copied()
                    .unwrap_or(interval.start_date);
                let day = (reference_date - anchor).num_days() + 1;
                (true, interval.phase, day.max(1) as u32)
            }
            None => (false, PhaseKind::Menstrual, 1),
        };

        trace!(%reference_date, matched, %current_phase, current_day, "Resolved cycle state");

        CycleHistorySnapshot {
            reference_date,
            matched,
            current_day,
            current_phase,
            cycle_length: self.cycle_length(),
            next_anchor: self.next_anchor(reference_date),
        }
    }

    /// Rounded mean span between consecutive recorded anchors
    pub fn cycle_length(&self) -> u32 {
        match self.average_cycle_length() {
            Some(avg) => avg
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_u32()
                .filter(|days| *days > 0)
                .unwrap_or(DEFAULT_CYCLE_LENGTH),
            None => DEFAULT_CYCLE_LENGTH,
        }
    }

    fn average_cycle_length(&self) -> Option<Decimal> {
        let first = self.observed_anchors.first()?;
        let last = self.observed_anchors.last()?;
        let gaps = self.observed_anchors.len().checked_sub(1).filter(|n| *n > 0)?;

        Some(Decimal::from((*last - *first).num_days()) / Decimal::from(gaps))
    }

    /// Consecutive anchor-to-anchor spans of recorded cycles
    pub fn cycle_lengths(&self) -> Vec<i64> {
        self.observed_anchors
            .windows(2)
            .map(|w| (w[1] - w[0]).num_days())
            .collect()
    }

    /// Earliest menstrual start strictly after the given date
    pub fn next_anchor(&self, reference_date: NaiveDate) -> Option<NaiveDate> {
        self.intervals
            .iter()
            .filter(|i| i.phase == PhaseKind::Menstrual && i.start_date > reference_date)
            .map(|i| i.start_date)
            .next()
    }

    /// Last day covered by any interval
    pub fn latest_end_date(&self) -> Option<NaiveDate> {
        self.intervals.iter().map(|i| i.end_date).max()
    }

    /// Anchor date of a cycle
    pub fn anchor_of(&self, cycle_id: &str) -> Option<NaiveDate> {
        self.anchors.get(cycle_id).copied()
    }

    /// All cycle anchors keyed by cycle id
    pub fn anchors(&self) -> &BTreeMap<String, NaiveDate> {
        &self.anchors
    }

    /// Intervals in chronological order
    pub fn intervals(&self) -> &[PhaseInterval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Phase durations for forecasting, consistent with the history.
    ///
    /// Menstrual, ovulation and luteal lengths are averaged over recorded
    /// intervals; follicular takes up the rest of [`Self::cycle_length`].
    /// If the averaged phases alone exceed the cycle length the canonical
    /// 5/9/2/12 decomposition is returned. The result's `total()` is the
    /// cycle length to forecast with.
    pub fn average_phase_durations(&self) -> PhaseDurations {
        let defaults = PhaseDurations::default();
        let menstrual = self
            .average_phase_length(PhaseKind::Menstrual)
            .unwrap_or(defaults.menstrual);
        let ovulation = self
            .average_phase_length(PhaseKind::Ovulation)
            .unwrap_or(defaults.ovulation);
        let luteal = self
            .average_phase_length(PhaseKind::Luteal)
            .unwrap_or(defaults.luteal);

        let cycle_length = self.cycle_length();
        match cycle_length.checked_sub(menstrual + ovulation + luteal) {
            Some(follicular) => PhaseDurations::new(menstrual, follicular, ovulation, luteal),
            None => {
                debug!(
                    cycle_length,
                    menstrual, ovulation, luteal, "Averaged phases exceed cycle length, using defaults"
                );
                defaults
            }
        }
    }

    fn average_phase_length(&self, phase: PhaseKind) -> Option<u32> {
        let lengths: Vec<i64> = self
            .intervals
            .iter()
            .filter(|i| !i.is_prediction && i.phase == phase)
            .map(|i| i.duration_days())
            .collect();

        if lengths.is_empty() {
            return None;
        }

        let mean = Decimal::from(lengths.iter().sum::<i64>()) / Decimal::from(lengths.len());
        mean.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u32()
    }

    /// Compute summary statistics over the history
    pub fn stats(&self) -> CycleStats {
        let lengths = self.cycle_lengths();
        let samples: Vec<f64> = lengths.iter().map(|l| *l as f64).collect();

        let menstrual: Vec<i64> = self
            .intervals
            .iter()
            .filter(|i| !i.is_prediction && i.phase == PhaseKind::Menstrual)
            .map(|i| i.duration_days())
            .collect();

        CycleStats {
            total_cycles: self.anchors.len(),
            observed_cycles: self.observed_anchors.len(),
            avg_cycle_length: self.average_cycle_length(),
            shortest_cycle: lengths.iter().copied().min(),
            longest_cycle: lengths.iter().copied().max(),
            avg_menstrual_length: if menstrual.is_empty() {
                None
            } else {
                Some(Decimal::from(menstrual.iter().sum::<i64>()) / Decimal::from(menstrual.len()))
            },
            cycle_length_std_dev: if samples.len() >= 2 {
                Some(samples.iter().std_dev())
            } else {
                None
            },
            last_anchor: self.observed_anchors.last().copied(),
        }
    }

    /// Prediction confidence derived from how regular the recorded cycles are
    pub fn suggested_confidence(&self) -> u8 {
        let samples: Vec<f64> = self.cycle_lengths().iter().map(|l| *l as f64).collect();
        if samples.len() < 2 {
            return BASELINE_CONFIDENCE;
        }

        let mean = samples.iter().mean();
        if mean <= 0.0 {
            return BASELINE_CONFIDENCE;
        }

        let std_dev = samples.iter().std_dev();
        (100.0 * (1.0 - std_dev / mean)).clamp(10.0, 95.0).round() as u8
    }
}
