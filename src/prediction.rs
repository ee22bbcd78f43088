use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ValidationError;
use crate::history::CycleHistoryIndex;
use crate::models::{PhaseDurations, PhaseInterval, PhaseKind};

/// Predictor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// Prefix of generated cycle ids (default: "predicted")
    pub id_prefix: String,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        PredictorConfig {
            id_prefix: "predicted".to_string(),
        }
    }
}

/// Generates future phase intervals by repeating a cycle decomposition
#[derive(Debug, Clone, Default)]
pub struct CyclePredictor {
    config: PredictorConfig,
}

impl CyclePredictor {
    /// Create new predictor with default configuration
    pub fn new() -> Self {
        CyclePredictor {
            config: PredictorConfig::default(),
        }
    }

    /// Create new predictor with custom configuration
    pub fn with_config(config: PredictorConfig) -> Self {
        CyclePredictor { config }
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Lay down `cycles_ahead` back-to-back cycles starting at `anchor_date`.
    ///
    /// Each cycle contributes Menstrual, Follicular, Ovulation and Luteal
    /// intervals in that order, sharing one cycle id. The next cycle starts
    /// the day after the previous Luteal phase ends. Phases configured with
    /// zero days are skipped.
    #[tracing::instrument(level = "debug", skip(self, phase_durations))]
    pub fn forecast(
        &self,
        anchor_date: NaiveDate,
        cycle_length_days: i64,
        phase_durations: &PhaseDurations,
        cycles_ahead: u32,
        confidence: u8,
    ) -> Result<Vec<PhaseInterval>, ValidationError> {
        Self::validate_parameters(cycle_length_days, phase_durations, cycles_ahead, confidence)?;

        let out_of_range = || ValidationError::HorizonOutOfRange {
            anchor: anchor_date,
            cycles_ahead,
        };

        // Whole horizon must be representable before anything is generated
        u64::from(phase_durations.total())
            .checked_mul(u64::from(cycles_ahead))
            .and_then(|days| anchor_date.checked_add_days(Days::new(days)))
            .ok_or_else(out_of_range)?;

        let mut intervals = Vec::new();
        let mut cursor = anchor_date;

        for repetition in 1..=cycles_ahead {
            let cycle_id = self.cycle_id(repetition, cursor);

            for phase in PhaseKind::ALL {
                let days = phase_durations.get(phase);
                if days == 0 {
                    continue;
                }

                let end_date = cursor
                    .checked_add_days(Days::new(days as u64 - 1))
                    .ok_or_else(out_of_range)?;

                intervals.push(PhaseInterval {
                    cycle_id: cycle_id.clone(),
                    phase,
                    start_date: cursor,
                    end_date,
                    is_prediction: true,
                    confidence,
                });

                cursor = end_date.checked_add_days(Days::new(1)).ok_or_else(out_of_range)?;
            }
        }

        debug!(
            intervals = intervals.len(),
            last_day = ?intervals.last().map(|i| i.end_date),
            "Generated cycle forecast"
        );

        Ok(intervals)
    }

    /// Forecast from recorded history.
    ///
    /// Starts the day after the latest recorded interval and uses the
    /// history's averaged phase durations, whose total is the cycle length.
    pub fn forecast_from_history(
        &self,
        index: &CycleHistoryIndex,
        cycles_ahead: u32,
        confidence: u8,
    ) -> Result<Vec<PhaseInterval>, ValidationError> {
        let latest = index.latest_end_date().ok_or(ValidationError::EmptyHistory)?;
        let anchor_date = latest
            .checked_add_days(Days::new(1))
            .ok_or(ValidationError::HorizonOutOfRange {
                anchor: latest,
                cycles_ahead,
            })?;

        let durations = index.average_phase_durations();

        debug!(
            %anchor_date,
            cycle_length = durations.total(),
            ?durations,
            "Forecasting from history"
        );

        self.forecast(
            anchor_date,
            durations.total() as i64,
            &durations,
            cycles_ahead,
            confidence,
        )
    }

    fn validate_parameters(
        cycle_length_days: i64,
        phase_durations: &PhaseDurations,
        cycles_ahead: u32,
        confidence: u8,
    ) -> Result<(), ValidationError> {
        if cycle_length_days <= 0 {
            return Err(ValidationError::NonPositiveCycleLength(cycle_length_days));
        }

        let sum = phase_durations.total();
        if sum as i64 != cycle_length_days {
            return Err(ValidationError::DurationMismatch {
                sum,
                cycle_length: u32::try_from(cycle_length_days).unwrap_or(u32::MAX),
            });
        }

        if cycles_ahead == 0 {
            return Err(ValidationError::InvalidCyclesAhead(cycles_ahead));
        }

        if confidence > 100 {
            return Err(ValidationError::InvalidConfidence(confidence as u32));
        }

        Ok(())
    }

    fn cycle_id(&self, repetition: u32, anchor: NaiveDate) -> String {
        format!(
            "{}-{}-{}",
            self.config.id_prefix,
            repetition,
            anchor.format("%Y-%m-%d")
        )
    }
}
