//! Unified error hierarchy for cyclecast
//!
//! Validation failures carry structured information so callers can turn them
//! into input-correction prompts. Absence of history is never an error here;
//! see [`crate::history::CycleHistoryIndex::resolve`].

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::PhaseKind;

/// Top-level error type for all cyclecast operations
#[derive(Debug, Error)]
pub enum CycleError {
    /// Malformed or internally inconsistent input
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Phase record import errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Input validation errors raised by the history index and the predictor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Interval ends before it starts
    #[error("Interval {cycle_id}/{phase} ends ({end}) before it starts ({start})")]
    EndBeforeStart {
        cycle_id: String,
        phase: PhaseKind,
        start: NaiveDate,
        end: NaiveDate,
    },

    /// Two intervals of the same cycle share at least one day
    #[error("Cycle {cycle_id}: {first} and {second} overlap on {on}")]
    OverlappingIntervals {
        cycle_id: String,
        first: PhaseKind,
        second: PhaseKind,
        on: NaiveDate,
    },

    /// Phases of a cycle are duplicated or not in cyclic order
    #[error("Cycle {cycle_id}: {phase} starting {start} is out of order after {previous}")]
    PhaseOutOfOrder {
        cycle_id: String,
        phase: PhaseKind,
        previous: PhaseKind,
        start: NaiveDate,
    },

    /// Cycle length must be at least one day
    #[error("Cycle length must be positive, got {0}")]
    NonPositiveCycleLength(i64),

    /// Phase durations do not add up to the cycle length
    #[error("Phase durations sum to {sum} days, expected {cycle_length}")]
    DurationMismatch { sum: u32, cycle_length: u32 },

    /// Forecast horizon must cover at least one cycle
    #[error("cycles_ahead must be at least 1, got {0}")]
    InvalidCyclesAhead(u32),

    /// Confidence is a percentage
    #[error("Confidence must be within 0..=100, got {0}")]
    InvalidConfidence(u32),

    /// Forecast runs past the representable calendar
    #[error("Forecast of {cycles_ahead} cycles from {anchor} exceeds the supported date range")]
    HorizonOutOfRange { anchor: NaiveDate, cycles_ahead: u32 },

    /// Forecasting from history needs at least one recorded interval
    #[error("No cycle history to forecast from")]
    EmptyHistory,
}

/// Import errors for phase records
#[derive(Debug, Error)]
pub enum ImportError {
    /// Unsupported file format
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// Format-specific parsing error
    #[error("Parse error in {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    /// A required column or field is absent
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// A field is present but its value cannot be used
    #[error("Invalid value '{value}' for {field}")]
    InvalidValue { field: String, value: String },

    /// Phase name could not be mapped onto a phase
    #[error("Unknown phase: {0}")]
    UnknownPhase(String),

    /// Date text could not be parsed as a calendar day
    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

/// Result type alias for cyclecast operations
pub type Result<T> = std::result::Result<T, CycleError>;

impl CycleError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, CycleError::Io(_))
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CycleError::Validation(ValidationError::EmptyHistory) => ErrorSeverity::Info,
            CycleError::Validation(_) => ErrorSeverity::Warning,
            CycleError::Import(_) => ErrorSeverity::Warning,
            CycleError::Internal(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            CycleError::Validation(ValidationError::EndBeforeStart { phase, start, end, .. }) => {
                format!(
                    "The {} entry ends on {} but starts on {}. Please fix the dates.",
                    phase, end, start
                )
            }
            CycleError::Validation(ValidationError::OverlappingIntervals {
                first, second, ..
            }) => {
                format!(
                    "The {} and {} entries of the same cycle overlap. Please adjust one of them.",
                    first, second
                )
            }
            CycleError::Validation(ValidationError::DurationMismatch { sum, cycle_length }) => {
                format!(
                    "Phase lengths add up to {} days but the cycle is {} days long.",
                    sum, cycle_length
                )
            }
            CycleError::Validation(ValidationError::EmptyHistory) => {
                "Log at least one period to see predictions.".to_string()
            }
            CycleError::Import(ImportError::UnknownPhase(name)) => {
                format!(
                    "'{}' is not a cycle phase. Use menstrual, follicular, ovulation or luteal.",
                    name
                )
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}
