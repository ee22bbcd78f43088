// Library interface for cyclecast modules
// The binary and integration tests both go through this crate root

pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod import;
pub mod logging;
pub mod models;
pub mod prediction;

// Re-export commonly used types for convenience
pub use models::*;
pub use history::{CycleHistoryIndex, CycleStats, BASELINE_CONFIDENCE, DEFAULT_CYCLE_LENGTH};
pub use prediction::{CyclePredictor, PredictorConfig};
pub use import::{FileSource, ImportManager, PhaseRecord, PhaseSource};
pub use export::{CycleReport, ExportFormat};
pub use config::AppConfig;
pub use error::{CycleError, ImportError, Result, ValidationError};
pub use logging::{LogConfig, LogFormat, LogLevel};
