use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};

use cyclecast::export::{self, text, CycleReport, ExportFormat};
use cyclecast::logging::init_logging;
use cyclecast::{
    AppConfig, CycleError, CycleHistoryIndex, CyclePredictor, DateRange, FileSource, LogFormat,
    LogLevel, PhaseDurations, PhaseKind, PhaseSource, BASELINE_CONFIDENCE,
};

/// Cyclecast - Cycle Phase Tracking CLI
///
/// Derives the current cycle phase from recorded history and forecasts
/// upcoming phases.
#[derive(Parser)]
#[command(name = "cyclecast")]
#[command(author = "Cyclecast Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Cycle phase derivation and prediction CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log output format (pretty, json, compact)
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the cycle phase for a date
    Status {
        /// History file or directory (CSV, JSON)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Reference date (YYYY-MM-DD, default: today)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Forecast upcoming phases from recorded history
    Forecast {
        /// History file or directory (CSV, JSON)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Number of cycles to forecast
        #[arg(short = 'n', long)]
        cycles: Option<u32>,

        /// Confidence attached to predictions (0-100)
        #[arg(long)]
        confidence: Option<u8>,

        /// Write the forecast to a file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (csv, json, text; default: from extension)
        #[arg(long)]
        format: Option<String>,
    },

    /// Forecast phases from explicit cycle parameters
    Predict {
        /// First day of the first forecast cycle (YYYY-MM-DD)
        #[arg(short, long)]
        anchor: NaiveDate,

        /// Cycle length in days
        #[arg(short = 'l', long)]
        cycle_length: Option<i64>,

        /// Phase durations as menstrual,follicular,ovulation,luteal
        #[arg(short, long)]
        durations: Option<PhaseDurations>,

        /// Number of cycles to forecast
        #[arg(short = 'n', long)]
        cycles: Option<u32>,

        /// Confidence attached to predictions (0-100)
        #[arg(long)]
        confidence: Option<u8>,
    },

    /// Summarize recorded cycle history
    Stats {
        /// History file or directory (CSV, JSON)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Write a full report (snapshot, stats, forecast) to a file
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Configure application settings
    Config {
        /// List all configuration options
        #[arg(short, long)]
        list: bool,

        /// Set a configuration value (KEY=VALUE)
        #[arg(short, long)]
        set: Option<String>,

        /// Get a configuration value
        #[arg(short, long)]
        get: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(AppConfig::default_config_path);
    let config = if cli.config.is_some() {
        AppConfig::load_from_file(&config_path)?
    } else {
        AppConfig::load_or_default()
    };

    let mut log_config = config.logging.clone();
    log_config.level = LogLevel::from_verbosity(config.logging.level, cli.verbose);
    if let Some(format) = cli.log_format {
        log_config.format = format;
    }
    init_logging(&log_config)?;

    let result = match cli.command {
        Commands::Status { file, date } => run_status(&config, file, date),
        Commands::Forecast {
            file,
            cycles,
            confidence,
            output,
            format,
        } => run_forecast(&config, file, cycles, confidence, output, format),
        Commands::Predict {
            anchor,
            cycle_length,
            durations,
            cycles,
            confidence,
        } => run_predict(&config, anchor, cycle_length, durations, cycles, confidence),
        Commands::Stats { file, report } => run_stats(&config, file, report),
        Commands::Config { list, set, get } => run_config(config, &config_path, list, set, get),
    };

    if let Err(e) = &result {
        if let Some(cycle_error) = e.downcast_ref::<CycleError>() {
            tracing::warn!(
                severity = ?cycle_error.severity(),
                "{}",
                cycle_error
            );
            eprintln!("{} {}", "Error:".red().bold(), cycle_error.user_message());
            std::process::exit(1);
        }
    }

    result
}

fn history_path(config: &AppConfig, file: Option<PathBuf>) -> Result<PathBuf> {
    match file.or_else(|| config.source.data_file.clone()) {
        Some(path) => Ok(path),
        None => bail!("No history file given; pass --file or set source.data_file"),
    }
}

fn load_history(path: &Path) -> Result<CycleHistoryIndex> {
    let intervals = FileSource::new(path)
        .load(&DateRange::unbounded())
        .with_context(|| format!("Failed to load history from {}", path.display()))?;

    let index = CycleHistoryIndex::build(intervals).map_err(CycleError::from)?;
    Ok(index)
}

fn phase_label(phase: PhaseKind) -> ColoredString {
    let label = phase.to_string();
    match phase {
        PhaseKind::Menstrual => label.red().bold(),
        PhaseKind::Follicular => label.green().bold(),
        PhaseKind::Ovulation => label.yellow().bold(),
        PhaseKind::Luteal => label.magenta().bold(),
    }
}

fn run_status(config: &AppConfig, file: Option<PathBuf>, date: Option<NaiveDate>) -> Result<()> {
    let index = load_history(&history_path(config, file)?)?;
    let reference_date = date.unwrap_or_else(|| Local::now().date_naive());
    let snapshot = index.resolve(reference_date);

    println!("{}", "Cycle status".cyan().bold());
    println!(
        "  {} day {} of ~{}",
        phase_label(snapshot.current_phase),
        snapshot.current_day,
        snapshot.cycle_length
    );
    println!();
    print!("{}", text::render_snapshot(&snapshot));

    Ok(())
}

fn run_forecast(
    config: &AppConfig,
    file: Option<PathBuf>,
    cycles: Option<u32>,
    confidence: Option<u8>,
    output: Option<PathBuf>,
    format: Option<String>,
) -> Result<()> {
    let index = load_history(&history_path(config, file)?)?;
    let predictor = CyclePredictor::with_config(config.prediction.to_predictor_config());

    let cycles = cycles.unwrap_or(config.prediction.cycles_ahead);
    let confidence = confidence
        .or(config.prediction.confidence)
        .unwrap_or_else(|| index.suggested_confidence());

    let intervals = predictor
        .forecast_from_history(&index, cycles, confidence)
        .map_err(CycleError::from)?;

    println!(
        "{}",
        format!("Forecast: {} cycle(s), {}% confidence", cycles, confidence)
            .blue()
            .bold()
    );
    print!("{}", text::render_forecast(&intervals));

    if let Some(output) = output {
        let format = match format {
            Some(name) => ExportFormat::from_str(&name)?,
            None => ExportFormat::from_path(&output).unwrap_or(ExportFormat::Csv),
        };
        export::export_intervals(&intervals, format, &output)
            .with_context(|| format!("Failed to write forecast to {}", output.display()))?;
        println!(
            "{}",
            format!("✓ Forecast written to {}", output.display()).green()
        );
    }

    Ok(())
}

fn run_predict(
    config: &AppConfig,
    anchor: NaiveDate,
    cycle_length: Option<i64>,
    durations: Option<PhaseDurations>,
    cycles: Option<u32>,
    confidence: Option<u8>,
) -> Result<()> {
    let predictor = CyclePredictor::with_config(config.prediction.to_predictor_config());

    let (cycle_length, durations) = config.prediction.cycle_parameters(cycle_length, durations);
    let cycles = cycles.unwrap_or(config.prediction.cycles_ahead);
    let confidence = confidence
        .or(config.prediction.confidence)
        .unwrap_or(BASELINE_CONFIDENCE);

    let intervals = predictor
        .forecast(anchor, cycle_length, &durations, cycles, confidence)
        .map_err(CycleError::from)?;

    println!(
        "{}",
        format!("Prediction from {} ({}-day cycle)", anchor, cycle_length)
            .blue()
            .bold()
    );
    print!("{}", text::render_forecast(&intervals));

    Ok(())
}

fn run_stats(config: &AppConfig, file: Option<PathBuf>, report: Option<PathBuf>) -> Result<()> {
    let index = load_history(&history_path(config, file)?)?;
    let stats = index.stats();

    println!("{}", "Cycle statistics".cyan().bold());
    print!("{}", text::render_stats(&stats));
    println!(
        "Suggested confidence: {}%",
        index.suggested_confidence().to_string().bold()
    );

    if let Some(path) = report {
        let snapshot = index.resolve(Local::now().date_naive());
        let forecast = CyclePredictor::with_config(config.prediction.to_predictor_config())
            .forecast_from_history(
                &index,
                config.prediction.cycles_ahead,
                config
                    .prediction
                    .confidence
                    .unwrap_or_else(|| index.suggested_confidence()),
            )
            .map_err(CycleError::from)?;
        let report = CycleReport::new(&index, snapshot, forecast);

        match ExportFormat::from_path(&path) {
            Some(ExportFormat::Text) => export::text::export_cycle_report(&report, &path)?,
            _ => export::json::export_cycle_report(&report, &path)?,
        }
        println!("{}", format!("✓ Report written to {}", path.display()).green());
    }

    Ok(())
}

fn run_config(
    mut config: AppConfig,
    config_path: &Path,
    list: bool,
    set: Option<String>,
    get: Option<String>,
) -> Result<()> {
    if let Some(key_value) = set {
        let (key, value) = key_value
            .split_once('=')
            .with_context(|| format!("Expected KEY=VALUE, got '{}'", key_value))?;
        config.set(key.trim(), value)?;
        config.validate()?;
        config.save_to_file(config_path)?;
        println!(
            "{}",
            format!("✓ {} = {}", key.trim(), config.get(key.trim())?).green()
        );
    } else if let Some(key) = get {
        println!("{}", config.get(&key)?);
    } else if list {
        println!("{}", format!("Configuration ({})", config_path.display()).white().bold());
        for key in AppConfig::KEYS {
            println!("  {:<34} {}", key.dimmed(), config.get(key)?);
        }
    } else {
        bail!("Nothing to do; pass --list, --get KEY or --set KEY=VALUE");
    }

    Ok(())
}
