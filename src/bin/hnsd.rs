//! hnsd command line.
//!
//! ```bash
//! # Annotate a JSON array of bars with the default detector
//! hnsd scan bars.json
//!
//! # Same, with detector parameters from a TOML file
//! hnsd scan bars.json --config detector.toml
//!
//! # Monthly summary of backtest result files
//! hnsd summary backtest_results --strategy NecklineBreak
//! ```

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hnsd::{prelude::*, report::SummaryReport};

#[derive(Parser)]
#[command(name = "hnsd")]
#[command(about = "Head-and-shoulders detection and backtest summaries", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Annotate a JSON array of OHLCV bars, one JSON object per bar on stdout
    Scan {
        /// Bar file: `[{"open": .., "high": .., "low": .., "close": .., "volume": ..}, ..]`
        file: PathBuf,

        /// Detector configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Reject bars with NaN/infinite prices or high < low
        #[arg(long, default_value = "false")]
        strict: bool,
    },

    /// Print the monthly summary of a directory of backtest result files
    Summary {
        /// Directory holding the result files
        #[arg(default_value = "backtest_results")]
        dir: PathBuf,

        /// Strategy to read from each file (required when a file holds several)
        #[arg(short, long)]
        strategy: Option<String>,
    },
}

/// `detector.toml`
///
/// ```toml
/// atr_period = 14
///
/// [detector]
/// leftbars = 4
/// rightbars = 4
/// threshold = 10
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScanConfig {
    detector: HeadShouldersDetector,
    atr_period: Option<usize>,
}

impl ScanConfig {
    fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))
    }
}

#[derive(Debug, Deserialize)]
struct JsonBar {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
    #[serde(default)]
    timestamp: Option<i64>,
}

impl OHLCV for JsonBar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }
}

fn scan(file: &Path, config: Option<&Path>, strict: bool) -> Result<()> {
    let config = match config {
        Some(path) => ScanConfig::load(path)?,
        None => ScanConfig::default(),
    };

    let mut builder = EngineBuilder::new()
        .detector(&config.detector)
        .validate_data(strict);
    if let Some(period) = config.atr_period {
        builder = builder.atr_period(period);
    }
    let engine = builder.build().context("invalid detector configuration")?;

    let raw = fs::read_to_string(file)
        .with_context(|| format!("failed to read bars {}", file.display()))?;
    let bars: Vec<JsonBar> =
        serde_json::from_str(&raw).with_context(|| format!("invalid bars {}", file.display()))?;

    let analysis = engine
        .scan(&bars)
        .with_context(|| format!("scan of {} failed", file.display()))?;
    info!(
        bars = bars.len(),
        patterns = analysis.series.events().len(),
        entries = analysis.signals.entry_count(),
        exits = analysis.signals.exit_count(),
        "scan finished"
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (row, bar) in analysis.iter().zip(&bars) {
        let mut value = serde_json::to_value(row)?;
        if let (Some(ts), Some(obj)) = (bar.timestamp, value.as_object_mut()) {
            obj.insert("timestamp".into(), ts.into());
        }
        writeln!(out, "{value}")?;
    }
    Ok(())
}

fn summary(dir: &Path, strategy: Option<&str>) -> Result<()> {
    let report = SummaryReport::from_dir(dir, strategy)
        .with_context(|| format!("failed to build summary for {}", dir.display()))?;
    print!("{report}");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            file,
            config,
            strict,
        } => scan(&file, config.as_deref(), strict),
        Commands::Summary { dir, strategy } => summary(&dir, strategy.as_deref()),
    }
}
