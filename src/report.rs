//! Monthly backtest summary
//!
//! Aggregates one-month backtest result files (`*.json`, as written by the
//! backtesting host) into a markdown table with one row per month, followed by
//! totals over all months.

use std::{
    collections::BTreeMap,
    fmt,
    fs,
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;
use serde::Deserialize;

/// Date format of `backtest_end` in result files
pub const BACKTEST_END_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("strategy '{name}' not found in {}", path.display())]
    MissingStrategy { path: PathBuf, name: String },

    #[error("{} holds {count} strategies, choose one explicitly", path.display())]
    AmbiguousStrategy { path: PathBuf, count: usize },

    #[error("invalid backtest_end '{value}' in {}: {source}", path.display())]
    InvalidDate {
        path: PathBuf,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

pub type ReportResult<T> = std::result::Result<T, ReportError>;

// ============================================================
// METRICS
// ============================================================

/// Metrics of one strategy over one month
#[derive(Debug, Clone, PartialEq, Deserialize, serde::Serialize)]
pub struct MonthlyMetrics {
    pub wins: u64,
    pub losses: u64,
    pub draws: u64,
    pub losing_days: u64,
    pub draw_days: u64,
    pub winning_days: u64,
    pub trades_per_day: f64,
    pub total_trades: u64,
    #[serde(rename = "profit_total_abs")]
    pub profit_usd: f64,
    #[serde(rename = "starting_balance")]
    pub start_balance: f64,
    pub final_balance: f64,
    /// Fraction of winning trades, 0.0..=1.0
    pub winrate: f64,
    pub max_drawdown: f64,
    #[serde(default)]
    pub drawdown_start: String,
    #[serde(default)]
    pub drawdown_end: String,
    pub cagr: f64,
    pub sortino: f64,
    pub sharpe: f64,
    pub calmar: f64,
    #[serde(rename = "profit_total")]
    pub percent_profit_month: f64,
    pub market_change: f64,
}

#[derive(Debug, Deserialize)]
struct StrategyBlock {
    backtest_end: String,
    #[serde(flatten)]
    metrics: MonthlyMetrics,
}

#[derive(Debug, Deserialize)]
struct ResultFile {
    strategy: BTreeMap<String, serde_json::Value>,
}

/// Totals over all months
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AggregatedSummary {
    pub total_wins: u64,
    pub total_losses: u64,
    pub total_draws: u64,
    pub total_trades: u64,
    pub total_profit_usd: f64,
    /// Unweighted mean of the monthly winrates
    pub average_winrate: f64,
}

// ============================================================
// LOADING
// ============================================================

/// Result files in `dir`, sorted by file name.
///
/// Only `*.json` files count; `*.last_result.json` and `*.meta.json` are
/// bookkeeping files of the host and are skipped.
pub fn list_result_files(dir: &Path) -> ReportResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|source| ReportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ReportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if is_result_file(name) && entry.path().is_file() {
            files.push(entry.path());
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn is_result_file(name: &str) -> bool {
    name.ends_with(".json") && !name.ends_with(".last_result.json") && !name.ends_with(".meta.json")
}

/// Month key (`YYYY-MM`) and metrics of one result file.
///
/// With `strategy = None` the file must contain exactly one strategy.
pub fn load_month(path: &Path, strategy: Option<&str>) -> ReportResult<(String, MonthlyMetrics)> {
    let raw = fs::read_to_string(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_month(path, &raw, strategy)
}

fn parse_month(
    path: &Path,
    raw: &str,
    strategy: Option<&str>,
) -> ReportResult<(String, MonthlyMetrics)> {
    let json_err = |source| ReportError::Json {
        path: path.to_path_buf(),
        source,
    };

    let mut file: ResultFile = serde_json::from_str(raw).map_err(json_err)?;
    let block = match strategy {
        Some(name) => file
            .strategy
            .remove(name)
            .ok_or_else(|| ReportError::MissingStrategy {
                path: path.to_path_buf(),
                name: name.to_string(),
            })?,
        None if file.strategy.len() == 1 => file
            .strategy
            .into_values()
            .next()
            .ok_or_else(|| ReportError::AmbiguousStrategy {
                path: path.to_path_buf(),
                count: 0,
            })?,
        None => {
            return Err(ReportError::AmbiguousStrategy {
                path: path.to_path_buf(),
                count: file.strategy.len(),
            })
        }
    };

    let block: StrategyBlock = serde_json::from_value(block).map_err(json_err)?;
    let month = month_key(&block.backtest_end).map_err(|source| ReportError::InvalidDate {
        path: path.to_path_buf(),
        value: block.backtest_end.clone(),
        source,
    })?;
    Ok((month, block.metrics))
}

/// `"2024-03-31 23:55:00"` -> `"2024-03"`
pub fn month_key(backtest_end: &str) -> Result<String, chrono::ParseError> {
    let end = NaiveDateTime::parse_from_str(backtest_end, BACKTEST_END_FORMAT)?;
    Ok(end.format("%Y-%m").to_string())
}

// ============================================================
// REPORT
// ============================================================

/// Monthly metrics keyed by month, in chronological order
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SummaryReport {
    pub months: BTreeMap<String, MonthlyMetrics>,
}

impl SummaryReport {
    /// Load every result file in `dir`.
    ///
    /// Files are read in name order; a later file for an already seen month
    /// replaces the earlier one.
    pub fn from_dir(dir: &Path, strategy: Option<&str>) -> ReportResult<Self> {
        let files = list_result_files(dir)?;
        tracing::info!(dir = %dir.display(), files = files.len(), "loading backtest results");

        let mut report = Self::default();
        for path in files {
            let (month, metrics) = load_month(&path, strategy)?;
            tracing::debug!(path = %path.display(), %month, trades = metrics.total_trades, "loaded");
            if report.months.insert(month.clone(), metrics).is_some() {
                tracing::warn!(path = %path.display(), %month, "duplicate month replaced");
            }
        }
        Ok(report)
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    /// Totals over all months, `None` when there are no months.
    pub fn aggregate(&self) -> Option<AggregatedSummary> {
        if self.months.is_empty() {
            return None;
        }
        let months = self.months.values();
        Some(AggregatedSummary {
            total_wins: months.clone().map(|m| m.wins).sum(),
            total_losses: months.clone().map(|m| m.losses).sum(),
            total_draws: months.clone().map(|m| m.draws).sum(),
            total_trades: months.clone().map(|m| m.total_trades).sum(),
            total_profit_usd: months.clone().map(|m| m.profit_usd).sum(),
            average_winrate: months.map(|m| m.winrate).sum::<f64>() / self.months.len() as f64,
        })
    }
}

const HEADER: &[&str] = &[
    "Month",
    "Wins",
    "Losses",
    "Draws",
    "Losing Days",
    "Draw Days",
    "Winning Days",
    "Trades Per Day",
    "Total Trades",
    "Profit USD",
    "Start Balance",
    "Final Balance",
    "Winrate",
    "Max Drawdown",
    "Drawdown Start",
    "Drawdown End",
    "CAGR",
    "Sortino",
    "Sharpe",
    "Calmar",
    "% Profit Month",
    "Market Change",
];

fn percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn month_row(month: &str, m: &MonthlyMetrics) -> Vec<String> {
    vec![
        month.to_string(),
        m.wins.to_string(),
        m.losses.to_string(),
        m.draws.to_string(),
        m.losing_days.to_string(),
        m.draw_days.to_string(),
        m.winning_days.to_string(),
        format!("{:.2}", m.trades_per_day),
        m.total_trades.to_string(),
        format!("{:.2}", m.profit_usd),
        format!("{:.2}", m.start_balance),
        format!("{:.2}", m.final_balance),
        percent(m.winrate),
        format!("{:.2}", m.max_drawdown),
        m.drawdown_start.clone(),
        m.drawdown_end.clone(),
        format!("{:.2}", m.cagr),
        format!("{:.2}", m.sortino),
        format!("{:.2}", m.sharpe),
        format!("{:.2}", m.calmar),
        format!("{:.2}", m.percent_profit_month),
        format!("{:.2}", m.market_change),
    ]
}

fn write_row<S: AsRef<str>>(f: &mut fmt::Formatter<'_>, cells: &[S]) -> fmt::Result {
    write!(f, "|")?;
    for cell in cells {
        write!(f, " {} |", cell.as_ref())?;
    }
    writeln!(f)
}

impl fmt::Display for AggregatedSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Aggregated Summary:")?;
        writeln!(f, "Total Wins: {}", self.total_wins)?;
        writeln!(f, "Total Losses: {}", self.total_losses)?;
        writeln!(f, "Total Draws: {}", self.total_draws)?;
        writeln!(f, "Total Trades: {}", self.total_trades)?;
        writeln!(f, "Total Profit USD: {:.2}", self.total_profit_usd)?;
        writeln!(f, "Average Winrate: {}", percent(self.average_winrate))
    }
}

impl fmt::Display for SummaryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(summary) = self.aggregate() else {
            return writeln!(f, "No result files found.");
        };

        write_row(f, HEADER)?;
        write_row(f, &vec!["---"; HEADER.len()])?;
        for (month, metrics) in &self.months {
            write_row(f, &month_row(month, metrics))?;
        }
        writeln!(f)?;
        write!(f, "{summary}")
    }
}
