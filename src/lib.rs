//! # HNSD - Head-aNd-Shoulders Detector
//!
//! Head-and-shoulders (bearish) and inverse head-and-shoulders (bullish)
//! pattern detection with forward neckline projection, ATR neckline bands and
//! band-crossing entry/exit signals.
//!
//! ## Quick Start
//!
//! ```rust
//! use hnsd::prelude::*;
//!
//! // Define your OHLCV data
//! struct Bar { o: f64, h: f64, l: f64, c: f64, v: f64 }
//!
//! impl OHLCV for Bar {
//!     fn open(&self) -> f64 { self.o }
//!     fn high(&self) -> f64 { self.h }
//!     fn low(&self) -> f64 { self.l }
//!     fn close(&self) -> f64 { self.c }
//!     fn volume(&self) -> f64 { self.v }
//! }
//!
//! // leftbars = 4, rightbars = 4, threshold = 10, ATR(14)
//! let engine = EngineBuilder::new().build().unwrap();
//!
//! let bars: Vec<Bar> = vec![];
//! let analysis = engine.scan(&bars).unwrap();
//! assert!(analysis.is_empty());
//! ```

pub mod detectors;
pub mod levels;
pub mod params;
pub mod report;
pub mod signals;

pub mod prelude {
    pub use crate::{
        // Detectors
        detectors::*,
        // Levels
        levels::{atr, neckline_bands, true_range, NecklineBand},
        // Parameters
        params::{get_count, get_period, ParamMeta, ParamType, ParameterizedDetector},
        // Parallel
        scan_parallel,
        // Signals
        signals::{crossed_above, neckline_signals, SignalColumns},
        // Engine
        Analysis,
        AnalysisIter,
        BarAnalysis,
        Direction,
        EngineBuilder,
        OHLCVExt,
        PatternEngine,
        // Errors
        PatternError,
        Period,
        Result,
        ScanError,
        ScanResult,
        // Core traits
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors that can occur during pattern detection
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidOHLCV { index: usize, reason: &'static str },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Bar count that must be > 0 (pivot windows, ATR lookback)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(PatternError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    fn timestamp(&self) -> Option<i64> {
        None
    }
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    /// True range against the previous close. Without a previous bar this is
    /// the plain high-low range.
    #[inline]
    fn true_range(&self, prev_close: Option<f64>) -> f64 {
        let range = self.range();
        match prev_close {
            Some(pc) => range
                .max((self.high() - pc).abs())
                .max((self.low() - pc).abs()),
            None => range,
        }
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        if self.high() < self.low() {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "high < low",
            });
        }
        if self.open().is_nan()
            || self.high().is_nan()
            || self.low().is_nan()
            || self.close().is_nan()
        {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if self.open().is_infinite()
            || self.high().is_infinite()
            || self.low().is_infinite()
            || self.close().is_infinite()
        {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

/// Direction of a confirmed pattern.
///
/// The declaration order is also the application order of two patterns
/// confirmed at the same head: bullish is projected first, so bearish wins.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }
}

// ============================================================
// PATTERN ENGINE
// ============================================================

/// Engine configuration
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub validate_data: bool,
}

/// Main analysis engine: detector, ATR bands and signals in one pass.
#[derive(Debug, Clone)]
pub struct PatternEngine {
    detector: HeadShouldersDetector,
    atr_period: Period,
    config: EngineConfig,
}

use detectors::{HeadShouldersDetector, HsAnnotation, HsSeries};
use levels::NecklineBand;
use signals::SignalColumns;

impl PatternEngine {
    pub fn detector(&self) -> &HeadShouldersDetector {
        &self.detector
    }

    pub fn atr_period(&self) -> Period {
        self.atr_period
    }

    /// Pattern annotations only.
    pub fn annotate<T: OHLCV>(&self, bars: &[T]) -> Result<HsSeries> {
        if self.config.validate_data {
            self.validate_bars(bars)?;
        }
        Ok(self.detector.detect(bars))
    }

    /// Full analysis: annotations, ATR, neckline bands and signals.
    pub fn scan<T: OHLCV>(&self, bars: &[T]) -> Result<Analysis> {
        let series = self.annotate(bars)?;
        let atr = levels::atr(bars, self.atr_period);
        let bands = levels::neckline_bands(&series.neckline_column(), &atr);
        let signals = signals::neckline_signals(bars, &series, &bands);

        tracing::debug!(
            bars = bars.len(),
            events = series.events().len(),
            bullish = series.bullish_count(),
            bearish = series.bearish_count(),
            entries = signals.entry_count(),
            exits = signals.exit_count(),
            "scan complete"
        );

        Ok(Analysis {
            series,
            atr,
            bands,
            signals,
        })
    }

    fn validate_bars<T: OHLCV>(&self, bars: &[T]) -> Result<()> {
        for (i, bar) in bars.iter().enumerate() {
            bar.validate().map_err(|e| match e {
                PatternError::InvalidOHLCV { reason, .. } => {
                    PatternError::InvalidOHLCV { index: i, reason }
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

// ============================================================
// ANALYSIS + ITERATOR
// ============================================================

/// Column-oriented result of [`PatternEngine::scan`]
#[derive(Debug, Clone, serde::Serialize)]
pub struct Analysis {
    pub series: HsSeries,
    pub atr: Vec<f64>,
    pub bands: Vec<NecklineBand>,
    pub signals: SignalColumns,
}

impl Analysis {
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Row view of a single bar.
    pub fn at(&self, index: usize) -> Option<BarAnalysis> {
        let annotation = *self.series.get(index)?;
        Some(BarAnalysis {
            index,
            annotation,
            atr: self.atr[index],
            band: self.bands[index],
            enter_long: self.signals.enter_long[index],
            exit_long: self.signals.exit_long[index],
        })
    }

    pub fn iter(&self) -> AnalysisIter<'_> {
        AnalysisIter {
            analysis: self,
            current: 0,
        }
    }
}

/// Everything computed for one bar
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct BarAnalysis {
    pub index: usize,
    #[serde(flatten)]
    pub annotation: HsAnnotation,
    pub atr: f64,
    #[serde(flatten)]
    pub band: NecklineBand,
    pub enter_long: bool,
    pub exit_long: bool,
}

/// Iterator over bars of an [`Analysis`]
pub struct AnalysisIter<'a> {
    analysis: &'a Analysis,
    current: usize,
}

impl<'a> Iterator for AnalysisIter<'a> {
    type Item = BarAnalysis;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.analysis.at(self.current)?;
        self.current += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.analysis.len().saturating_sub(self.current);
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for AnalysisIter<'a> {}

impl<'a> IntoIterator for &'a Analysis {
    type Item = BarAnalysis;
    type IntoIter = AnalysisIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating PatternEngine instances
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    leftbars: usize,
    rightbars: usize,
    threshold: usize,
    atr_period: usize,
    config: EngineConfig,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        let defaults = HeadShouldersDetector::default();
        Self {
            leftbars: defaults.leftbars.get(),
            rightbars: defaults.rightbars.get(),
            threshold: defaults.threshold,
            atr_period: levels::DEFAULT_ATR_PERIOD,
            config: EngineConfig::default(),
        }
    }

    /// Bars to the left of a pivot candidate
    pub fn leftbars(mut self, bars: usize) -> Self {
        self.leftbars = bars;
        self
    }

    /// Bars to the right of a pivot candidate
    pub fn rightbars(mut self, bars: usize) -> Self {
        self.rightbars = bars;
        self
    }

    /// Forward projection length in bars
    pub fn threshold(mut self, bars: usize) -> Self {
        self.threshold = bars;
        self
    }

    pub fn atr_period(mut self, bars: usize) -> Self {
        self.atr_period = bars;
        self
    }

    /// Take all detector parameters from an existing detector
    pub fn detector(mut self, detector: &HeadShouldersDetector) -> Self {
        self.leftbars = detector.leftbars.get();
        self.rightbars = detector.rightbars.get();
        self.threshold = detector.threshold;
        self
    }

    /// Enable/disable data validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<PatternEngine> {
        let detector = HeadShouldersDetector::new(self.leftbars, self.rightbars, self.threshold)?;
        Ok(PatternEngine {
            detector,
            atr_period: Period::new(self.atr_period)?,
            config: self.config,
        })
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use rayon::prelude::*;

/// Result of scanning a single instrument
#[derive(Debug)]
pub struct ScanResult {
    pub symbol: String,
    pub analysis: Analysis,
}

/// Error from scanning a single instrument
#[derive(Debug)]
pub struct ScanError {
    pub symbol: String,
    pub error: PatternError,
}

/// Parallel scanning of multiple instruments
pub fn scan_parallel<'a, T, I>(
    engine: &PatternEngine,
    instruments: I,
) -> (Vec<ScanResult>, Vec<ScanError>)
where
    T: OHLCV + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars)| {
            engine
                .scan(bars)
                .map(|analysis| ScanResult {
                    symbol: symbol.to_string(),
                    analysis,
                })
                .map_err(|error| ScanError {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => {
                tracing::warn!(symbol = %e.symbol, error = %e.error, "instrument scan failed");
                errors.push(e)
            }
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Test OHLCV bar
    #[derive(Debug, Clone)]
    struct Bar {
        o: f64,
        h: f64,
        l: f64,
        c: f64,
        v: f64,
    }

    impl Bar {
        fn new(o: f64, h: f64, l: f64, c: f64) -> Self {
            Self {
                o,
                h,
                l,
                c,
                v: 1000.0,
            }
        }
    }

    impl OHLCV for Bar {
        fn open(&self) -> f64 {
            self.o
        }

        fn high(&self) -> f64 {
            self.h
        }

        fn low(&self) -> f64 {
            self.l
        }

        fn close(&self) -> f64 {
            self.c
        }

        fn volume(&self) -> f64 {
            self.v
        }
    }

    fn make_downtrend_bars() -> Vec<Bar> {
        (0..20)
            .map(|i| {
                let base = 100.0 - i as f64 * 2.0;
                Bar::new(base, base + 1.0, base - 1.0, base - 0.5)
            })
            .collect()
    }

    fn make_uptrend_bars() -> Vec<Bar> {
        (0..20)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                Bar::new(base, base + 1.0, base - 1.0, base + 0.5)
            })
            .collect()
    }

    #[test]
    fn test_period_validation() {
        assert!(Period::new(1).is_ok());
        assert!(Period::new(100).is_ok());
        assert!(Period::new(0).is_err());
    }

    #[test]
    fn test_period_deserialize_rejects_zero() {
        assert!(serde_json::from_str::<Period>("4").is_ok());
        assert!(serde_json::from_str::<Period>("0").is_err());
    }

    #[test]
    fn test_true_range() {
        let bar = Bar::new(100.0, 110.0, 90.0, 105.0);
        assert_eq!(bar.range(), 20.0);
        assert_eq!(bar.true_range(None), 20.0);
        // Gap up from 80: high - prev_close dominates
        assert_eq!(bar.true_range(Some(80.0)), 30.0);
        // Gap down from 125: prev_close - low dominates
        assert_eq!(bar.true_range(Some(125.0)), 35.0);
    }

    #[test]
    fn test_direction_order() {
        assert!(Direction::Bullish < Direction::Bearish);
        assert!(Direction::Bullish.is_bullish());
        assert!(Direction::Bearish.is_bearish());
    }

    #[test]
    fn test_engine_builder_defaults() {
        let engine = EngineBuilder::new().build().unwrap();
        assert_eq!(engine.detector().leftbars.get(), 4);
        assert_eq!(engine.detector().rightbars.get(), 4);
        assert_eq!(engine.detector().threshold, 10);
        assert_eq!(engine.atr_period().get(), 14);
    }

    #[test]
    fn test_engine_builder_rejects_zero_windows() {
        assert!(EngineBuilder::new().leftbars(0).build().is_err());
        assert!(EngineBuilder::new().rightbars(0).build().is_err());
        assert!(EngineBuilder::new().atr_period(0).build().is_err());
        assert!(EngineBuilder::new().threshold(0).build().is_ok());
    }

    #[test]
    fn test_empty_scan() {
        let engine = EngineBuilder::new().build().unwrap();
        let bars: Vec<Bar> = vec![];
        let analysis = engine.scan(&bars).unwrap();
        assert!(analysis.is_empty());
        assert_eq!(analysis.iter().count(), 0);
    }

    #[test]
    fn test_scan_columns_aligned() {
        let engine = EngineBuilder::new().build().unwrap();
        let bars = make_downtrend_bars();
        let analysis = engine.scan(&bars).unwrap();
        assert_eq!(analysis.len(), bars.len());
        assert_eq!(analysis.atr.len(), bars.len());
        assert_eq!(analysis.bands.len(), bars.len());
        assert_eq!(analysis.signals.enter_long.len(), bars.len());
        assert_eq!(analysis.signals.exit_long.len(), bars.len());
    }

    #[test]
    fn test_iterator_exact_size() {
        let engine = EngineBuilder::new().build().unwrap();
        let bars = make_uptrend_bars();
        let analysis = engine.scan(&bars).unwrap();

        let iter = analysis.iter();
        assert_eq!(iter.len(), bars.len());

        let indices: Vec<usize> = analysis.iter().map(|row| row.index).collect();
        assert_eq!(indices, (0..bars.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_validate_data_reports_index() {
        let engine = EngineBuilder::new().validate_data(true).build().unwrap();
        let mut bars = make_downtrend_bars();
        bars[7].h = bars[7].l - 1.0;

        match engine.scan(&bars) {
            Err(PatternError::InvalidOHLCV { index, reason }) => {
                assert_eq!(index, 7);
                assert_eq!(reason, "high < low");
            }
            other => panic!("expected InvalidOHLCV, got {other:?}"),
        }
    }

    #[test]
    fn test_validation_disabled_by_default() {
        let engine = EngineBuilder::new().build().unwrap();
        let mut bars = make_downtrend_bars();
        bars[3].c = f64::NAN;
        assert!(engine.scan(&bars).is_ok());
    }

    #[test]
    fn test_parallel_scan() {
        let engine = EngineBuilder::new().build().unwrap();

        let bars1 = make_downtrend_bars();
        let bars2 = make_uptrend_bars();

        let instruments: Vec<(&str, &[Bar])> = vec![("BTC/USDT", &bars1), ("ETH/USDT", &bars2)];

        let (results, errors) = scan_parallel(&engine, instruments);
        assert_eq!(results.len(), 2);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_parallel_scan_collects_errors() {
        let engine = EngineBuilder::new().validate_data(true).build().unwrap();

        let good = make_downtrend_bars();
        let mut bad = make_uptrend_bars();
        bad[0].o = f64::INFINITY;

        let instruments: Vec<(&str, &[Bar])> = vec![("GOOD", &good), ("BAD", &bad)];

        let (results, errors) = scan_parallel(&engine, instruments);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].symbol, "GOOD");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].symbol, "BAD");
    }
}
